// src/config.rs
//! Per-job configuration: compiled-in defaults with an optional YAML overlay.
//!
//! Each job's `Config` derives `Deserialize` with `#[serde(default)]`, so an
//! overlay only needs to name the fields it changes.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::export;
use crate::table::Table;

/// Environment variable holding the path of the YAML overlay.
pub const CONFIG_ENV: &str = "CAPSCRAPE_CONFIG";

/// Defaults, overlaid with the file named by `CAPSCRAPE_CONFIG` if set.
pub fn load<T: DeserializeOwned + Default>() -> Result<T> {
    match env::var_os(CONFIG_ENV) {
        Some(path) => load_from(Path::new(&path)),
        None => {
            info!("{} not set; using built-in defaults", CONFIG_ENV);
            Ok(T::default())
        }
    }
}

pub fn load_from<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg = from_yaml_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
    info!(path = %path.display(), "loaded config overlay");
    Ok(cfg)
}

/// An empty document yields the defaults.
pub fn from_yaml_str<T: DeserializeOwned + Default>(text: &str) -> Result<T> {
    if text.trim().is_empty() {
        warn!("config overlay is empty; using defaults");
        return Ok(T::default());
    }
    Ok(serde_yaml::from_str(text)?)
}

/// Where a job writes its artifacts.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub xlsx: PathBuf,
    /// Optional CSV copy of the main data table.
    pub csv: Option<PathBuf>,
    /// Optional Parquet copy of the main data table.
    pub parquet: Option<PathBuf>,
}

impl OutputConfig {
    pub fn new(xlsx: impl Into<PathBuf>) -> Self {
        Self {
            xlsx: xlsx.into(),
            csv: None,
            parquet: None,
        }
    }

    /// Write the configured CSV / Parquet copies of `table`.
    pub fn write_copies(&self, table: &Table) -> Result<()> {
        if let Some(path) = &self.csv {
            export::csv::write(path, table)?;
        }
        if let Some(path) = &self.parquet {
            export::parquet::write(path, table)?;
        }
        Ok(())
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::new("output.xlsx")
    }
}
