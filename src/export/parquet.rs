// src/export/parquet.rs
use anyhow::{Context, Result};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{
    fs::{self, File},
    path::Path,
};
use tracing::info;

use crate::table::Table;

/// Columnar copy of `table` (Snappy-compressed, single row group).
pub fn write(path: impl AsRef<Path>, table: &Table) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let batch = table.to_record_batch()?;
    let file =
        File::create(path).with_context(|| format!("creating parquet file {:?}", path))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating Arrow writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;
    info!(path = %path.display(), rows = table.len(), "parquet written");
    Ok(())
}
