// src/panel.rs
//! Year-panel expansion of per-entity treaty records.

use anyhow::{bail, Result};
use serde::Deserialize;
use std::ops::RangeInclusive;
use tracing::debug;

use crate::extract::parse_year_lenient;
use crate::table::{Cell, Table};

pub const YEAR: &str = "Year";

/// Replicate every row of `table` once per year in `years`, adding a
/// `Year` column. Row order is year-major.
pub fn expand(table: &Table, years: RangeInclusive<i32>) -> Result<Table> {
    if table.column_index(YEAR).is_some() {
        bail!("table already has a {:?} column", YEAR);
    }
    let mut columns = table.columns.clone();
    columns.push(YEAR.to_string());

    let mut rows = Vec::with_capacity(table.len() * years.clone().count());
    for year in years {
        for row in &table.rows {
            let mut row = row.clone();
            row.push(Cell::from(year));
            rows.push(row);
        }
    }
    Ok(Table { columns, rows })
}

/// How to turn signature / entry-into-force dates into yearly indicators.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TreatyPanel {
    pub entity: String,
    pub sign_column: String,
    pub effect_column: String,
    /// Indicators are named `<prefix>_sign` and `<prefix>_effect`.
    pub prefix: String,
    pub first_year: i32,
    pub last_year: i32,
    /// Panel years before this have no signature indicator.
    pub sign_cutoff: i32,
    /// Panel years before this have no entry-into-force indicator.
    pub effect_cutoff: i32,
}

impl Default for TreatyPanel {
    /// MARPOL Annex VI: signature meaningful from 1997 (adoption of the
    /// protocol), entry into force from 2005.
    fn default() -> Self {
        Self {
            entity: "Country".into(),
            sign_column: "Signature".into(),
            effect_column: "EntryintoForce".into(),
            prefix: "marpol".into(),
            first_year: 1990,
            last_year: 2023,
            sign_cutoff: 1997,
            effect_cutoff: 2005,
        }
    }
}

impl TreatyPanel {
    pub fn sign_name(&self) -> String {
        format!("{}_sign", self.prefix)
    }

    pub fn effect_name(&self) -> String {
        format!("{}_effect", self.prefix)
    }
}

fn event_year(cell: &Cell) -> Option<i32> {
    match cell {
        Cell::Int(v) => i32::try_from(*v).ok(),
        Cell::Text(s) => parse_year_lenient(s),
        Cell::Empty => None,
    }
}

/// 1 once `year` has reached the event year, 0 before it or when the event
/// never happened, `Empty` before the cutoff.
fn indicator(event: Option<i32>, year: i32, cutoff: i32) -> Cell {
    if year < cutoff {
        return Cell::Empty;
    }
    Cell::Int(event.map(|e| e <= year).unwrap_or(false) as i64)
}

/// Panel of `entity, Year, <prefix>_sign, <prefix>_effect`, sorted by
/// entity then year.
pub fn treaty_indicators(table: &Table, cfg: &TreatyPanel) -> Result<Table> {
    let sign_idx = table.require_column(&cfg.sign_column)?;
    let effect_idx = table.require_column(&cfg.effect_column)?;
    table.require_column(&cfg.entity)?;

    let mut panel = expand(table, cfg.first_year..=cfg.last_year)?;
    let year_idx = panel.require_column(YEAR)?;

    panel.derive_column(&cfg.sign_name(), |row| {
        let year = row[year_idx].as_int().unwrap_or_default() as i32;
        indicator(event_year(&row[sign_idx]), year, cfg.sign_cutoff)
    });
    panel.derive_column(&cfg.effect_name(), |row| {
        let year = row[year_idx].as_int().unwrap_or_default() as i32;
        indicator(event_year(&row[effect_idx]), year, cfg.effect_cutoff)
    });

    let sign = cfg.sign_name();
    let effect = cfg.effect_name();
    let mut out = panel.select(&[cfg.entity.as_str(), YEAR, sign.as_str(), effect.as_str()])?;
    out.sort_by(&[cfg.entity.as_str(), YEAR])?;
    debug!(rows = out.len(), "treaty panel built");
    Ok(out)
}
