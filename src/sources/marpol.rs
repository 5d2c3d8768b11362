// src/sources/marpol.rs
//! MARPOL Annex VI signature and entry-into-force dates from the IMO status
//! of treaties report, reshaped into a yearly country panel.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{info, instrument};

use crate::config::OutputConfig;
use crate::export::{self, readme_lines, Sheet, Workbook};
use crate::fetch::{LayoutOptions, PdfReport, RawTable, Region};
use crate::panel::{treaty_indicators, TreatyPanel};
use crate::table::merge::ManualRecord;
use crate::table::{Cell, Table};

pub const COUNTRY: &str = "Country";
pub const SIGNATURE: &str = "Signature";
pub const ENTRY_INTO_FORCE: &str = "EntryintoForce";

/// One table region on one (1-based) page.
#[derive(Debug, Clone, Deserialize)]
pub struct TableArea {
    pub page: u32,
    pub region: Region,
}

/// A party missing from the report's table.
#[derive(Debug, Clone, Deserialize)]
pub struct ManualEntry {
    pub country: String,
    pub signature: String,
    pub entry_into_force: String,
}

impl ManualEntry {
    fn record(&self) -> ManualRecord {
        ManualRecord::new(self.country.as_str())
            .with(SIGNATURE, self.signature.as_str())
            .with(ENTRY_INTO_FORCE, self.entry_into_force.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pdf: PathBuf,
    pub areas: Vec<TableArea>,
    pub layout: LayoutOptions,
    pub manual: Vec<ManualEntry>,
    pub panel: TreatyPanel,
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        let area = |page, x1, y1, x2, y2| TableArea {
            page,
            region: Region { x1, y1, x2, y2 },
        };
        let manual = |country: &str, date: &str| ManualEntry {
            country: country.into(),
            signature: date.into(),
            entry_into_force: date.into(),
        };
        Self {
            pdf: "MARPOL_Status_2024.pdf".into(),
            areas: vec![
                area(189, 50.0, 615.0, 550.0, 50.0),
                area(190, 50.0, 800.0, 550.0, 200.0),
            ],
            // a party name may wrap; its dates sit on the first line
            layout: LayoutOptions {
                key_columns: vec![1, 2],
                ..LayoutOptions::default()
            },
            manual: vec![
                manual("Macau", "23 May 2006"),
                manual("Hong Kong", "20 March 2008"),
            ],
            panel: TreatyPanel::default(),
            output: OutputConfig::new("MARPOL_Status_2024.xlsx"),
        }
    }
}

/// Name the positional columns and stack the per-page tables.
pub fn raw_table(raws: &[RawTable]) -> Result<Table> {
    let names = [COUNTRY, SIGNATURE, ENTRY_INTO_FORCE];
    let mut tables = Vec::with_capacity(raws.len());
    for raw in raws {
        let width = raw.width();
        let columns: Vec<String> = (0..width)
            .map(|i| names.get(i).map(|n| n.to_string()).unwrap_or_else(|| format!("Column {}", i + 1)))
            .collect();
        let mut table = Table::new(columns);
        for cells in &raw.rows {
            let mut row: Vec<Cell> = cells.iter().map(Cell::text).collect();
            row.resize(width, Cell::Empty);
            table.push_row(row)?;
        }
        tables.push(table);
    }
    let mut table = Table::concat(&tables);
    for name in names {
        table.ensure_column(name);
    }
    Ok(table)
}

/// Join names wrapped over several lines and drop footnote markers
/// (`"Chile (a)"` → `"Chile"`).
pub fn clean_countries(table: &mut Table) -> Result<()> {
    table.map_column(COUNTRY, |cell| match cell {
        Cell::Text(s) => {
            let joined = s
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            Cell::text(joined.split(" (").next().unwrap_or_default().trim())
        }
        other => other.clone(),
    })
}

/// Tables from every configured area, in order, with manual entries merged.
#[instrument(level = "info", skip(report, cfg), fields(areas = cfg.areas.len()))]
pub fn extract(report: &PdfReport, cfg: &Config) -> Result<Table> {
    let mut raws = Vec::new();
    for area in &cfg.areas {
        let found = report
            .extract_tables(area.page, Some(area.region), &cfg.layout)
            .with_context(|| format!("reading table area {} on page {}", area.region, area.page))?;
        info!(page = area.page, tables = found.len(), "area read");
        raws.extend(found);
    }

    let mut table = raw_table(&raws)?;
    clean_countries(&mut table)?;
    let records: Vec<ManualRecord> = cfg.manual.iter().map(ManualEntry::record).collect();
    table.upsert(COUNTRY, &records)?;
    Ok(table)
}

fn readme(cfg: &Config) -> Vec<String> {
    let p = &cfg.panel;
    vec![
        "Data Source:".to_string(),
        "IMO status of treaties report (MARPOL_Status_2024.pdf), MARPOL Annex VI table.".to_string(),
        format!(
            "Pages read: {}",
            cfg.areas
                .iter()
                .map(|a| a.page.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        "Macau and Hong Kong are not listed in the table and were added manually.".to_string(),
        String::new(),
        "Sheets:".to_string(),
        "   • raw data: country, signature date and entry-into-force date as printed".to_string(),
        format!(
            "   • panel data: one row per country and year, {} to {}",
            p.first_year, p.last_year
        ),
        String::new(),
        "Variables:".to_string(),
        format!(
            "   • {}: 1 from the year of signature on, 0 before; blank before {}",
            p.sign_name(),
            p.sign_cutoff
        ),
        format!(
            "   • {}: 1 from the year of entry into force on, 0 before; blank before {} (entry into force of Annex VI)",
            p.effect_name(),
            p.effect_cutoff
        ),
        String::new(),
        "The file is produced by the marpol_pdf binary of capscrape.".to_string(),
    ]
}

pub fn workbook(raw: Table, panel: Table, cfg: &Config) -> Workbook {
    Workbook::new()
        .with_sheet(Sheet::data("raw data", raw))
        .with_sheet(Sheet::data("panel data", panel))
        .with_sheet(Sheet::readme("Readme", readme_lines(readme(cfg))))
}

/// Extract, build the panel and write; returns `(raw, panel)`.
pub fn run_report(report: &PdfReport, cfg: &Config) -> Result<(Table, Table)> {
    let raw = extract(report, cfg)?;
    let panel = treaty_indicators(&raw, &cfg.panel)?;
    info!(countries = raw.len(), panel_rows = panel.len(), "MARPOL panel built");

    cfg.output.write_copies(&panel)?;
    export::xlsx::write(&cfg.output.xlsx, &workbook(raw.clone(), panel.clone(), cfg))?;
    Ok((raw, panel))
}

pub fn run(cfg: &Config) -> Result<()> {
    let report = PdfReport::open(&cfg.pdf)?;
    run_report(&report, cfg).map(|_| ())
}
