// src/sources/lvc.rs
//! Land value capture instruments per country, read from the country
//! tables of the OECD / Lincoln Institute compendium PDF.

use anyhow::Result;
use serde::Deserialize;
use std::{ops::RangeInclusive, path::PathBuf};
use tracing::{info, instrument, warn};

use crate::config::OutputConfig;
use crate::export::{self, readme_lines, Sheet, Workbook};
use crate::extract::valid_years;
use crate::fetch::{LayoutOptions, PdfReport, RawTable, Region};
use crate::table::{Cell, Table};

pub const COUNTRY: &str = "Country";
pub const YEAR: &str = "Year";
pub const YEARS: &str = "Years";

const README: &[&str] = &[
    "Data Source:",
    "Country tables of the OECD / Lincoln Institute of Land Policy global compendium of land value capture policies (LVC_full_report.pdf).",
    "Tables are read from the country pages listed in the report's table of contents (printed page number + 2).",
    "",
    "Variables:",
    "   • Instrument (OECD-Lincoln taxonomy): carried down to the rows listed under it",
    "   • Local name, National legal provision, Implementation, Use: as printed in the report",
    "   • Country",
    "   • Year: first year between 1800 and 2025 mentioned in the national legal provision",
    "   • Years: every such year, separated by '; '",
    "",
    "The 'No year recognised' sheet lists provisions in force for which no year could be read.",
    "The file is produced by the lvc_pdf binary of capscrape.",
];

#[derive(Debug, Clone, Deserialize)]
pub struct CountryPage {
    pub country: String,
    /// Page number as printed in the report's table of contents.
    pub page: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pdf: PathBuf,
    /// Added to every table-of-contents page to get the PDF page.
    pub page_offset: u32,
    pub countries: Vec<CountryPage>,
    pub columns: Vec<String>,
    /// Column holding the law text that years are read from.
    pub provision_column: String,
    pub first_valid_year: i32,
    pub last_valid_year: i32,
    /// Provision values meaning "no legal provision".
    pub no_provision: Vec<String>,
    pub region: Option<Region>,
    pub layout: LayoutOptions,
    pub output: OutputConfig,
}

const TOC: &[(&str, u32)] = &[
    ("Argentina", 42),
    ("Australia", 46),
    ("Austria", 50),
    ("Bangladesh", 54),
    ("Belgium", 57),
    ("Brazil", 61),
    ("Canada", 64),
    ("Chile", 67),
    ("China, People’s Republic of", 71),
    ("Colombia", 75),
    ("Costa Rica", 79),
    ("Czech Republic", 82),
    ("Denmark", 85),
    ("Dominican Republic", 89),
    ("Ecuador", 92),
    ("Egypt", 96),
    ("Estonia", 100),
    ("Ethiopia", 103),
    ("Finland", 106),
    ("France", 110),
    ("Germany", 114),
    ("Ghana", 120),
    ("Greece", 123),
    ("Hong Kong", 126),
    ("Hungary", 129),
    ("India", 131),
    ("Indonesia", 135),
    ("Ireland", 138),
    ("Israel", 141),
    ("Italy", 146),
    ("Japan", 152),
    ("Korea", 156),
    ("Latvia", 160),
    ("Lithuania", 163),
    ("Luxembourg", 166),
    ("Mexico", 168),
    ("Morocco", 172),
    ("Namibia", 175),
    ("Netherlands", 177),
    ("New Zealand", 180),
    ("Nigeria", 183),
    ("Norway", 186),
    ("Pakistan", 189),
    ("Peru", 192),
    ("Poland", 196),
    ("Portugal", 200),
    ("Singapore", 204),
    ("Slovak Republic", 208),
    ("Slovenia", 212),
    ("South Africa", 216),
    ("Spain", 220),
    ("Sweden", 224),
    ("Switzerland", 227),
    ("Tunisia", 230),
    ("Turkey", 233),
    ("Uganda", 237),
    ("Ukraine", 239),
    ("United Kingdom", 242),
    ("United States", 245),
    ("Vietnam", 249),
];

impl Default for Config {
    fn default() -> Self {
        Self {
            pdf: "LVC_full_report.pdf".into(),
            page_offset: 2,
            countries: TOC
                .iter()
                .map(|&(country, page)| CountryPage {
                    country: country.into(),
                    page,
                })
                .collect(),
            columns: [
                "Instrument (OECD-Lincoln taxonomy)",
                "Local name",
                "National legal provision",
                "Implementation",
                "Use",
            ]
            .map(String::from)
            .to_vec(),
            provision_column: "National legal provision".into(),
            first_valid_year: 1800,
            last_valid_year: 2025,
            no_provision: ["None", "No", "n/a", "N/A"].map(String::from).to_vec(),
            region: None,
            layout: LayoutOptions::default(),
            output: OutputConfig::new("LVC.xlsx"),
        }
    }
}

impl Config {
    fn year_range(&self) -> RangeInclusive<i32> {
        self.first_valid_year..=self.last_valid_year
    }

    fn instrument_column(&self) -> Option<&str> {
        self.columns.first().map(String::as_str)
    }
}

/// Name the raw columns (extra ones `Column <n>`), tag every row with the
/// country, clean the text, drop repeated header rows and carry the
/// instrument category down.
pub fn country_table(raw: &RawTable, country: &str, cfg: &Config) -> Result<Table> {
    let width = raw.width();
    let mut columns: Vec<String> = (0..width)
        .map(|i| cfg.columns.get(i).cloned().unwrap_or_else(|| format!("Column {}", i + 1)))
        .collect();
    columns.push(COUNTRY.to_string());

    let mut table = Table::new(columns);
    for cells in &raw.rows {
        let mut row: Vec<Cell> = cells.iter().map(Cell::text).collect();
        row.resize(width, Cell::Empty);
        row.push(Cell::text(country));
        table.push_row(row)?;
    }
    table.clean_text();

    if let Some(instrument) = cfg.instrument_column().filter(|_| width > 0) {
        let idx = table.require_column(instrument)?;
        table.retain(|row| row[idx].as_text() != Some(instrument));
        table.forward_fill(instrument)?;
    }
    Ok(table)
}

/// `Year` (first valid year) and `Years` (all of them) from the provision.
pub fn add_years(table: &mut Table, provision: &str, range: &RangeInclusive<i32>) -> Result<()> {
    let idx = table.require_column(provision)?;
    let years: Vec<Vec<i32>> = table
        .rows
        .iter()
        .map(|row| row[idx].as_text().map(|t| valid_years(t, range)).unwrap_or_default())
        .collect();

    let year_idx = table.ensure_column(YEAR);
    let years_idx = table.ensure_column(YEARS);
    for (row, found) in table.rows.iter_mut().zip(years) {
        row[year_idx] = found.first().copied().into();
        let joined: Vec<String> = found.iter().map(i32::to_string).collect();
        row[years_idx] = Cell::text(joined.join("; "));
    }
    Ok(())
}

/// Rows with a legal provision in force but no year recognised in it.
pub fn no_year_subset(table: &Table, provision: &str, no_provision: &[String]) -> Result<Table> {
    let p = table.require_column(provision)?;
    let y = table.require_column(YEAR)?;
    let mut subset = table.clone();
    subset.retain(|row| {
        let in_force = match &row[p] {
            Cell::Text(s) => !no_provision.iter().any(|n| n == s),
            _ => false,
        };
        in_force && row[y].is_empty()
    });
    Ok(subset)
}

/// Every configured country's table, concatenated in configuration order.
/// Countries whose page cannot be read or holds no table are skipped.
#[instrument(level = "info", skip(report, cfg), fields(countries = cfg.countries.len()))]
pub fn extract(report: &PdfReport, cfg: &Config) -> Result<Table> {
    let mut tables = Vec::new();
    let mut dropped = 0usize;
    for entry in &cfg.countries {
        let page = entry.page + cfg.page_offset;
        let raws = match report.extract_tables(page, cfg.region, &cfg.layout) {
            Ok(r) => r,
            Err(e) => {
                warn!(country = %entry.country, page, error = %format!("{:#}", e), "page unreadable");
                dropped += 1;
                continue;
            }
        };
        if raws.is_empty() {
            warn!(country = %entry.country, page, "no table on page");
            dropped += 1;
            continue;
        }
        for raw in &raws {
            tables.push(country_table(raw, &entry.country, cfg)?);
        }
        info!(country = %entry.country, page, "data extracted");
    }
    if dropped > 0 {
        warn!(dropped, "countries without a table");
    }

    let mut combined = Table::concat(&tables);
    if !combined.is_empty() {
        add_years(&mut combined, &cfg.provision_column, &cfg.year_range())?;
    }
    Ok(combined)
}

pub fn workbook(combined: Table, no_year: Table) -> Workbook {
    Workbook::new()
        .with_sheet(Sheet::data("Combined", combined))
        .with_sheet(Sheet::data("No year recognised", no_year))
        .with_sheet(Sheet::readme("Readme", readme_lines(README.iter().copied())))
}

pub fn run(cfg: &Config) -> Result<()> {
    let report = PdfReport::open(&cfg.pdf)?;
    let combined = extract(&report, cfg)?;
    let no_year = if combined.is_empty() {
        Table::default()
    } else {
        no_year_subset(&combined, &cfg.provision_column, &cfg.no_provision)?
    };
    info!(rows = combined.len(), without_year = no_year.len(), "LVC tables combined");

    cfg.output.write_copies(&combined)?;
    export::xlsx::write(&cfg.output.xlsx, &workbook(combined, no_year))
}
