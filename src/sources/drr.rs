// src/sources/drr.rs
//! Sendai Monitor national DRR strategy subindicators (e1a1..e1a10), one
//! browser session per pass, for the Sendai (2015-2024) and Hyogo
//! (2005-2015) reporting cycles.

use anyhow::{bail, Result};
use serde::Deserialize;
use std::{future::Future, path::PathBuf, time::Duration};
use tokio::time::sleep;
use tracing::{info, instrument, warn};

use crate::config::OutputConfig;
use crate::export::{self, readme_lines, Sheet, Workbook};
use crate::fetch::{BrowserConfig, BrowserSession, WebDriverSession};
use crate::retry::{collect_with_retry, RetryReport};
use crate::table::{Cell, Table};

pub const COUNTRY: &str = "Country";
pub const YEAR: &str = "Year";
pub const COUNTRY_CODE: &str = "Country_Code";
const JOIN_KEYS: [&str; 3] = [COUNTRY, YEAR, COUNTRY_CODE];

const README: &[&str] = &[
    "Data Source:",
    "This dataset is extracted from the Sendai Monitor (UNDRR) website, which provides data on subindicators related to disaster risk reduction strategies.",
    "https://sendaimonitor.undrr.org/analytics/country-global-target/20/6?indicator=73",
    "",
    "Data is scraped by the drr_subindicators binary of capscrape.",
    "Beware: a full run takes several hours.",
    "The data for the years 2005-2015 (Hyogo Framework) and 2015-2024 (Sendai Framework) were extracted separately and then combined.",
    "",
    "Variables:",
    "   • Country",
    "   • Country_Code: numeric code used in the Sendai Monitor URL",
    "   • Year",
    "   • e1a[i]: Subindicator data for each subindicator (e1a1 to e1a10).",
    "",
    "Notes on subindicators:",
    "• 1: Have objectives and measures aimed at reducing existing risk",
    "• 2: Have objectives and measures aimed at preventing the creation of risk",
    "• 3: Have objectives and measures aimed at strengthening economic, social, health, and environmental resilience",
    "• 4: Have time frames, targets, and indicators",
    "• 5: Address Priority 1 recommendations and suggestions",
    "• 6: Address Priority 2 recommendations and suggestions",
    "• 7: Address Priority 3 recommendations and suggestions",
    "• 8: Address Priority 4 recommendations and suggestions",
    "• 9: Interacted at all levels with development and poverty eradication plans and policy, notably with the SDGs.",
    "• 10: Promote coherence, interaction, and compliance with CC adaptation and mitigation plans, with the Paris Agreement",
    "",
    "Please refer to the 'Data' sheet for the processed data.",
];

/// Page locations. Templates take the 1-based index or cycle year in `{}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Xpaths {
    pub subindicator_dropdown: String,
    pub subindicator_option: String,
    pub cycle_dropdown: String,
    pub cycle_option: String,
    pub table_button: String,
    pub country_name: String,
    pub table: String,
    /// Relative to `table`.
    pub rows: String,
    /// Relative to a row.
    pub year_cell: String,
    pub value_cell: String,
}

const ANALYTICS: &str = "/html/body/sfm-root/sfm-top-image-layout/div/div[3]/sfm-analytics-home";
const EVOLUTION: &str = "div/div[5]/sfm-analytics-country-target/div/div/sfm-analytics-comparison-criteria/sfm-analytics-evolution/div/div[2]";
const DROPDOWN: &str =
    "div/div[3]/div[2]/sfm-indicators-with-fields/div/div[2]/div/sfm-dropdown-select/div/ul";

impl Default for Xpaths {
    fn default() -> Self {
        Self {
            subindicator_dropdown: format!("{ANALYTICS}/{DROPDOWN}"),
            subindicator_option: format!("{ANALYTICS}/{DROPDOWN}/li/ul/div/li[{{}}]/span"),
            cycle_dropdown: r#"//div[@class="message-wrapper button-color"]/span"#.into(),
            cycle_option: r#"//span[@data-test="dropdownMenu-cycle.{}"]"#.into(),
            table_button: format!("{ANALYTICS}/{EVOLUTION}/div[1]/sfm-button-group/div/div[2]/i"),
            country_name: format!("{ANALYTICS}/{EVOLUTION}/div[2]/table/thead/tr/th[2]/div/div/div[2]"),
            table: format!("{ANALYTICS}/{EVOLUTION}/div[2]/table"),
            rows: ".//tbody/tr".into(),
            year_cell: "./td[1]".into(),
            value_cell: "./td[2]".into(),
        }
    }
}

impl Xpaths {
    pub fn subindicator(&self, index: usize) -> String {
        self.subindicator_option.replace("{}", &index.to_string())
    }

    pub fn cycle(&self, year: i32) -> String {
        self.cycle_option.replace("{}", &year.to_string())
    }
}

/// One reporting cycle as offered by the year dropdown.
#[derive(Debug, Clone, Deserialize)]
pub struct CycleConfig {
    pub year: i32,
    /// Year labels removed from this cycle (overlap with another cycle).
    #[serde(default)]
    pub drop_years: Vec<String>,
    /// Optional CSV of this cycle alone.
    #[serde(default)]
    pub csv: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub countries: Vec<u32>,
    pub url_template: String,
    pub subindicator_prefix: String,
    pub subindicator_count: usize,
    pub cycles: Vec<CycleConfig>,
    /// Pause after UI actions that re-render the table.
    pub settle_ms: u64,
    pub xpaths: Xpaths,
    pub browser: BrowserConfig,
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            countries: (1..=193).collect(),
            url_template: "https://sendaimonitor.undrr.org/analytics/country-global-target/11/6?indicator=73&countries={}".into(),
            subindicator_prefix: "e1a".into(),
            subindicator_count: 10,
            cycles: vec![
                CycleConfig {
                    year: 2024,
                    drop_years: Vec::new(),
                    csv: Some("DRR_Sendai_2015_2024_subindicators.csv".into()),
                },
                CycleConfig {
                    year: 2005,
                    drop_years: vec!["2015".into()],
                    csv: None,
                },
            ],
            settle_ms: 1000,
            xpaths: Xpaths::default(),
            browser: BrowserConfig::default(),
            output: OutputConfig::new("DRR_Sendai_Hyogo_Subindicators_E1.xlsx"),
        }
    }
}

impl Config {
    pub fn country_url(&self, code: u32) -> String {
        self.url_template.replace("{}", &code.to_string())
    }

    fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Rows of one subindicator table for one country. Year stays text until
/// the cycles are combined.
pub fn subindicator_table(
    country: &str,
    code: u32,
    name: &str,
    rows: &[Vec<String>],
) -> Result<Table> {
    let mut table = Table::new([COUNTRY, YEAR, name, COUNTRY_CODE]);
    for row in rows {
        let year = row.first().map(String::as_str).unwrap_or_default();
        let value = row.get(1).map(String::as_str).unwrap_or_default();
        table.push_row(vec![
            Cell::text(country),
            Cell::text(year),
            Cell::text(value),
            Cell::from(code as i64),
        ])?;
    }
    Ok(table)
}

fn log_failure(result: Result<()>, action: &str) {
    if let Err(e) = result {
        warn!(error = %format!("{:#}", e), "{} failed", action);
    }
}

async fn select_subindicator<S: BrowserSession>(session: &mut S, x: &Xpaths, index: usize) {
    log_failure(session.click(&x.subindicator_dropdown).await, "opening subindicator menu");
    log_failure(session.click(&x.subindicator(index)).await, "selecting subindicator");
}

async fn select_cycle<S: BrowserSession>(session: &mut S, x: &Xpaths, year: i32) {
    log_failure(session.click(&x.cycle_dropdown).await, "opening cycle menu");
    log_failure(session.click(&x.cycle(year)).await, "selecting cycle");
}

async fn read_subindicator<S: BrowserSession>(
    session: &mut S,
    cfg: &Config,
    name: &str,
    code: u32,
) -> Result<Table> {
    sleep(cfg.settle()).await;
    let x = &cfg.xpaths;
    let country = session.text(&x.country_name).await?;
    let rows = session
        .table_rows(&x.table, &x.rows, &[x.year_cell.as_str(), x.value_cell.as_str()])
        .await?;
    info!(%country, subindicator = name, rows = rows.len(), "table extracted");
    subindicator_table(&country, code, name, &rows)
}

/// All subindicators of one country, outer-joined on (Country, Year, code).
/// Failed UI actions and failed reads are logged and skipped; only a failed
/// page load fails the country.
#[instrument(level = "info", skip(session, cfg))]
pub async fn scrape_country<S: BrowserSession>(
    session: &mut S,
    cfg: &Config,
    cycle_year: i32,
    code: u32,
) -> Result<Option<Table>> {
    let x = &cfg.xpaths;
    session.open(&cfg.country_url(code)).await?;
    log_failure(session.click(&x.table_button).await, "showing table");
    select_cycle(session, x, cycle_year).await;

    let mut merged: Option<Table> = None;
    for index in 1..=cfg.subindicator_count {
        let name = format!("{}{}", cfg.subindicator_prefix, index);
        if index == 1 {
            // the table only refreshes after the cycle change once a
            // different subindicator has been shown
            select_subindicator(session, x, 2).await;
            sleep(cfg.settle()).await;
            select_subindicator(session, x, 1).await;
            sleep(cfg.settle()).await;
        } else {
            select_subindicator(session, x, index).await;
        }

        match read_subindicator(session, cfg, &name, code).await {
            Ok(table) => {
                merged = Some(match merged {
                    None => table,
                    Some(acc) => acc.outer_join(&table, &JOIN_KEYS)?,
                });
            }
            Err(e) => warn!(
                subindicator = %name,
                error = %format!("{:#}", e),
                "failed to extract subindicator"
            ),
        }
    }
    Ok(merged.filter(|t| !t.is_empty()))
}

/// Visit `codes` in order with one session; countries that fail are logged
/// and left out.
pub async fn scrape_pass<S: BrowserSession>(
    session: &mut S,
    cfg: &Config,
    cycle_year: i32,
    codes: &[u32],
) -> Vec<(u32, Table)> {
    let mut out = Vec::new();
    for &code in codes {
        match scrape_country(session, cfg, cycle_year, code).await {
            Ok(Some(table)) => {
                info!(code, cycle = cycle_year, rows = table.len(), "country complete");
                out.push((code, table));
            }
            Ok(None) => warn!(code, cycle = cycle_year, "no data for country"),
            Err(e) => warn!(code, cycle = cycle_year, error = %format!("{:#}", e), "country failed"),
        }
    }
    out
}

async fn fresh_session_pass<S, C, CFut>(
    cfg: &Config,
    cycle_year: i32,
    connect: &C,
    codes: Vec<u32>,
) -> Result<Vec<(u32, Table)>>
where
    S: BrowserSession,
    C: Fn() -> CFut,
    CFut: Future<Output = Result<S>>,
{
    let mut session = connect().await?;
    let scraped = scrape_pass(&mut session, cfg, cycle_year, &codes).await;
    if let Err(e) = session.close().await {
        warn!(error = %format!("{:#}", e), "closing browser session failed");
    }
    Ok(scraped)
}

/// Concatenate the per-country tables of one cycle, drop its overlap years
/// and sort by (Country, Year).
pub fn finish_cycle(tables: &[Table], drop_years: &[String]) -> Result<Table> {
    let mut table = Table::concat(tables);
    if table.is_empty() {
        return Ok(table);
    }
    let year = table.require_column(YEAR)?;
    table.retain(|row| match &row[year] {
        Cell::Text(y) => !drop_years.iter().any(|d| d == y),
        _ => true,
    });
    table.sort_by(&[COUNTRY, YEAR])?;
    Ok(table)
}

/// Scrape one cycle: a first pass over every country, then one retry pass
/// with a fresh session over the countries that produced nothing.
pub async fn collect_cycle<S, C, CFut>(
    cfg: &Config,
    cycle: &CycleConfig,
    connect: C,
) -> Result<(Table, RetryReport<u32>)>
where
    S: BrowserSession,
    C: Fn() -> CFut,
    CFut: Future<Output = Result<S>>,
{
    info!(cycle = cycle.year, countries = cfg.countries.len(), "collecting cycle");
    let (items, report) = collect_with_retry(
        &cfg.countries,
        |(code, _): &(u32, Table)| *code,
        |codes: Vec<u32>| fresh_session_pass(cfg, cycle.year, &connect, codes),
    )
    .await?;

    let tables: Vec<Table> = items.into_iter().map(|(_, t)| t).collect();
    let table = finish_cycle(&tables, &cycle.drop_years)?;
    info!(
        cycle = cycle.year,
        rows = table.len(),
        dropped = report.still_missing.len(),
        "cycle collected"
    );
    Ok((table, report))
}

/// Stack the cycles, coerce Year to integers and sort by (Country, Year).
pub fn combine_cycles(cycles: &[Table]) -> Result<Table> {
    let mut table = Table::concat(cycles);
    if table.is_empty() {
        bail!("no country data collected in any cycle");
    }
    table.coerce_year(YEAR)?;
    table.sort_by(&[COUNTRY, YEAR])?;
    Ok(table)
}

pub fn workbook(data: Table) -> Workbook {
    Workbook::new()
        .with_sheet(Sheet::data("Data", data))
        .with_sheet(Sheet::readme("Readme", readme_lines(README.iter().copied())))
}

pub async fn run(cfg: &Config) -> Result<()> {
    let mut cycles = Vec::with_capacity(cfg.cycles.len());
    for cycle in &cfg.cycles {
        let (table, _report) =
            collect_cycle(cfg, cycle, || WebDriverSession::connect(&cfg.browser)).await?;
        if let Some(path) = &cycle.csv {
            export::csv::write(path, &table)?;
        }
        cycles.push(table);
    }

    let data = combine_cycles(&cycles)?;
    cfg.output.write_copies(&data)?;
    export::xlsx::write(&cfg.output.xlsx, &workbook(data))?;
    info!(path = %cfg.output.xlsx.display(), "DRR subindicators written");
    Ok(())
}
