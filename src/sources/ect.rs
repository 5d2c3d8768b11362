// src/sources/ect.rs
//! Energy Charter Treaty signature / ratification status per contracting
//! party, scraped from the treaty's public country pages.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use url::Url;

use crate::config::OutputConfig;
use crate::export::{self, readme_lines, Sheet, Workbook};
use crate::extract::{extract_year_after_prefix, items_after_anchor, parse_year_lenient, title_links, AnchorScan};
use crate::fetch::get_text_with_retry;
use crate::table::merge::ManualRecord;
use crate::table::{Cell, Table};

pub const COUNTRY: &str = "Country";

/// Columns filled, in order, from the list items under the treaty label.
/// Items beyond the last one are folded into it.
pub const ITEM_COLUMNS: [&str; 5] = [
    "Signature",
    "Ratification",
    "Deposition",
    "Entry into Force",
    "Additional",
];

/// (derived year column, source column, phrase preceding the date)
pub const DATE_COLUMNS: [(&str, &str, &str); 4] = [
    ("date_sign", "Signature", "signed on"),
    ("date_ratification", "Ratification", "ratified on"),
    ("date_deposit", "Deposition", "deposited on"),
    ("date_entry_force", "Entry into Force", "entered into force on"),
];

pub const WITHDRAWAL_NOTIFICATION: &str = "date_withdrawal_notification";
pub const WITHDRAWAL_EFFECT: &str = "date_withdrawal_effect";

const README: &[&str] = &[
    "This file contains the data scraped from the Energy Charter Treaty website: ",
    "https://www.energychartertreaty.org/treaty/contracting-parties-and-signatories/",
    "Countries Italy, France, Germany, and Poland have already effectively withdrawn from the treaty at the time of the data extraction (July 2024), ",
    "so their withdrawal and signature dates did not appear on the website and were manually added.",
    "Withdrawal notifications of Luxembourg, the European Union and Euratom, Spain and the United Kingdom were added manually as well.",
    "The file is produced by the ect_scraping binary of capscrape.",
];

/// Hand-curated withdrawal dates. Values are ISO dates, or `N.A.` which is
/// kept verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct Withdrawal {
    pub country: String,
    pub notification: Option<String>,
    pub effect: Option<String>,
    #[serde(default)]
    pub ratification: Option<String>,
}

impl Withdrawal {
    fn new(country: &str, notification: &str, effect: &str, ratification: Option<&str>) -> Self {
        Self {
            country: country.into(),
            notification: Some(notification.into()),
            effect: Some(effect.into()),
            ratification: ratification.map(Into::into),
        }
    }

    pub fn record(&self) -> ManualRecord {
        let fields = [
            (WITHDRAWAL_NOTIFICATION, &self.notification),
            (WITHDRAWAL_EFFECT, &self.effect),
            ("date_ratification", &self.ratification),
        ];
        fields
            .into_iter()
            .filter_map(|(col, v)| v.as_deref().map(|v| (col, v)))
            .fold(ManualRecord::new(self.country.as_str()), |rec, (col, v)| {
                rec.with(col, manual_value(v))
            })
    }
}

fn manual_value(v: &str) -> Cell {
    if v.trim() == "N.A." {
        return Cell::text(v);
    }
    match parse_year_lenient(v) {
        Some(y) => Cell::from(y),
        None => {
            warn!(value = v, "unparsable manual date");
            Cell::Empty
        }
    }
}

pub fn default_withdrawals() -> Vec<Withdrawal> {
    vec![
        Withdrawal::new("Italy", "2014-12-31", "2016-01-01", Some("1997-12-05")),
        Withdrawal::new("France", "2022-12-07", "2023-12-08", Some("1999-09-01")),
        Withdrawal::new("Germany", "2022-12-19", "2023-12-20", Some("1997-03-14")),
        Withdrawal::new("Poland", "2022-12-28", "2023-12-29", Some("2000-11-24")),
        Withdrawal::new("Luxembourg", "2023-06-16", "2024-06-17", None),
        Withdrawal::new("European Union and Euratom", "2024-05-30", "2025-05-30", None),
        Withdrawal::new("Spain", "2024-04-16", "2025-04-17", None),
        Withdrawal::new("United Kingdom", "2024-04-26", "2025-04-27", None),
    ]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub index_url: String,
    /// Base that relative country links are resolved against.
    pub base_url: String,
    pub link_container: String,
    pub anchor_tag: String,
    pub anchor_text: String,
    pub min_items: usize,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub withdrawals: Vec<Withdrawal>,
    pub sheet_name: String,
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_url: "https://www.energychartertreaty.org/treaty/contracting-parties-and-signatories/".into(),
            base_url: "https://www.energychartertreaty.org".into(),
            link_container: "figure.image".into(),
            anchor_tag: "strong".into(),
            anchor_text: "1994 Energy Charter Treaty".into(),
            min_items: 4,
            max_retries: 0,
            initial_backoff_ms: 500,
            withdrawals: default_withdrawals(),
            sheet_name: "Energy_charter_treaty_2024".into(),
            output: OutputConfig::new("Energy_charter_treaty_2024.xlsx"),
        }
    }
}

impl Config {
    fn scan(&self) -> AnchorScan<'_> {
        AnchorScan {
            anchor_tag: &self.anchor_tag,
            anchor_text: &self.anchor_text,
            item_tag: "li",
            min_items: self.min_items,
        }
    }
}

/// What the treaty section of one country page says.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryRecord {
    pub country: String,
    pub title: String,
    pub items: Vec<Option<String>>,
}

/// Parse one country page; `None` when the page has no treaty section.
pub fn parse_country_page(country: &str, html: &str, cfg: &Config) -> Result<Option<CountryRecord>> {
    Ok(items_after_anchor(html, &cfg.scan())?.map(|section| CountryRecord {
        country: country.to_string(),
        title: section.title,
        items: section.items,
    }))
}

/// Fetch the index and every linked country page. Pages that fail to load
/// or lack the treaty section are logged and skipped.
#[instrument(level = "info", skip(client, cfg), fields(index = %cfg.index_url))]
pub async fn collect(client: &Client, cfg: &Config) -> Result<Vec<CountryRecord>> {
    let index_url = Url::parse(&cfg.index_url)
        .with_context(|| format!("invalid index URL {:?}", cfg.index_url))?;
    let base = Url::parse(&cfg.base_url)
        .with_context(|| format!("invalid base URL {:?}", cfg.base_url))?;

    let index = get_text_with_retry(client, &index_url, cfg.max_retries, cfg.initial_backoff_ms)
        .await
        .context("fetching contracting parties index")?;
    let links = title_links(&index, &cfg.link_container, &base)?;
    info!(countries = links.len(), "country links found");

    let mut records = Vec::with_capacity(links.len());
    let mut dropped = 0usize;
    for (country, url) in &links {
        info!(%country, %url, "processing country");
        let page = match get_text_with_retry(client, url, cfg.max_retries, cfg.initial_backoff_ms).await {
            Ok(p) => p,
            Err(e) => {
                warn!(%country, error = %format!("{:#}", e), "country page failed");
                dropped += 1;
                continue;
            }
        };
        match parse_country_page(country, &page, cfg)? {
            Some(rec) => records.push(rec),
            None => {
                warn!(%country, "no treaty section on page");
                dropped += 1;
            }
        }
    }
    if dropped > 0 {
        warn!(dropped, kept = records.len(), "countries without treaty data");
    }
    Ok(records)
}

/// Status table with the derived year columns and empty withdrawal columns.
pub fn build_table(records: &[CountryRecord]) -> Result<Table> {
    let mut columns = vec![COUNTRY, "Title"];
    columns.extend(ITEM_COLUMNS);
    let mut table = Table::new(columns);

    for rec in records {
        let mut row = vec![Cell::text(&rec.country), Cell::text(&rec.title)];
        let (head, tail) = rec.items.split_at(rec.items.len().min(ITEM_COLUMNS.len() - 1));
        row.extend(head.iter().map(|i| Cell::from(i.clone())));
        row.resize(ITEM_COLUMNS.len() + 1, Cell::Empty);
        let extra: Vec<&str> = tail.iter().flatten().map(String::as_str).collect();
        row.push(Cell::text(extra.join("; ")));
        table.push_row(row)?;
    }

    for (derived, source, prefix) in DATE_COLUMNS {
        let idx = table.require_column(source)?;
        table.derive_column(derived, |row| match &row[idx] {
            Cell::Text(s) => extract_year_after_prefix(s, prefix).into(),
            _ => Cell::Empty,
        });
    }
    table.ensure_column(WITHDRAWAL_NOTIFICATION);
    table.ensure_column(WITHDRAWAL_EFFECT);
    Ok(table)
}

pub fn apply_withdrawals(table: &mut Table, withdrawals: &[Withdrawal]) -> Result<()> {
    let records: Vec<ManualRecord> = withdrawals.iter().map(Withdrawal::record).collect();
    table.upsert(COUNTRY, &records)
}

/// Readme first, then the data sheet.
pub fn workbook(table: Table, sheet_name: &str) -> Workbook {
    Workbook::new()
        .with_sheet(Sheet::readme("Readme", readme_lines(README.iter().copied())))
        .with_sheet(Sheet::data(sheet_name, table))
}

/// Scrape, normalise and write; returns the final table.
pub async fn run_with_client(client: &Client, cfg: &Config) -> Result<Table> {
    let records = collect(client, cfg).await?;
    let mut table = build_table(&records)?;
    apply_withdrawals(&mut table, &cfg.withdrawals)?;

    cfg.output.write_copies(&table)?;
    export::xlsx::write(&cfg.output.xlsx, &workbook(table.clone(), &cfg.sheet_name))?;
    info!(rows = table.len(), path = %cfg.output.xlsx.display(), "scraping completed");
    Ok(table)
}

pub async fn run(cfg: &Config) -> Result<()> {
    let client = Client::builder()
        .user_agent(concat!("capscrape/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building HTTP client")?;
    run_with_client(&client, cfg).await.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <h2>Albania</h2>
          <p><strong>1994 Energy Charter Treaty</strong></p>
          <ul>
            <li>signed on 17 December 1994</li>
            <li>ratified on 05 December 1997</li>
            <li>deposited on 13 February 1998</li>
            <li>entered into force on 16 April 1998</li>
            <li>provisional application</li>
            <li>declaration under Article 45</li>
          </ul>
          <p><strong>Energy Charter Protocol</strong></p>
          <ul><li>signed on 17 December 1994</li></ul>
        </body></html>"#;

    fn record(country: &str, items: &[&str]) -> CountryRecord {
        let mut items: Vec<Option<String>> = items.iter().map(|s| Some(s.to_string())).collect();
        while items.len() < 4 {
            items.push(None);
        }
        CountryRecord {
            country: country.into(),
            title: "1994 Energy Charter Treaty".into(),
            items,
        }
    }

    #[test]
    fn parses_treaty_section_only() -> Result<()> {
        let rec = parse_country_page("Albania", PAGE, &Config::default())?.unwrap();
        assert_eq!(rec.items.len(), 6);
        assert_eq!(rec.items[1].as_deref(), Some("ratified on 05 December 1997"));
        assert!(parse_country_page("X", "<p>none</p>", &Config::default())?.is_none());
        Ok(())
    }

    #[test]
    fn table_derives_years_and_folds_extra_items() -> Result<()> {
        let rec = parse_country_page("Albania", PAGE, &Config::default())?.unwrap();
        let table = build_table(&[rec])?;
        assert_eq!(table.get(0, "date_sign"), Some(&Cell::Int(1994)));
        assert_eq!(table.get(0, "date_ratification"), Some(&Cell::Int(1997)));
        assert_eq!(table.get(0, "date_deposit"), Some(&Cell::Int(1998)));
        assert_eq!(table.get(0, "date_entry_force"), Some(&Cell::Int(1998)));
        assert_eq!(
            table.get(0, "Additional"),
            Some(&Cell::Text("provisional application; declaration under Article 45".into()))
        );
        assert_eq!(table.get(0, WITHDRAWAL_EFFECT), Some(&Cell::Empty));
        Ok(())
    }

    #[test]
    fn missing_items_leave_years_absent() -> Result<()> {
        let table = build_table(&[record("Chile", &["signed on 17 December 1994"])])?;
        assert_eq!(table.get(0, "Ratification"), Some(&Cell::Empty));
        assert_eq!(table.get(0, "date_ratification"), Some(&Cell::Empty));
        assert_eq!(table.get(0, "Additional"), Some(&Cell::Empty));
        Ok(())
    }

    #[test]
    fn withdrawals_overwrite_or_append() -> Result<()> {
        let mut table = build_table(&[
            record("Italy", &["signed on 17 December 1994"]),
            record("Albania", &["signed on 17 December 1994"]),
        ])?;
        apply_withdrawals(&mut table, &default_withdrawals())?;

        assert_eq!(table.len(), 9);
        assert_eq!(table.get(0, "date_ratification"), Some(&Cell::Int(1997)));
        assert_eq!(table.get(0, WITHDRAWAL_EFFECT), Some(&Cell::Int(2016)));
        assert_eq!(table.get(1, WITHDRAWAL_EFFECT), Some(&Cell::Empty));

        let uk = (0..table.len())
            .find(|&i| table.get(i, COUNTRY) == Some(&Cell::Text("United Kingdom".into())))
            .unwrap();
        assert_eq!(table.get(uk, WITHDRAWAL_NOTIFICATION), Some(&Cell::Int(2024)));
        assert_eq!(table.get(uk, "date_sign"), Some(&Cell::Empty));
        Ok(())
    }

    #[test]
    fn not_available_is_kept_as_text() {
        let w = Withdrawal {
            country: "Nowhere".into(),
            notification: Some("N.A.".into()),
            effect: None,
            ratification: None,
        };
        let rec = w.record();
        assert_eq!(rec.values, vec![(WITHDRAWAL_NOTIFICATION.to_string(), Cell::Text("N.A.".into()))]);
    }

    #[test]
    fn readme_comes_first() {
        let wb = workbook(Table::new([COUNTRY]), "Energy_charter_treaty_2024");
        assert_eq!(wb.sheets[0].name(), "Readme");
        assert_eq!(wb.sheets[1].name(), "Energy_charter_treaty_2024");
    }
}
