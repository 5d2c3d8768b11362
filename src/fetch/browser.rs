// src/fetch/browser.rs
//! Browser automation behind a small session trait.
//!
//! Sources drive pages through [`BrowserSession`] only, so their control flow
//! can be exercised against an in-memory fake. [`WebDriverSession`] is the
//! real implementation on top of a WebDriver server (chromedriver etc).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use thirtyfour::prelude::*;
use thirtyfour::ChromiumLikeCapabilities;
use tracing::{debug, info};

/// Scoped handle to one browser; acquired per pass and closed at its end.
///
/// Every lookup waits up to the session's bound for the element and then
/// fails. Nothing retries inside a call.
#[allow(async_fn_in_trait)]
pub trait BrowserSession {
    async fn open(&mut self, url: &str) -> Result<()>;

    /// Wait for `xpath` to become clickable, then click it.
    async fn click(&mut self, xpath: &str) -> Result<()>;

    /// Wait for `xpath` to be present and return its visible text.
    async fn text(&mut self, xpath: &str) -> Result<String>;

    /// Wait for the table at `table_xpath`, then for each row matching
    /// `row_xpath` (relative to the table) return the text of each
    /// `cell_xpaths` entry (relative to the row).
    async fn table_rows(
        &mut self,
        table_xpath: &str,
        row_xpath: &str,
        cell_xpaths: &[&str],
    ) -> Result<Vec<Vec<String>>>;

    async fn close(self) -> Result<()>
    where
        Self: Sized;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub headless: bool,
    pub args: Vec<String>,
    /// Upper bound on every element wait.
    pub wait_secs: u64,
    pub poll_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".into(),
            headless: true,
            args: vec![
                "--no-sandbox".into(),
                "--disable-dev-shm-usage".into(),
                "--window-size=1920,1080".into(),
            ],
            wait_secs: 30,
            poll_ms: 250,
        }
    }
}

pub struct WebDriverSession {
    driver: WebDriver,
    wait: Duration,
    poll: Duration,
}

impl WebDriverSession {
    pub async fn connect(cfg: &BrowserConfig) -> Result<Self> {
        let mut caps = DesiredCapabilities::chrome();
        if cfg.headless {
            caps.set_headless()?;
        }
        for arg in &cfg.args {
            caps.add_arg(arg)?;
        }
        let driver = WebDriver::new(cfg.webdriver_url.as_str(), caps)
            .await
            .with_context(|| format!("connecting to WebDriver at {}", cfg.webdriver_url))?;
        info!(url = %cfg.webdriver_url, "browser session started");
        Ok(Self {
            driver,
            wait: Duration::from_secs(cfg.wait_secs),
            poll: Duration::from_millis(cfg.poll_ms),
        })
    }
}

impl BrowserSession for WebDriverSession {
    async fn open(&mut self, url: &str) -> Result<()> {
        debug!(url, "navigating");
        self.driver
            .goto(url)
            .await
            .with_context(|| format!("navigating to {}", url))
    }

    async fn click(&mut self, xpath: &str) -> Result<()> {
        let el = self
            .driver
            .query(By::XPath(xpath))
            .wait(self.wait, self.poll)
            .and_clickable()
            .first()
            .await
            .with_context(|| format!("waiting for clickable {}", xpath))?;
        el.click()
            .await
            .with_context(|| format!("clicking {}", xpath))
    }

    async fn text(&mut self, xpath: &str) -> Result<String> {
        let el = self
            .driver
            .query(By::XPath(xpath))
            .wait(self.wait, self.poll)
            .first()
            .await
            .with_context(|| format!("waiting for {}", xpath))?;
        Ok(el.text().await?)
    }

    async fn table_rows(
        &mut self,
        table_xpath: &str,
        row_xpath: &str,
        cell_xpaths: &[&str],
    ) -> Result<Vec<Vec<String>>> {
        let table = self
            .driver
            .query(By::XPath(table_xpath))
            .wait(self.wait, self.poll)
            .first()
            .await
            .with_context(|| format!("waiting for table {}", table_xpath))?;

        let mut out = Vec::new();
        for row in table.find_all(By::XPath(row_xpath)).await? {
            let mut cells = Vec::with_capacity(cell_xpaths.len());
            for xp in cell_xpaths {
                cells.push(row.find(By::XPath(*xp)).await?.text().await?);
            }
            out.push(cells);
        }
        Ok(out)
    }

    async fn close(self) -> Result<()> {
        self.driver.quit().await.context("quitting browser")?;
        info!("browser session closed");
        Ok(())
    }
}
