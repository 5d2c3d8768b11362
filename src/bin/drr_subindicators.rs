use anyhow::Result;
use capscrape::{config, logging, sources::drr};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cfg: drr::Config = config::load()?;
    info!(
        countries = cfg.countries.len(),
        cycles = cfg.cycles.len(),
        webdriver = %cfg.browser.webdriver_url,
        "startup"
    );
    drr::run(&cfg).await
}
