use anyhow::Result;
use capscrape::{config, logging, sources::lvc};
use tracing::info;

fn main() -> Result<()> {
    logging::init();
    let cfg: lvc::Config = config::load()?;
    info!(pdf = %cfg.pdf.display(), countries = cfg.countries.len(), "startup");
    lvc::run(&cfg)
}
