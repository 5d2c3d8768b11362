use anyhow::Result;
use capscrape::{config, logging, sources::marpol};
use tracing::info;

fn main() -> Result<()> {
    logging::init();
    let cfg: marpol::Config = config::load()?;
    info!(pdf = %cfg.pdf.display(), areas = cfg.areas.len(), "startup");
    marpol::run(&cfg)
}
