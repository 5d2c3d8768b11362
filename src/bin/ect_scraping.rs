use anyhow::Result;
use capscrape::{config, logging, sources::ect};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cfg: ect::Config = config::load()?;
    info!(index = %cfg.index_url, output = %cfg.output.xlsx.display(), "startup");
    ect::run(&cfg).await
}
