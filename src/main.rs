//! Spreadbot - Pairs Trading Mean Reversion Bot

use anyhow::Result;

use spreadbot::adapters::cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (secrets go here, not in the TOML file)
    dotenvy::dotenv().ok();

    let app = cli::init();
    cli::execute(app).await
}
