mod app;
mod config;
mod hooks;
mod messages;
mod player;
mod signal;
mod status;

use anyhow::Result;

use app::App;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    tracing::info!("Starting muzak agent music daemon");

    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    let app = App::new(config)?;
    app.run().await
}
