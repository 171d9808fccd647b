mod app;
mod config;
mod error;
mod ledger;
mod local_state;
mod ui;

use std::{fs::OpenOptions, sync::Mutex};

use crate::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load()?;

    // The terminal is owned by the grid, so logs go to a file.
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "grid_tui={level},grid_engine={level}",
            level = config.level
        ))
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .init();

    let mut app = app::App::new(config)?;
    app.run().await?;
    Ok(())
}
