mod aggregate;
mod api;
mod app;
mod cache;
mod config;
mod dashboard;
mod error;
mod event;
mod query;
mod triggers;
mod ui;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dashq")]
#[command(about = "A terminal dashboard for the admin API with cached, self-refreshing views")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/dashq/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Open this user's detail view on start
  #[arg(short, long)]
  user: Option<String>,
}

/// Log to a file; the terminal belongs to the UI.
fn init_logging() -> Result<WorkerGuard> {
  let dir = config::Config::data_dir()?;
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create data directory {}: {}", dir.display(), e))?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
    &dir,
    "dashq.log",
  ));
  let filter =
    EnvFilter::try_from_env("DASHQ_LOG").unwrap_or_else(|_| EnvFilter::new("dashq=info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_logging()?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  // Initialize and run the app
  let mut app = app::App::new(config, args.user)?;
  app.run().await?;

  Ok(())
}
