use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use somnus::analytics::{AnalyticsEngine, SqliteAnalytics};
use somnus::config::SomnusConfig;
use somnus::{db, server};

#[derive(Parser)]
#[command(name = "somnus", version, about = "Sleep science explainer backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Evict interactions and sessions older than the retention window
    Cleanup {
        /// Days of data to keep
        #[arg(long, default_value_t = 90)]
        days: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = SomnusConfig::load()?;

    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    match cli.command {
        Command::Serve => {
            server::serve(config).await?;
        }
        Command::Cleanup { days } => {
            cleanup(&config, days).await?;
        }
    }

    Ok(())
}

/// Run a one-off retention cleanup against the durable store.
async fn cleanup(config: &SomnusConfig, days: u32) -> Result<()> {
    if config.storage.backend != "sqlite" {
        anyhow::bail!("retention cleanup requires the sqlite backend (memory data dies with the process)");
    }

    let conn = db::open_database(config.resolved_db_path())?;
    let engine = SqliteAnalytics::new(std::sync::Arc::new(std::sync::Mutex::new(conn)));
    let outcome = engine
        .cleanup(days)
        .await
        .map_err(|e| anyhow::anyhow!("cleanup failed: {e}"))?;

    println!(
        "Removed {} interactions and {} user sessions older than {} days (cutoff {}).",
        outcome.removed_interactions,
        outcome.removed_sessions,
        days,
        outcome.cutoff.format("%Y-%m-%d %H:%M UTC"),
    );

    Ok(())
}
