use anyhow::Result;
use clap::{Parser, Subcommand};
use teamhub_api::{config, migrator};
use tracing::info;

/// Apply or roll back the embedded schema migrations.
#[derive(Debug, Parser)]
#[command(name = "migration", version)]
struct Cli {
    /// Database URL; falls back to the loaded application config
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply all pending migrations (default)
    Up,
    /// Roll back the most recent migrations
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let database_url = match cli.database_url {
        Some(url) => {
            config::init_tracing("info", false);
            url
        }
        None => {
            let cfg = config::load_config()?;
            config::init_tracing(cfg.log_level(), cfg.log_json);
            cfg.database_url
        }
    };

    match cli.command.unwrap_or(Command::Up) {
        Command::Up => migrator::run_migration(&database_url).await?,
        Command::Down { steps } => migrator::rollback_migration(&database_url, steps).await?,
    }

    info!("Migration command finished");
    Ok(())
}
