//! finrag CLI entry point.

use anyhow::Result;
use clap::Parser;
use finrag::cli::{commands, Cli, Commands};
use finrag::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real environment variables win.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config_path = cli.config.as_ref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    // `serve` logs at info or above since it runs unattended.
    let log_level = match (cli.verbose, &cli.command) {
        (0, Commands::Serve { .. }) if matches!(settings.general.log_level.as_str(), "warn" | "error") => {
            "info"
        }
        (0, _) => settings.general.log_level.as_str(),
        (1, _) => "info",
        (2, _) => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            format!("finrag={},tower_http={}", log_level, log_level)
        })))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.temp_dir())?;

    match cli.command {
        Commands::Serve { host, port } => {
            commands::run_serve(host, port, settings).await?;
        }

        Commands::Ingest { file, pages } => {
            commands::run_ingest(&file, pages, settings).await?;
        }

        Commands::Ask { question, json } => {
            commands::run_ask(&question, json, settings).await?;
        }

        Commands::Search {
            query,
            limit,
            min_score,
            brief,
        } => {
            commands::run_search(&query, limit, min_score, brief, settings).await?;
        }

        Commands::List => {
            commands::run_list(settings).await?;
        }

        Commands::Delete { source } => {
            commands::run_delete(&source, settings).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings, config_path).await?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, settings, config_path)?;
        }
    }

    Ok(())
}
