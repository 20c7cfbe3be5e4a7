// src/bin/tg-monitor.rs
// tg-monitor CLI: a minimal non-interactive command surface sufficient to
// run the ingestion engine end to end (`run`), bring a fresh database up to
// date (`migrate`), or trigger a one-shot summarization (`summarize`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tg_monitor::bootstrap::App;
use tg_monitor::config::Config;
use tg_monitor::store::Store;
use tg_monitor::summarizer::{SummaryMode, SummaryRequest, Summarizer};

#[derive(Parser, Debug)]
#[command(name = "tg-monitor")]
#[command(author = "tg-monitor")]
#[command(version)]
#[command(about = "Ingestion, persistence, and summarization for a curated set of monitored chat rooms")]
struct CliArgs {
    /// Path to the YAML configuration file.
    #[arg(long, env = "TG_MONITOR_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start every configured tenant's Ingestion Worker and run until ctrl-c.
    Run,
    /// Open the database and apply any pending migrations, then exit.
    Migrate,
    /// Run one summarization pass and print the result to stdout.
    Summarize {
        /// Restrict to a single group id; omitted means every monitored group.
        #[arg(long)]
        group_id: Option<i64>,
        /// Window size in hours (defaults to 24).
        #[arg(long)]
        hours: Option<i64>,
        /// Persist the result to the `summaries` table.
        #[arg(long)]
        save: bool,
        /// Force per-group mode (one summary per group, merged).
        #[arg(long)]
        per_group: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = CliArgs::parse();
    let config = Config::load(&args.config).with_context(|| format!("failed to load config: {}", args.config.display()))?;

    match args.command {
        Command::Run => {
            let app = App::bootstrap(&config).await?;
            app.run().await
        }
        Command::Migrate => {
            let db_path = std::path::Path::new(&config.database.path);
            Store::connect(db_path).await.with_context(|| format!("failed to open store at {}", db_path.display()))?;
            println!("database at {} is up to date", db_path.display());
            Ok(())
        }
        Command::Summarize { group_id, hours, save, per_group } => {
            let db_path = std::path::Path::new(&config.database.path);
            let store = Store::connect(db_path).await.with_context(|| format!("failed to open store at {}", db_path.display()))?;
            let summarizer = Summarizer::new(store, &config.ai).context("failed to construct summarizer")?;

            let request = SummaryRequest {
                group_id,
                hours,
                save,
                mode: if per_group { Some(SummaryMode::PerGroup) } else { None },
                ..Default::default()
            };
            let report = summarizer
                .run(&request, |stage, step, total| {
                    tracing::info!("[{step}/{total}] {stage}");
                })
                .await
                .context("summarization failed")?;
            println!("{report}");
            Ok(())
        }
    }
}
