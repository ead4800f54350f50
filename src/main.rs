use std::path::PathBuf;

use chrono::Local;
use clap::{Parser, Subcommand};
use jarchive::{
    concat::concatenate, info_time, process::enrich_all, process::RunMode, scrape::scrape_range,
    Config, Error, Result, DATA_DIR, MAX_WORKERS, SCRAPE_WORKERS,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jarchive")]
#[command(about = "Scrape J! Archive clues and link their answers to Wikipedia", long_about = None)]
struct Cli {
    /// Directory holding raw/, enriched/ and full/
    #[arg(long, global = true, default_value = DATA_DIR)]
    data_dir: PathBuf,

    /// Hide progress bars
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a range of games into raw batches
    Scrape {
        #[arg(long, default_value_t = 1)]
        start: usize,
        #[arg(long, default_value_t = 100)]
        end: usize,
        /// Parallel page requests
        #[arg(short, long, default_value_t = SCRAPE_WORKERS)]
        workers: usize,
    },
    /// Link every answer to a Wikipedia slug
    Enrich {
        /// Go over enriched batches again and retry clues without a slug
        #[arg(long)]
        retry_unresolved: bool,
        /// Parallel slug lookups per batch
        #[arg(short, long, default_value_t = MAX_WORKERS)]
        workers: usize,
    },
    /// Merge enriched batches into data/full/jeopardy_questions.json
    Concat,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let start_time = Local::now();
    let cli = Cli::parse();
    let mut config = Config {
        progress: !cli.quiet,
        ..Config::with_data_dir(&cli.data_dir)
    };

    match cli.command {
        Commands::Scrape {
            start,
            end,
            workers,
        } => {
            config.scrape_workers = workers;
            let summary = scrape_range(&config, reqwest::Client::new(), start..=end).await?;
            if !summary.failed_games.is_empty() {
                error!("Failed games: {:?}", summary.failed_games);
            }
        }
        Commands::Enrich {
            retry_unresolved,
            workers,
        } => {
            config.workers = workers;
            if retry_unresolved {
                config.mode = RunMode::RetryUnresolved;
            }
            match enrich_all(config).await {
                Ok(_) => {}
                // Nothing to do is reported, not a crash.
                Err(e @ (Error::MissingSourceDir(_) | Error::NoBatches(_))) => error!("{e}"),
                Err(e) => return Err(e),
            }
        }
        Commands::Concat => {
            concatenate(&config.enriched_dir(), &config.full_dir()).await?;
        }
    }

    info_time!(start_time, "Full program time:");
    Ok(())
}
