use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Local;
use reqwest::Client;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::enrich::{EnrichReport, Enricher};
use crate::model::{write_atomic, Batch, Clue};
use crate::resolve::{Resolve, WikiResolver};
use crate::{info_time, Error, Result};

/// Which batches get looked at, and which clues inside them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    /// Enrich every clue of every raw batch that has no enriched counterpart yet.
    #[default]
    Normal,
    /// Go over the enriched batches again and retry only clues without a slug.
    RetryUnresolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// An enriched version already exists.
    Skipped,
    /// Nothing in the source, an empty output was written.
    Empty,
    Enriched(EnrichReport),
    /// Nothing changed so nothing was written. `pending` clues are still unresolved.
    Unchanged { pending: usize },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub name: String,
    pub outcome: BatchOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: Vec<BatchResult>,
}

impl RunSummary {
    pub fn written(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| matches!(b.outcome, BatchOutcome::Empty | BatchOutcome::Enriched(_)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, BatchOutcome::Skipped | BatchOutcome::Unchanged { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, BatchOutcome::Failed(_)))
    }

    pub fn resolved(&self) -> usize {
        self.reports().map(|r| r.resolved).sum()
    }

    pub fn unresolved(&self) -> usize {
        self.reports().map(|r| r.unresolved + r.failures.len()).sum()
    }

    fn count(&self, pred: impl Fn(&BatchOutcome) -> bool) -> usize {
        self.batches.iter().filter(|b| pred(&b.outcome)).count()
    }

    fn reports(&self) -> impl Iterator<Item = &EnrichReport> {
        self.batches.iter().filter_map(|b| match &b.outcome {
            BatchOutcome::Enriched(report) => Some(report),
            _ => None,
        })
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} batches: {} written, {} skipped, {} failed; {} slugs resolved, {} unresolved",
            self.batches.len(),
            self.written(),
            self.skipped(),
            self.failed(),
            self.resolved(),
            self.unresolved()
        )
    }
}

/// Walks the batch files and runs each of them through the [`Enricher`], one batch at a time.
pub struct Orchestrator<R> {
    config: Config,
    enricher: Enricher<R>,
}

impl Orchestrator<WikiResolver> {
    pub fn from_config(config: Config, client: Client) -> Self {
        let resolver = WikiResolver::new(client)
            .with_api_url(config.api_url.clone())
            .with_user_agent(config.user_agent.clone())
            .with_timeout(config.search_timeout);
        let enricher = Enricher::new(resolver)
            .with_workers(config.workers)
            .with_progress(config.progress);
        Self::new(config, enricher)
    }
}

impl<R: Resolve> Orchestrator<R> {
    pub fn new(config: Config, enricher: Enricher<R>) -> Self {
        Self { config, enricher }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Processes every batch in the source directory of the configured mode.
    ///
    /// Only a missing or empty source directory fails the run; a batch that can't
    /// be read or written is reported as [`BatchOutcome::Failed`] and the rest carry on.
    pub async fn run(&self) -> Result<RunSummary> {
        let start_time = Local::now();
        let source_dir = self.config.source_dir();
        let batches = discover(&source_dir).await?;
        info!(
            mode = ?self.config.mode,
            "Found {} JSON file(s) to potentially process in {}",
            batches.len(),
            source_dir.display()
        );

        if self.config.mode == RunMode::Normal {
            tokio::fs::create_dir_all(self.config.enriched_dir()).await?;
        }

        let mut summary = RunSummary::default();
        for source in batches {
            let name = file_name(&source);
            let batch_start = Local::now();
            let outcome = match self.process_batch(&source).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Failed processing '{name}': {e}");
                    BatchOutcome::Failed(e.to_string())
                }
            };
            log_outcome(&name, &outcome);
            info_time!(batch_start, "Finished '{}'", name);
            summary.batches.push(BatchResult { name, outcome });
        }

        info_time!(start_time, "All files processed. {}", summary);
        Ok(summary)
    }

    /// Takes a single batch through load, scope, enrich and persist.
    pub async fn process_batch(&self, source: &Path) -> Result<BatchOutcome> {
        let name = file_name(source);
        match self.config.mode {
            RunMode::Normal => {
                let output = self.config.enriched_dir().join(&name);
                if tokio::fs::try_exists(&output).await? {
                    return Ok(BatchOutcome::Skipped);
                }

                let mut batch = Batch::load(source).await?;
                if batch.is_empty() {
                    warn!("Input file '{name}' is empty. Creating an empty output file.");
                    write_atomic(&output, b"[]").await?;
                    return Ok(BatchOutcome::Empty);
                }

                let mut clues = batch.clues_mut();
                let report = self.enricher.enrich(&mut clues, &name).await;
                write_atomic(&output, &batch.to_pretty_json()?).await?;
                Ok(BatchOutcome::Enriched(report))
            }
            RunMode::RetryUnresolved => {
                let mut batch = Batch::load(source).await?;
                let mut pending: Vec<&mut Clue> = batch
                    .clues_mut()
                    .into_iter()
                    .filter(|clue| !clue.is_resolved())
                    .collect();
                if pending.is_empty() {
                    return Ok(BatchOutcome::Unchanged { pending: 0 });
                }

                let report = self.enricher.enrich(&mut pending, &name).await;
                if !report.changed() {
                    return Ok(BatchOutcome::Unchanged {
                        pending: pending.len(),
                    });
                }
                write_atomic(source, &batch.to_pretty_json()?).await?;
                Ok(BatchOutcome::Enriched(report))
            }
        }
    }
}

/// Convenience entry point: builds a [`WikiResolver`] backed orchestrator and runs it.
pub async fn enrich_all(config: Config) -> Result<RunSummary> {
    Orchestrator::from_config(config, Client::new()).run().await
}

/// Lists the `*.json` files in `dir`, sorted by name.
pub(crate) async fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::MissingSourceDir(dir.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    let mut batches = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") && entry.file_type().await?.is_file() {
            batches.push(path);
        }
    }
    if batches.is_empty() {
        return Err(Error::NoBatches(dir.to_path_buf()));
    }

    batches.sort();
    Ok(batches)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn log_outcome(name: &str, outcome: &BatchOutcome) {
    match outcome {
        BatchOutcome::Skipped => info!("Skipping '{name}': Enriched version already exists."),
        BatchOutcome::Empty => info!("'{name}' was empty."),
        BatchOutcome::Enriched(report) => info!(
            attempted = report.attempted,
            resolved = report.resolved,
            unresolved = report.unresolved,
            failed = report.failures.len(),
            "Enriched '{name}'."
        ),
        BatchOutcome::Unchanged { pending } => {
            info!(pending, "'{name}' unchanged, nothing new resolved.")
        }
        BatchOutcome::Failed(reason) => warn!(%reason, "'{name}' failed."),
    }
}
