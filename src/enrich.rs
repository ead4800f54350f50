use std::collections::HashMap;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::warn;

use crate::model::Clue;
use crate::resolve::Resolve;
use crate::{Result, MAX_WORKERS};

/// A clue whose task blew up instead of returning a lookup result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Position in the slice handed to [`Enricher::enrich`].
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichReport {
    pub attempted: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub failures: Vec<ItemFailure>,
}

impl EnrichReport {
    pub fn changed(&self) -> bool {
        self.resolved > 0
    }
}

/// Fans slug lookups out over a bounded number of workers.
pub struct Enricher<R> {
    resolver: Arc<R>,
    workers: usize,
    progress: bool,
}

impl<R: Resolve> Enricher<R> {
    pub fn new(resolver: R) -> Self {
        Self::from_arc(Arc::new(resolver))
    }

    pub fn from_arc(resolver: Arc<R>) -> Self {
        Self {
            resolver,
            workers: MAX_WORKERS,
            progress: false,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn resolver(&self) -> &Arc<R> {
        &self.resolver
    }

    /// Looks up a slug for every clue it's given and writes the result into `wiki_slug`.
    ///
    /// Every clue is attempted, resolved or not; filtering is up to the caller.
    /// Returns only after all tasks have settled. A task that errors or panics
    /// leaves its clue as it was and shows up in [`EnrichReport::failures`].
    /// Only string answers are looked up; anything else resolves to `None` without a request.
    pub async fn enrich(&self, clues: &mut [&mut Clue], label: &str) -> EnrichReport {
        let mut report = EnrichReport {
            attempted: clues.len(),
            ..Default::default()
        };
        if clues.is_empty() {
            return report;
        }

        let progress = self.progress_bar(clues.len(), label);
        let pool = Arc::new(Semaphore::new(self.workers));
        let mut task_set = JoinSet::new();
        // A panicking task only tells us its id, so remember which clue each id belongs to.
        let mut slots = HashMap::with_capacity(clues.len());

        for (index, clue) in clues.iter().enumerate() {
            let handle = task_set.spawn({
                let pool = pool.clone();
                let resolver = self.resolver.clone();
                let answer = clue.answer().map(str::to_owned);

                async move { resolve_clue(pool, resolver, answer).await }
            });
            slots.insert(handle.id(), index);
        }

        while let Some(task) = task_set.join_next_with_id().await {
            let (index, outcome) = match task {
                Ok((id, res)) => (slots[&id], res.map_err(|e| e.to_string())),
                Err(e) => (slots[&e.id()], Err(e.to_string())),
            };

            match outcome {
                Ok(Some(slug)) => {
                    clues[index].set_wiki_slug(Some(slug));
                    report.resolved += 1;
                }
                Ok(None) => {
                    clues[index].set_wiki_slug(None);
                    report.unresolved += 1;
                }
                Err(reason) => {
                    progress.suspend(|| warn!(index, %reason, "an error occurred in an enrichment task"));
                    report.failures.push(ItemFailure { index, reason });
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        report.failures.sort_by_key(|f| f.index);
        report
    }

    fn progress_bar(&self, len: usize, label: &str) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template("{msg} {wide_bar} {pos}/{len} slug [{elapsed_precise}<{eta}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        ProgressBar::new(len as u64)
            .with_style(style)
            .with_message(format!("Enriching {label}"))
    }
}

/// Waits for a free worker, then looks up a single answer.
async fn resolve_clue<R: Resolve>(
    pool: Arc<Semaphore>,
    resolver: Arc<R>,
    answer: Option<String>,
) -> Result<Option<String>> {
    let _permit = pool.acquire_owned().await?;
    Ok(resolver.resolve(answer.as_deref()).await)
}
