use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::process::RunMode;
use crate::{
    ARCHIVE_URL, DATA_DIR, MAX_WORKERS, PAGE_TIMEOUT_SECS, SCRAPE_WORKERS, SEARCH_TIMEOUT_SECS,
    USER_AGENT, WIKIPEDIA_API_URL,
};

/// Knobs for a run. The binary fills this in from the command line,
/// everything else starts from [`Config::default`].
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Holds `raw/`, `enriched/` and `full/`.
    pub data_dir: PathBuf,
    pub mode: RunMode,
    /// Concurrent slug lookups per batch.
    pub workers: usize,
    /// Concurrent game page requests while scraping.
    pub scrape_workers: usize,
    /// `showgame.php` of the archive, queried with `game_id`.
    pub archive_url: String,
    pub page_timeout: Duration,
    pub api_url: String,
    pub user_agent: String,
    pub search_timeout: Duration,
    pub progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DATA_DIR),
            mode: RunMode::Normal,
            workers: MAX_WORKERS,
            scrape_workers: SCRAPE_WORKERS,
            archive_url: ARCHIVE_URL.to_string(),
            page_timeout: Duration::from_secs(PAGE_TIMEOUT_SECS),
            api_url: WIKIPEDIA_API_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            search_timeout: Duration::from_secs(SEARCH_TIMEOUT_SECS),
            progress: false,
        }
    }
}

impl Config {
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn enriched_dir(&self) -> PathBuf {
        self.data_dir.join("enriched")
    }

    pub fn full_dir(&self) -> PathBuf {
        self.data_dir.join("full")
    }

    /// Where batches are read from for the configured mode.
    pub fn source_dir(&self) -> PathBuf {
        match self.mode {
            RunMode::Normal => self.raw_dir(),
            RunMode::RetryUnresolved => self.enriched_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_dir_follows_mode() {
        let mut config = Config::with_data_dir("/tmp/jeopardy");
        assert_eq!(config.source_dir(), PathBuf::from("/tmp/jeopardy/raw"));

        config.mode = RunMode::RetryUnresolved;
        assert_eq!(config.source_dir(), PathBuf::from("/tmp/jeopardy/enriched"));
        assert_eq!(config.full_dir(), PathBuf::from("/tmp/jeopardy/full"));
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.workers, 15);
        assert_eq!(config.search_timeout, Duration::from_secs(10));
        assert_eq!(config.mode, RunMode::Normal);
    }
}
