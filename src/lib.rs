//! J! ARCHIVE SCRAPER + WIKIPEDIA LINKER
//!
//! Scrapes clues into raw batches, links every answer to a Wikipedia slug
//! and concatenates the enriched batches into one corpus.
//!
//! ```text
//! data/raw/*.json --enrich--> data/enriched/*.json --concat--> data/full/jeopardy_questions.json
//! ```

pub mod concat;
pub mod config;
pub mod enrich;
mod error;
mod macros;
pub mod model;
mod parse;
pub mod process;
mod request;
pub mod resolve;
pub mod scrape;

pub use config::Config;
pub use error::{Error, Result};
pub use parse::{Game, ScrapedCategory, ScrapedClue};

/// Concurrent slug lookups per batch. Be mindful not to overload the API.
pub const MAX_WORKERS: usize = 15;
/// Concurrent game page requests. Be respectful of the server.
pub const SCRAPE_WORKERS: usize = 10;
pub const DATA_DIR: &str = "data";

pub const WIKIPEDIA_API_URL: &str = "https://en.wikipedia.org/w/api.php";
pub const USER_AGENT: &str = "JeopardyScraper/1.0 (https://example.com; myemail@example.com)";
pub const SEARCH_TIMEOUT_SECS: u64 = 10;

pub const ARCHIVE_URL: &str = "https://j-archive.com/showgame.php";
pub const PAGE_TIMEOUT_SECS: u64 = 15;
