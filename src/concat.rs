use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::Value;
use tracing::{info, warn};

use crate::model::{to_pretty_json, write_atomic};
use crate::{info_time, Error, Result};

const BATCH_PREFIX: &str = "jeopardy_questions_";
pub const FULL_FILE_NAME: &str = "jeopardy_questions.json";

/// Appends the records of every `jeopardy_questions_*.json` in `enriched_dir`, in name order,
/// and writes them to `full_dir/jeopardy_questions.json`.
///
/// Returns how many records were written. No matching files is not an error, nothing gets written.
pub async fn concatenate(enriched_dir: &Path, full_dir: &Path) -> Result<usize> {
    let start_time = Local::now();
    let sources = matching_batches(enriched_dir).await?;
    if sources.is_empty() {
        warn!(
            "No {BATCH_PREFIX}*.json files found in {}. Nothing to concatenate.",
            enriched_dir.display()
        );
        return Ok(0);
    }
    info!("Found {} file(s) to combine.", sources.len());

    let mut combined = Vec::new();
    for source in &sources {
        info!("Reading {}...", source.display());
        let bytes = tokio::fs::read(source).await?;
        match serde_json::from_slice(&bytes)? {
            Value::Array(records) => combined.extend(records),
            _ => {
                return Err(Error::BatchShape(format!(
                    "{} is not a JSON array",
                    source.display()
                )))
            }
        }
    }

    tokio::fs::create_dir_all(full_dir).await?;
    let output = full_dir.join(FULL_FILE_NAME);
    write_atomic(&output, &to_pretty_json(&combined)?).await?;
    info_time!(
        start_time,
        "Wrote {} total entries to {}",
        combined.len(),
        output.display()
    );

    Ok(combined.len())
}

async fn matching_batches(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut batches = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(BATCH_PREFIX) && name.ends_with(".json") {
            batches.push(entry.path());
        }
    }
    // Sorting ensures a consistent order
    batches.sort();
    Ok(batches)
}
