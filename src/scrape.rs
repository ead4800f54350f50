use std::ops::RangeInclusive;
use std::path::PathBuf;

use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tracing::warn;

use crate::config::Config;
use crate::model::{to_pretty_json, write_atomic};
use crate::parse::{parse_game, ScrapedCategory, ScrapedClue};
use crate::request::request_games;
use crate::{info_time, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub games: usize,
    pub failed_games: Vec<usize>,
    pub categories: usize,
    pub final_clues: usize,
    pub regular_path: PathBuf,
    pub final_path: PathBuf,
}

/// Scrapes every game in `games` and writes two raw batches into the raw directory:
/// `jeopardy_questions_<start>-<end>.json` (grouped by category, sorted by name)
/// and `final_jeopardy_questions_<start>-<end>.json` (flat).
///
/// Games that can't be fetched or parsed are logged and left out.
pub async fn scrape_range(
    config: &Config,
    client: Client,
    games: RangeInclusive<usize>,
) -> Result<ScrapeSummary> {
    let start_time = Local::now();
    let (start, end) = (*games.start(), *games.end());
    info_time!("Started scraping games {}-{}", start, end);

    let mut task_set = request_games(
        games.clone(),
        client,
        &config.archive_url,
        config.page_timeout,
        config.scrape_workers,
    );
    let progress = progress_bar(config.progress, games.count());

    let mut categories: Vec<ScrapedCategory> = Vec::new();
    let mut final_clues: Vec<ScrapedClue> = Vec::new();
    let mut failed_games = Vec::new();

    while let Some(task) = task_set.join_next().await {
        let (game_id, html) = task?;
        let game = match html {
            Ok(html) => parse_game(html).await,
            Err(e) => Err(e),
        };
        match game {
            Ok(game) => {
                categories.extend(game.categories);
                final_clues.extend(game.final_clue);
            }
            Err(e) => {
                progress.suspend(|| warn!(game_id, "Game {game_id} generated an error: {e}"));
                failed_games.push(game_id);
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    failed_games.sort_unstable();

    // Sort categories alphabetically for consistent output
    categories.sort_by(|a, b| a.category.cmp(&b.category));

    let raw_dir = config.raw_dir();
    tokio::fs::create_dir_all(&raw_dir).await?;
    let regular_path = raw_dir.join(format!("jeopardy_questions_{start}-{end}.json"));
    let final_path = raw_dir.join(format!("final_jeopardy_questions_{start}-{end}.json"));
    write_atomic(&regular_path, &to_pretty_json(&categories)?).await?;
    write_atomic(&final_path, &to_pretty_json(&final_clues)?).await?;

    info_time!(
        start_time,
        "Scraping complete! Regular round data saved to {}, Final Jeopardy! data saved to {}",
        regular_path.display(),
        final_path.display()
    );

    Ok(ScrapeSummary {
        games: end.saturating_sub(start) + 1,
        failed_games,
        categories: categories.len(),
        final_clues: final_clues.len(),
        regular_path,
        final_path,
    })
}

fn progress_bar(enabled: bool, len: usize) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::with_template("{wide_bar} {pos}/{len} game [{elapsed_precise}<{eta}]")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    ProgressBar::new(len as u64).with_style(style)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Batch;
    use crate::parse::tests::GAME_HTML;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn scrapes_range_into_raw_batches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/showgame.php"))
            .and(query_param("game_id", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(GAME_HTML))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/showgame.php"))
            .and(query_param("game_id", "2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            archive_url: format!("{}/showgame.php", server.uri()),
            ..Config::with_data_dir(dir.path())
        };

        let summary = scrape_range(&config, Client::new(), 1..=2).await.unwrap();
        assert_eq!(summary.games, 2);
        assert_eq!(summary.failed_games, [2]);
        assert_eq!(summary.categories, 2);
        assert_eq!(summary.final_clues, 1);
        assert!(summary.regular_path.ends_with("raw/jeopardy_questions_1-2.json"));

        // The enricher must be able to pick these up as they are.
        let regular = Batch::load(&summary.regular_path).await.unwrap();
        let Batch::Grouped(groups) = regular else {
            panic!("regular rounds should be grouped");
        };
        assert_eq!(groups[0].category(), Some("RIVERS"));
        assert_eq!(groups[1].category(), Some("WORLDCAPITALS"));

        let raw = tokio::fs::read_to_string(&summary.final_path).await.unwrap();
        assert!(raw.contains("\"ÉCRIVAINS\""));
        assert!(!raw.contains("wiki_slug"));
        assert!(matches!(Batch::from_slice(raw.as_bytes()).unwrap(), Batch::Flat(c) if c.len() == 1));
    }
}
