use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::debug;

use crate::Result;

/// Returns a `JoinSet` with a request for every game in `games`, so that they can be awaited.
/// At most `workers` requests are in flight at once. Each task yields its game id with the HTML.
pub(crate) fn request_games(
    games: RangeInclusive<usize>,
    client: Client,
    archive_url: &str,
    timeout: Duration,
    workers: usize,
) -> JoinSet<(usize, Result<String>)> {
    let pool = Arc::new(Semaphore::new(workers.max(1)));
    let mut task_set = JoinSet::new();

    for game_id in games {
        task_set.spawn({
            // Client uses Arc so we can clone cheaply
            let client = client.clone();
            let pool = pool.clone();
            let archive_url = archive_url.to_string();

            async move {
                let res = match pool.acquire_owned().await {
                    Ok(_permit) => request_game_html(&client, &archive_url, game_id, timeout).await,
                    Err(e) => Err(e.into()),
                };
                (game_id, res)
            }
        });
    }
    task_set
}

/// Requests a game page and returns a `Result<String>` containing the HTML.
async fn request_game_html(
    client: &Client,
    archive_url: &str,
    game_id: usize,
    timeout: Duration,
) -> Result<String> {
    debug!(game_id, "Requesting game");
    let res = client
        .get(archive_url)
        .query(&[("game_id", game_id)])
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;
    let html = res.text().await?;
    Ok(html)
}
