use chrono::{Duration, Utc};
use tracing::{debug, info, instrument};

use crate::catalog;
use crate::classifier;
use crate::config::Serial;
use crate::datasource::{repository, DBPool};
use crate::errors::Result;
use crate::models::NewEpisode;

/// Find the episodes a serial published since its last scan, oldest first.
///
/// The watermark only moves after the query succeeded. It is set to the moment the scan
/// started, so anything published while the query ran is seen again next time.
#[instrument(skip_all, fields(serial = %serial.name))]
pub async fn scan_serial(
    pool: &DBPool,
    client: &youtube::Client,
    serial: &Serial,
    default_lookback: Duration,
) -> Result<Vec<NewEpisode>> {
    let started = Utc::now();
    let watermark = repository::watermark::get(pool, &serial.name).await?;
    let published_after = catalog::published_after(watermark, default_lookback, started);
    debug!(%published_after, "scanning channel");

    let items = catalog::search(client, &serial.channel_id, published_after).await?;
    let found = items.len();
    let episodes: Vec<NewEpisode> = items
        .into_iter()
        .filter(|item| classifier::is_episode(&item.title, &serial.name_pattern))
        .map(|item| NewEpisode::new(serial, item))
        .collect();

    let last_fetched = watermark.map_or(started, |previous| previous.max(started));
    repository::watermark::set(pool, &serial.name, last_fetched).await?;
    info!(found, episodes = episodes.len(), "scanned channel");
    Ok(episodes)
}

/// Episodes of `serial` whose download was interrupted, in index order.
pub async fn pending_episodes(pool: &DBPool, serial: &Serial) -> Result<Vec<NewEpisode>> {
    let pending: Vec<NewEpisode> = repository::episode::find_by_name(pool, &serial.name)
        .await?
        .into_iter()
        .filter(|record| !record.completed)
        .map(NewEpisode::from)
        .collect();
    if !pending.is_empty() {
        debug!(serial = %serial.name, pending = pending.len(), "found interrupted downloads");
    }
    Ok(pending)
}

/// Interrupted downloads first, then newly scanned episodes not already among them.
#[must_use]
pub fn merge_pending(pending: Vec<NewEpisode>, scanned: Vec<NewEpisode>) -> Vec<NewEpisode> {
    let mut episodes = pending;
    for episode in scanned {
        if !episodes.iter().any(|e| e.video_id == episode.video_id) {
            episodes.push(episode);
        }
    }
    episodes
}
