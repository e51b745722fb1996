use std::io;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::datasource::{repository, DBPool};
use crate::errors::{Error, Result};
use crate::media::{MediaFetchError, MediaFetcher, MediaStream};
use crate::models::{DownloadOutcome, EpisodeRecord, NewEpisode};

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub download_dir: PathBuf,
    /// Mark episodes completed without fetching any media.
    pub debug: bool,
}

/// Everything a single episode download needs, borrowed from the running poll.
pub struct DownloadContext<'a> {
    pub pool: &'a DBPool,
    pub fetcher: &'a dyn MediaFetcher,
    pub settings: &'a DownloadSettings,
    pub cancel: &'a CancellationToken,
}

/// `<download_dir>/<name>-<video_index>.mp4`
#[must_use]
pub fn episode_path(download_dir: &Path, name: &str, video_index: u32) -> PathBuf {
    download_dir.join(format!("{name}-{video_index}.mp4"))
}

enum Interrupted {
    Media(MediaFetchError),
    File(PathBuf, io::Error),
}

impl From<MediaFetchError> for Interrupted {
    fn from(value: MediaFetchError) -> Self {
        Interrupted::Media(value)
    }
}

/// Drive one episode through new, in progress and completed.
///
/// Completed episodes are skipped, in progress ones restart from scratch under their
/// existing index. A media failure leaves the record in progress for the next run.
/// A video already claimed by another serial is skipped, whichever serial inserted first
/// owns it.
#[instrument(skip_all, fields(serial = %episode.name, video_id = %episode.video_id))]
pub async fn process_episode(
    ctx: &DownloadContext<'_>,
    episode: &NewEpisode,
) -> Result<DownloadOutcome> {
    let record = match repository::episode::find_by_video_id(ctx.pool, &episode.video_id).await? {
        Some(existing) if existing.name != episode.name => {
            warn!(owner = %existing.name, "video belongs to another serial");
            return Ok(DownloadOutcome::Skipped);
        }
        Some(existing) if existing.completed => {
            debug!(video_index = existing.video_index, "already downloaded");
            return Ok(DownloadOutcome::Skipped);
        }
        Some(existing) => {
            let path = episode_path(
                &ctx.settings.download_dir,
                &existing.name,
                existing.video_index,
            );
            remove_partial(&path).await;
            info!(video_index = existing.video_index, "resuming download");
            existing
        }
        None => match repository::episode::insert_next(ctx.pool, episode).await {
            Ok(record) => {
                info!(video_index = record.video_index, title = %record.title, "new episode");
                record
            }
            Err(err) if err.is_unique_violation() => {
                warn!("video was claimed by another serial: {err}");
                return Ok(DownloadOutcome::Skipped);
            }
            Err(err) => return Err(err),
        },
    };

    if ctx.settings.debug {
        return complete(ctx, &record).await;
    }

    let path = episode_path(&ctx.settings.download_dir, &record.name, record.video_index);
    match download(ctx, &record, &path).await {
        Ok(written) => {
            debug!(written, path = %path.display(), "wrote episode");
            complete(ctx, &record).await
        }
        Err(Interrupted::Media(err)) => {
            error!(video_index = record.video_index, "download failed: {err}");
            Ok(DownloadOutcome::Failed(err))
        }
        Err(Interrupted::File(path, source)) => Err(Error::FileSystem { path, source }),
    }
}

/// Best effort removal of a partial file left behind by an earlier run.
async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial download"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            let err = Error::FileSystem {
                path: path.to_path_buf(),
                source,
            };
            warn!("{err}");
        }
    }
}

async fn download(
    ctx: &DownloadContext<'_>,
    record: &EpisodeRecord,
    path: &Path,
) -> Result<u64, Interrupted> {
    let MediaStream { info, mut body } = tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => return Err(MediaFetchError::Cancelled.into()),
        stream = ctx.fetcher.fetch(&record.video_id) => stream?,
    };
    if let Some(size) = info.and_then(|i| i.size) {
        #[allow(clippy::cast_precision_loss)]
        let megabytes = size as f64 / 1_000_000.0;
        info!("Downloading {megabytes:.1}MB");
    }

    let file_error = |source: io::Error| Interrupted::File(path.to_path_buf(), source);
    let mut file = File::create(path).await.map_err(file_error)?;
    let mut written = 0u64;
    loop {
        let chunk = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return Err(MediaFetchError::Cancelled.into()),
            chunk = body.next() => chunk,
        };
        let Some(chunk) = chunk else { break };
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(file_error)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(file_error)?;
    file.sync_all().await.map_err(file_error)?;
    Ok(written)
}

async fn complete(ctx: &DownloadContext<'_>, record: &EpisodeRecord) -> Result<DownloadOutcome> {
    if !repository::episode::mark_completed(ctx.pool, &record.video_id).await? {
        warn!("episode was completed concurrently");
    }
    info!(video_index = record.video_index, "download completed");
    Ok(DownloadOutcome::Completed {
        video_index: record.video_index,
    })
}
