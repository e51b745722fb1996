use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Serial;
use crate::media::MediaFetchError;

/// A search hit that may be an episode of a tracked serial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    pub video_id: String,
    pub title: String,
    pub channel_id: String,
    pub published_at: DateTime<Utc>,
}

impl TryFrom<youtube::models::SearchResult> for CandidateItem {
    type Error = youtube::models::SearchResult;

    /// Only video results can be downloaded, anything else is handed back.
    fn try_from(value: youtube::models::SearchResult) -> Result<Self, Self::Error> {
        let Some(video_id) = value.id.video_id.clone() else {
            return Err(value);
        };
        Ok(Self {
            video_id,
            title: value.snippet.title,
            channel_id: value.snippet.channel_id,
            published_at: value.snippet.published_at,
        })
    }
}

/// A classified episode that has not been matched against the store yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewEpisode {
    pub video_id: String,
    pub title: String,
    pub channel_id: String,
    pub name: String,
}

impl NewEpisode {
    #[must_use]
    pub fn new(serial: &Serial, item: CandidateItem) -> Self {
        Self {
            video_id: item.video_id,
            title: item.title,
            channel_id: item.channel_id,
            name: serial.name.clone(),
        }
    }
}

impl From<EpisodeRecord> for NewEpisode {
    fn from(value: EpisodeRecord) -> Self {
        Self {
            video_id: value.video_id,
            title: value.title,
            channel_id: value.channel_id,
            name: value.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeRecord {
    pub video_id: String,
    pub title: String,
    pub channel_id: String,
    pub name: String,
    pub video_index: u32,
    pub inprogress: bool,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchWatermark {
    pub name: String,
    pub last_fetched: DateTime<Utc>,
}

#[derive(Debug)]
pub enum DownloadOutcome {
    /// The episode was downloaded before.
    Skipped,
    Completed { video_index: u32 },
    /// The record stays in progress and is resumed on the next run.
    Failed(MediaFetchError),
}

impl DownloadOutcome {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, DownloadOutcome::Failed(_))
    }
}
