use sqlx::{Executor, FromRow, Sqlite};

use crate::errors::{Error, Result};
use crate::models::{EpisodeRecord, NewEpisode};

#[derive(Debug, FromRow)]
struct EpisodeEntity {
    video_id: String,
    title: String,
    channel_id: String,
    name: String,
    video_index: i64,
    inprogress: bool,
    completed: bool,
}

impl TryFrom<EpisodeEntity> for EpisodeRecord {
    type Error = Error;

    fn try_from(value: EpisodeEntity) -> Result<Self> {
        Ok(Self {
            video_index: to_index(value.video_index)?,
            video_id: value.video_id,
            title: value.title,
            channel_id: value.channel_id,
            name: value.name,
            inprogress: value.inprogress,
            completed: value.completed,
        })
    }
}

fn to_index(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|e| Error::Store(sqlx::Error::Decode(Box::new(e))))
}

pub async fn find_by_video_id<'e, E>(executor: E, video_id: &str) -> Result<Option<EpisodeRecord>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, EpisodeEntity>(include_str!(
        "../../../queries/episode/query_episode_by_video_id.sql"
    ))
    .bind(video_id)
    .fetch_optional(executor)
    .await?
    .map(TryInto::try_into)
    .transpose()
}

pub async fn find_by_name<'e, E>(executor: E, name: &str) -> Result<Vec<EpisodeRecord>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, EpisodeEntity>(include_str!(
        "../../../queries/episode/query_episodes_by_name.sql"
    ))
    .bind(name)
    .fetch_all(executor)
    .await?
    .into_iter()
    .map(TryInto::try_into)
    .collect()
}

#[cfg(test)]
pub(crate) async fn count_by_name<'e, E>(executor: E, name: &str) -> Result<u32>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar(include_str!(
        "../../../queries/episode/count_episodes_by_name.sql"
    ))
    .bind(name)
    .fetch_one(executor)
    .await?;
    to_index(count)
}

/// Insert `episode` as in progress with the next index of its serial.
///
/// Counting and inserting happen in one statement, so the index sequence stays dense.
pub async fn insert_next<'e, E>(executor: E, episode: &NewEpisode) -> Result<EpisodeRecord>
where
    E: Executor<'e, Database = Sqlite>,
{
    let video_index: i64 =
        sqlx::query_scalar(include_str!("../../../queries/episode/insert_episode.sql"))
            .bind(&episode.video_id)
            .bind(&episode.title)
            .bind(&episode.channel_id)
            .bind(&episode.name)
            .fetch_one(executor)
            .await?;
    Ok(EpisodeRecord {
        video_id: episode.video_id.clone(),
        title: episode.title.clone(),
        channel_id: episode.channel_id.clone(),
        name: episode.name.clone(),
        video_index: to_index(video_index)?,
        inprogress: true,
        completed: false,
    })
}

/// Move an in progress episode to its terminal state.
///
/// Returns `false` when no record changed, i.e. it was already completed or does not exist.
pub async fn mark_completed<'e, E>(executor: E, video_id: &str) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(include_str!(
        "../../../queries/episode/update_episode_completed.sql"
    ))
    .bind(video_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}
