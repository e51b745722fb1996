use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, Sqlite};

use crate::errors::Result;
use crate::models::FetchWatermark;

#[derive(Debug, FromRow)]
struct WatermarkEntity {
    name: String,
    last_fetched: DateTime<Utc>,
}

impl From<WatermarkEntity> for FetchWatermark {
    fn from(value: WatermarkEntity) -> Self {
        Self {
            name: value.name,
            last_fetched: value.last_fetched,
        }
    }
}

pub async fn find<'e, E>(executor: E, name: &str) -> Result<Option<FetchWatermark>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let record = sqlx::query_as::<_, WatermarkEntity>(include_str!(
        "../../../queries/watermark/query_watermark_by_name.sql"
    ))
    .bind(name)
    .fetch_optional(executor)
    .await?;
    Ok(record.map(Into::into))
}

/// The last time the serial was scanned successfully, `None` before the first scan.
pub async fn get<'e, E>(executor: E, name: &str) -> Result<Option<DateTime<Utc>>>
where
    E: Executor<'e, Database = Sqlite>,
{
    Ok(find(executor, name).await?.map(|w| w.last_fetched))
}

pub async fn set<'e, E>(executor: E, name: &str, last_fetched: DateTime<Utc>) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(include_str!("../../../queries/watermark/upsert_watermark.sql"))
        .bind(name)
        .bind(last_fetched)
        .execute(executor)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::datasource::test_support::temp_store;

    #[tokio::test]
    async fn test_absent_before_first_scan() {
        let (store, _dir) = temp_store().await;
        assert_eq!(get(store.pool(), "X").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_inserts_then_updates_in_place() {
        let (store, _dir) = temp_store().await;
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let second = first + Duration::hours(6);

        set(store.pool(), "X", first).await.unwrap();
        assert_eq!(get(store.pool(), "X").await.unwrap(), Some(first));

        set(store.pool(), "X", second).await.unwrap();
        let watermark = find(store.pool(), "X").await.unwrap().unwrap();
        assert_eq!(watermark.name, "X");
        assert_eq!(watermark.last_fetched, second);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fetch_watermark")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_watermarks_are_kept_per_serial() {
        let (store, _dir) = temp_store().await;
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        set(store.pool(), "A", a).await.unwrap();
        set(store.pool(), "B", b).await.unwrap();
        assert_eq!(get(store.pool(), "A").await.unwrap(), Some(a));
        assert_eq!(get(store.pool(), "B").await.unwrap(), Some(b));
    }
}
