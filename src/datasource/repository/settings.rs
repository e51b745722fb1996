use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite};
use tracing::info;

use crate::errors::{Error, Result};

const TOKEN_TYPE: &str = "token";

/// OAuth credentials as issued by the Google token endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Milliseconds since the unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
}

impl OAuthToken {
    /// Tokens without an expiry date never expire.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date
            .is_some_and(|expiry| expiry <= now.timestamp_millis())
    }
}

impl std::fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthToken")
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .field("expiry_date", &self.expiry_date)
            .finish_non_exhaustive()
    }
}

async fn get<'e, E>(executor: E, setting: &str) -> Result<Option<serde_json::Value>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let value: Option<String> = sqlx::query_scalar(include_str!(
        "../../../queries/settings/query_setting_by_type.sql"
    ))
    .bind(setting)
    .fetch_optional(executor)
    .await?;
    value
        .map(|v| serde_json::from_str(&v).map_err(|e| Error::Store(sqlx::Error::Decode(Box::new(e)))))
        .transpose()
}

async fn put<'e, E>(executor: E, setting: &str, value: &serde_json::Value) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(include_str!("../../../queries/settings/upsert_setting.sql"))
        .bind(setting)
        .bind(value.to_string())
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn get_token<'e, E>(executor: E) -> Result<Option<OAuthToken>>
where
    E: Executor<'e, Database = Sqlite>,
{
    get(executor, TOKEN_TYPE)
        .await?
        .map(|v| serde_json::from_value(v).map_err(|e| Error::Store(sqlx::Error::Decode(Box::new(e)))))
        .transpose()
}

pub async fn store_token<'e, E>(executor: E, token: &OAuthToken) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let value = serde_json::to_value(token)
        .map_err(|e| Error::Store(sqlx::Error::Encode(Box::new(e))))?;
    put(executor, TOKEN_TYPE, &value).await?;
    info!(?token, "stored token");
    Ok(())
}
