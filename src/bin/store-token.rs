//! Save an OAuth token, read as JSON from stdin, for the poller to use.

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tracing_subscriber::prelude::*;

use serial_downloader::config::Config;
use serial_downloader::datasource::repository::settings::{self, OAuthToken};
use serial_downloader::datasource::Store;

#[tokio::main]
async fn main() -> Result<()> {
    // initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;
    let token: OAuthToken =
        serde_json::from_str(&input).context("stdin does not contain a valid token")?;

    let store = Store::open(&config.database).await?;
    settings::store_token(store.pool(), &token).await?;
    store.persist().await?;
    store.close().await;
    Ok(())
}
