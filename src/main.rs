use anyhow::Result;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use serial_downloader::config::{self, Config};
use serial_downloader::errors::InternalError;
use serial_downloader::jobs::poller;
use serial_downloader::state::AppState;

#[tokio::main]
async fn main() -> Result<(), InternalError> {
    // initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let serials = config::load_serials(&config.serials_file)?;
    info!(serials = serials.len(), "loaded serials");
    tokio::fs::create_dir_all(&config.download_dir).await?;

    let state = AppState::new(&config, serials).await?;
    let cancel = state.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received interrupt, finishing up");
            cancel.cancel();
        }
    });

    let store = state.store.clone();
    let result = if config.run_once {
        run_once(&state).await
    } else {
        poller::start(state, config.poll_interval()).await?
    };
    store.close().await;
    Ok(result?)
}

/// A single poll, only store failures make the process fail.
async fn run_once(state: &AppState) -> serial_downloader::Result<()> {
    match poller::run(state).await {
        Ok(summary) => {
            info!(
                completed = summary.completed(),
                failed = summary.failed(),
                "poll finished"
            );
            Ok(())
        }
        Err(err) if err.is_fatal() => {
            error!("poll aborted: {err}");
            Err(err)
        }
        Err(err) => {
            warn!("poll finished with failures: {err}");
            Ok(())
        }
    }
}
