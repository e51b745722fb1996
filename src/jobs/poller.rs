use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{error, info, instrument, trace, warn};

use crate::config::Serial;
use crate::errors::{Error, Result, SerialFailure};
use crate::jobs::download::{self, DownloadContext};
use crate::jobs::scan;
use crate::models::DownloadOutcome;
use crate::state::AppState;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerialReport {
    pub serial: String,
    pub episodes: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SerialReport {
    fn new(serial: &Serial, episodes: usize) -> Self {
        Self {
            serial: serial.name.clone(),
            episodes,
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::Skipped => self.skipped += 1,
            DownloadOutcome::Completed { .. } => self.completed += 1,
            DownloadOutcome::Failed(_) => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub serials: Vec<SerialReport>,
}

impl RunSummary {
    #[must_use]
    pub fn completed(&self) -> usize {
        self.serials.iter().map(|s| s.completed).sum()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.serials.iter().map(|s| s.failed).sum()
    }
}

pub fn start(state: AppState, period: Duration) -> JoinHandle<Result<()>> {
    start_with_interval(state, interval(period))
}

/// Poll on every tick until cancelled, a fatal error stops the loop.
pub fn start_with_interval(state: AppState, mut interval: Interval) -> JoinHandle<Result<()>> {
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::task::spawn(async move {
        loop {
            tokio::select! {
                () = state.cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            match run(&state).await {
                Ok(summary) => trace!(completed = summary.completed(), "poll finished"),
                Err(err) if err.is_fatal() => {
                    error!("stopping poller: {err}");
                    return Err(err);
                }
                Err(err) => warn!("poll finished with failures: {err}"),
            }
        }
        info!("poller stopped");
        Ok(())
    })
}

/// Scan and download every serial once.
///
/// Serials run concurrently and their failures are collected, the store is persisted
/// once at the end. Fatal errors win over persist errors, which win over serial failures.
#[instrument(skip_all, fields(serials = state.serials.len()))]
pub async fn run(state: &AppState) -> Result<RunSummary> {
    let results = join_all(state.serials.iter().map(|serial| run_serial(state, serial))).await;

    let mut summary = RunSummary::default();
    let mut failures = Vec::new();
    let mut fatal = None;
    for (serial, result) in state.serials.iter().zip(results) {
        match result {
            Ok(report) => {
                info!(
                    serial = %report.serial,
                    completed = report.completed,
                    skipped = report.skipped,
                    failed = report.failed,
                    "serial finished"
                );
                summary.serials.push(report);
            }
            Err(error) if error.is_fatal() => {
                error!(serial = %serial.name, "serial aborted: {error}");
                fatal.get_or_insert(error);
            }
            Err(error) => {
                error!(serial = %serial.name, "serial failed: {error}");
                failures.push(SerialFailure {
                    serial: serial.name.clone(),
                    error,
                });
            }
        }
    }

    let persisted = state.store.persist().await;
    if let Some(error) = fatal {
        return Err(error);
    }
    persisted?;
    if !failures.is_empty() {
        return Err(Error::Serials(failures));
    }
    Ok(summary)
}

#[instrument(skip_all, fields(serial = %serial.name))]
async fn run_serial(state: &AppState, serial: &Serial) -> Result<SerialReport> {
    let scanned = scan::scan_serial(
        state.store.pool(),
        &state.client,
        serial,
        state.default_lookback,
    )
    .await?;
    let pending = scan::pending_episodes(state.store.pool(), serial).await?;
    let episodes = scan::merge_pending(pending, scanned);

    let ctx = DownloadContext {
        pool: state.store.pool(),
        fetcher: state.fetcher.as_ref(),
        settings: &state.download,
        cancel: &state.cancel,
    };
    let mut report = SerialReport::new(serial, episodes.len());
    for episode in &episodes {
        if state.cancel.is_cancelled() {
            warn!("cancelled, leaving remaining episodes for the next run");
            break;
        }
        let outcome = download::process_episode(&ctx, episode).await?;
        report.record(&outcome);
    }
    Ok(report)
}
