use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::MissedTickBehavior;

use super::pipeline::{ingest_once, IngestError, IngestReport};
use super::selector::{next_feed, SelectError};
use crate::feed::Fetcher;
use crate::storage::{CatalogStore, Feed, StoreError};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Tick interval must be greater than zero")]
    ZeroInterval,
}

/// What happened during one scheduler tick.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The feed was fetched and its entries stored
    Ingested { feed: Feed, report: IngestReport },
    /// Nothing to poll yet
    CatalogEmpty,
    /// The store could not pick a feed
    SelectFailed(StoreError),
    /// The selected feed failed to mark, fetch or parse
    IngestFailed { feed: Feed, error: IngestError },
}

/// Select the stalest feed and ingest it, logging the result.
///
/// Never fails: every error is folded into the returned [`CycleOutcome`].
pub async fn run_cycle<S>(store: &S, fetcher: &Fetcher) -> CycleOutcome
where
    S: CatalogStore + ?Sized,
{
    let feed = match next_feed(store).await {
        Ok(feed) => feed,
        Err(SelectError::CatalogEmpty) => {
            tracing::info!("No feeds to fetch yet, waiting for next tick");
            return CycleOutcome::CatalogEmpty;
        }
        Err(SelectError::Store(e)) => {
            tracing::warn!(error = %e, "Failed to select next feed");
            return CycleOutcome::SelectFailed(e);
        }
    };

    tracing::info!(feed = %feed.name, url = %feed.url, "Scraping feed");

    match ingest_once(store, fetcher, &feed).await {
        Ok(report) => {
            tracing::info!(
                feed = %feed.name,
                url = %feed.url,
                created = report.created,
                skipped = report.skipped,
                failed = report.failed,
                "Feed ingested"
            );
            CycleOutcome::Ingested { feed, report }
        }
        Err(error) => {
            tracing::warn!(
                feed = %feed.name,
                url = %feed.url,
                error = %error,
                "Feed ingestion failed"
            );
            CycleOutcome::IngestFailed { feed, error }
        }
    }
}

/// Run one cycle per `interval` until `shutdown` resolves.
///
/// The first cycle starts immediately. A cycle that outlasts the interval
/// delays the next tick instead of overlapping it. `shutdown` is polled both
/// between ticks and while a cycle is in flight; an in-flight fetch is
/// dropped. Returns the number of cycles that ran to completion.
pub async fn run<S, F>(
    store: &S,
    fetcher: &Fetcher,
    interval: Duration,
    shutdown: F,
) -> Result<u64, RunError>
where
    S: CatalogStore + ?Sized,
    F: Future<Output = ()>,
{
    if interval.is_zero() {
        return Err(RunError::ZeroInterval);
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    tracing::info!(interval = ?interval, "Collecting feeds");

    let mut completed: u64 = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        tracing::debug!(tick = completed + 1, "Tick");

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested during cycle, abandoning it");
                break;
            }
            _ = run_cycle(store, fetcher) => completed += 1,
        }
    }

    tracing::info!(cycles = completed, "Feed collection stopped");
    Ok(completed)
}
