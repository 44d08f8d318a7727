use thiserror::Error;

use crate::storage::{CatalogStore, Feed, StoreError};

#[derive(Debug, Error)]
pub enum SelectError {
    /// No feeds registered yet. Expected on a fresh install.
    #[error("No feeds in the catalog")]
    CatalogEmpty,
    #[error("Failed to select next feed: {0}")]
    Store(#[source] StoreError),
}

/// Pick the least-recently-fetched feed: never-fetched feeds first, then the
/// oldest `last_fetched_at`.
pub async fn next_feed<S>(store: &S) -> Result<Feed, SelectError>
where
    S: CatalogStore + ?Sized,
{
    match store.least_recently_fetched_feed().await {
        Ok(feed) => Ok(feed),
        Err(StoreError::NotFound) => Err(SelectError::CatalogEmpty),
        Err(e) => Err(SelectError::Store(e)),
    }
}
