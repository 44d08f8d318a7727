use async_trait::async_trait;

use super::schema::Database;
use super::types::{Feed, NewPost, Post, StoreError};

/// The persistence boundary of the ingestion core.
///
/// Implementations must make `mark_feed_fetched` atomic and enforce link
/// uniqueness in `create_post`, reporting conflicts as
/// [`StoreError::DuplicateLink`].
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Feed with the oldest `last_fetched_at` (never-fetched first).
    /// `StoreError::NotFound` when the catalog is empty.
    async fn least_recently_fetched_feed(&self) -> Result<Feed, StoreError>;

    async fn mark_feed_fetched(&self, feed_id: i64) -> Result<(), StoreError>;

    async fn create_post(&self, post: &NewPost<'_>) -> Result<Post, StoreError>;
}

#[async_trait]
impl CatalogStore for Database {
    async fn least_recently_fetched_feed(&self) -> Result<Feed, StoreError> {
        self.get_next_feed_to_fetch().await
    }

    async fn mark_feed_fetched(&self, feed_id: i64) -> Result<(), StoreError> {
        Database::mark_feed_fetched(self, feed_id).await
    }

    async fn create_post(&self, post: &NewPost<'_>) -> Result<Post, StoreError> {
        self.insert_post(post).await
    }
}
