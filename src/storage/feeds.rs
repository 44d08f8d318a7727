use super::schema::Database;
use super::types::{now_millis, Feed, FeedWithOwner, StoreError};

const FEED_COLUMNS: &str = "id, name, url, user_id, created_at, updated_at, last_fetched_at";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Register a feed owned by `user_id`. URLs are unique across the catalog.
    pub async fn create_feed(
        &self,
        user_id: i64,
        name: &str,
        url: &str,
    ) -> Result<Feed, StoreError> {
        let now = now_millis();
        sqlx::query_as::<_, Feed>(&format!(
            "INSERT INTO feeds (name, url, user_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)
             RETURNING {FEED_COLUMNS}"
        ))
        .bind(name)
        .bind(url)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::conflict_or(e, format!("feed '{}'", url)))
    }

    pub async fn get_feed_by_url(&self, url: &str) -> Result<Feed, StoreError> {
        sqlx::query_as::<_, Feed>(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE url = ?"))
            .bind(url)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    pub async fn get_feed(&self, feed_id: i64) -> Result<Feed, StoreError> {
        sqlx::query_as::<_, Feed>(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"))
            .bind(feed_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    /// All feeds with the name of the user who added them, ordered by feed name
    pub async fn get_feeds_with_owner(&self) -> Result<Vec<FeedWithOwner>, StoreError> {
        let feeds = sqlx::query_as::<_, FeedWithOwner>(
            r#"
                SELECT f.name, f.url, u.name AS owner
                FROM feeds f
                JOIN users u ON u.id = f.user_id
                ORDER BY f.name, f.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// The feed that has waited longest since its last fetch attempt.
    ///
    /// Never-fetched feeds come first, then ascending `last_fetched_at`,
    /// ties broken by id. Returns `StoreError::NotFound` on an empty catalog.
    pub async fn get_next_feed_to_fetch(&self) -> Result<Feed, StoreError> {
        sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds
             ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
             LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    /// Stamp a fetch attempt at the current time.
    pub async fn mark_feed_fetched(&self, feed_id: i64) -> Result<(), StoreError> {
        self.set_feed_fetched_at(feed_id, now_millis()).await
    }

    /// Stamp a fetch attempt at `fetched_at` (Unix ms). Single statement, so
    /// concurrent markers never interleave.
    pub async fn set_feed_fetched_at(
        &self,
        feed_id: i64,
        fetched_at: i64,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE feeds SET last_fetched_at = ?, updated_at = ? WHERE id = ?")
                .bind(fetched_at)
                .bind(fetched_at)
                .bind(feed_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
