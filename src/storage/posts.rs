use super::schema::Database;
use super::types::{is_unique_violation, now_millis, NewPost, Post, StoreError};

/// Maximum number of posts returned by a single browse query
const MAX_BROWSE_LIMIT: i64 = 500;

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post.
    ///
    /// A link that is already stored (for any feed) yields
    /// `StoreError::DuplicateLink`; the existing row is left untouched.
    pub async fn insert_post(&self, post: &NewPost<'_>) -> Result<Post, StoreError> {
        let now = now_millis();
        sqlx::query_as::<_, Post>(
            "INSERT INTO posts
                 (feed_id, title, url, description, published_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING id, feed_id, title, url, description, published_at, created_at, updated_at",
        )
        .bind(post.feed_id)
        .bind(post.title)
        .bind(post.url)
        .bind(post.description)
        .bind(post.published_at)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateLink(post.url.to_string())
            } else {
                StoreError::Other(e)
            }
        })
    }

    /// Most recent posts from feeds the user follows.
    ///
    /// Newest `published_at` first; posts without a published time sort last.
    /// `limit` is clamped to `1..=MAX_BROWSE_LIMIT`.
    pub async fn get_posts_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<Post>, StoreError> {
        let limit = limit.clamp(1, MAX_BROWSE_LIMIT);
        let posts = sqlx::query_as::<_, Post>(
            r#"
                SELECT p.id, p.feed_id, p.title, p.url, p.description, p.published_at,
                       p.created_at, p.updated_at
                FROM posts p
                JOIN feed_follows ff ON ff.feed_id = p.feed_id
                WHERE ff.user_id = ?
                ORDER BY p.published_at DESC NULLS LAST, p.created_at DESC, p.id DESC
                LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    /// Posts of one feed, in insertion order
    pub async fn get_posts_for_feed(&self, feed_id: i64) -> Result<Vec<Post>, StoreError> {
        let posts = sqlx::query_as::<_, Post>(
            "SELECT id, feed_id, title, url, description, published_at, created_at, updated_at
             FROM posts WHERE feed_id = ? ORDER BY id",
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }
}
