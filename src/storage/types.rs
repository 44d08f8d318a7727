use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Catalog store errors.
///
/// `DuplicateLink` and `NotFound` are expected steady-state outcomes; callers
/// match on them instead of treating them as failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested row does not exist (or the catalog is empty)
    #[error("Record not found")]
    NotFound,

    /// A post with this link is already stored
    #[error("A post with link '{0}' already exists")]
    DuplicateLink(String),

    /// A unique constraint other than the post link was violated
    #[error("Already exists: {0}")]
    Conflict(String),

    /// Another process holds the database lock
    #[error("Another instance of gator is using the database. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StoreError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return StoreError::InstanceLocked;
        }

        StoreError::Other(err)
    }

    /// Map a unique-constraint violation to `Conflict`, everything else to `Other`.
    pub(crate) fn conflict_or(err: sqlx::Error, what: impl Into<String>) -> Self {
        if is_unique_violation(&err) {
            StoreError::Conflict(what.into())
        } else {
            StoreError::Other(err)
        }
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

// ============================================================================
// Data Structures
// ============================================================================
//
// All timestamps are Unix milliseconds (UTC).

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A subscribed feed.
///
/// `last_fetched_at` is `None` until the ingestion pipeline first picks the
/// feed up, which puts it ahead of every feed that has been fetched.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Feed {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub user_id: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_fetched_at: Option<i64>,
}

/// Feed joined with the name of the user who added it
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedWithOwner {
    pub name: String,
    pub url: String,
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FeedFollow {
    pub id: i64,
    pub user_id: i64,
    pub feed_id: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A stored feed entry. Immutable once created; `url` is unique across all feeds.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub description: String,
    pub published_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Insert payload for [`Post`]
#[derive(Debug, Clone, Copy)]
pub struct NewPost<'a> {
    pub feed_id: i64,
    pub title: &'a str,
    pub url: &'a str,
    pub description: &'a str,
    pub published_at: Option<i64>,
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
