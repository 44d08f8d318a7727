use chrono::DateTime;
use thiserror::Error;

use crate::feed::{parse_feed, FetchError, Fetcher, ParseError, ParsedFeed};
use crate::storage::{CatalogStore, Feed, NewPost, StoreError};

/// Errors that abort one feed's ingestion cycle. None of them stop the scheduler.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The fetch timestamp could not be recorded; nothing was fetched
    #[error("Failed to mark feed as fetched: {0}")]
    MarkFetched(#[source] StoreError),
    #[error("Failed to fetch feed: {0}")]
    Fetch(#[from] FetchError),
    #[error("Failed to parse feed: {0}")]
    Parse(#[from] ParseError),
}

/// Per-feed outcome of one ingestion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// New posts stored
    pub created: usize,
    /// Entries whose link was already stored
    pub skipped: usize,
    /// Entries dropped because of a store error other than a duplicate link
    pub failed: usize,
}

/// Fetch, parse and store one feed.
///
/// The feed is stamped as fetched *before* the request goes out, so a feed
/// whose fetch fails still rotates to the back of the selection order.
pub async fn ingest_once<S>(
    store: &S,
    fetcher: &Fetcher,
    feed: &Feed,
) -> Result<IngestReport, IngestError>
where
    S: CatalogStore + ?Sized,
{
    store
        .mark_feed_fetched(feed.id)
        .await
        .map_err(IngestError::MarkFetched)?;

    let bytes = fetcher.fetch(&feed.url).await?;
    let parsed = parse_feed(&bytes)?;

    tracing::debug!(
        feed = %feed.url,
        title = %parsed.title,
        items = parsed.entries.len(),
        "Parsed feed"
    );

    Ok(store_entries(store, feed.id, &parsed).await)
}

/// Store every entry of `parsed` under `feed_id`, in document order.
///
/// Duplicate links count as `skipped`. Any other store failure is logged,
/// counted as `failed`, and does not stop the remaining entries.
pub async fn store_entries<S>(store: &S, feed_id: i64, parsed: &ParsedFeed) -> IngestReport
where
    S: CatalogStore + ?Sized,
{
    let mut report = IngestReport::default();

    for entry in &parsed.entries {
        let post = NewPost {
            feed_id,
            title: &entry.title,
            url: &entry.link,
            description: &entry.description,
            published_at: parse_published(&entry.pub_date),
        };

        match store.create_post(&post).await {
            Ok(created) => {
                tracing::debug!(post_id = created.id, title = %created.title, "Created post");
                report.created += 1;
            }
            Err(StoreError::DuplicateLink(_)) => report.skipped += 1,
            Err(e) => {
                tracing::warn!(
                    feed_id = feed_id,
                    title = %entry.title,
                    link = %entry.link,
                    error = %e,
                    "Failed to store post"
                );
                report.failed += 1;
            }
        }
    }

    report
}

/// Parse an RSS `pubDate` (RFC 2822, e.g. `Mon, 02 Jan 2006 15:04:05 GMT`)
/// into Unix milliseconds. Missing or unparsable dates yield `None`.
pub fn parse_published(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ParsedEntry;
    use crate::storage::{Database, Post};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Store wrapper that fails `create_post` for one link with a non-duplicate error
    struct FailingStore {
        inner: Database,
        poisoned_link: String,
        attempted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CatalogStore for FailingStore {
        async fn least_recently_fetched_feed(&self) -> Result<Feed, StoreError> {
            self.inner.least_recently_fetched_feed().await
        }

        async fn mark_feed_fetched(&self, feed_id: i64) -> Result<(), StoreError> {
            CatalogStore::mark_feed_fetched(&self.inner, feed_id).await
        }

        async fn create_post(&self, post: &NewPost<'_>) -> Result<Post, StoreError> {
            self.attempted.lock().unwrap().push(post.url.to_string());
            if post.url == self.poisoned_link {
                return Err(StoreError::Other(sqlx::Error::PoolTimedOut));
            }
            self.inner.create_post(post).await
        }
    }

    /// Store whose feeds can never be stamped as fetched
    struct UnmarkableStore;

    #[async_trait]
    impl CatalogStore for UnmarkableStore {
        async fn least_recently_fetched_feed(&self) -> Result<Feed, StoreError> {
            Err(StoreError::NotFound)
        }

        async fn mark_feed_fetched(&self, _feed_id: i64) -> Result<(), StoreError> {
            Err(StoreError::Other(sqlx::Error::PoolTimedOut))
        }

        async fn create_post(&self, _post: &NewPost<'_>) -> Result<Post, StoreError> {
            panic!("nothing should be stored when marking fails");
        }
    }

    fn entry(title: &str, link: &str, pub_date: &str) -> ParsedEntry {
        ParsedEntry {
            title: title.into(),
            link: link.into(),
            description: String::new(),
            pub_date: pub_date.into(),
        }
    }

    async fn test_db_with_feed() -> (Database, Feed) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("alice").await.unwrap();
        let feed = db
            .create_feed(user.id, "Blog", "https://example.com/rss")
            .await
            .unwrap();
        (db, feed)
    }

    #[test]
    fn test_parse_published_rfc1123() {
        // 2006-01-02T15:04:05Z
        assert_eq!(
            parse_published("Mon, 02 Jan 2006 15:04:05 GMT"),
            Some(1_136_214_245_000)
        );
    }

    #[test]
    fn test_parse_published_numeric_offset() {
        assert_eq!(
            parse_published("Mon, 02 Jan 2006 17:04:05 +0200"),
            Some(1_136_214_245_000)
        );
    }

    #[test]
    fn test_parse_published_invalid_or_missing() {
        assert_eq!(parse_published(""), None);
        assert_eq!(parse_published("   "), None);
        assert_eq!(parse_published("2006-01-02T15:04:05Z"), None);
        assert_eq!(parse_published("yesterday"), None);
    }

    #[tokio::test]
    async fn test_store_entries_missing_and_valid_pub_date() {
        let (db, feed) = test_db_with_feed().await;
        let parsed = ParsedFeed {
            entries: vec![
                entry("No date", "https://example.com/a", ""),
                entry("Dated", "https://example.com/b", "Mon, 02 Jan 2006 15:04:05 GMT"),
            ],
            ..Default::default()
        };

        let report = store_entries(&db, feed.id, &parsed).await;
        assert_eq!(report, IngestReport { created: 2, skipped: 0, failed: 0 });

        let posts = db.get_posts_for_feed(feed.id).await.unwrap();
        assert_eq!(posts[0].published_at, None);
        assert_eq!(posts[1].published_at, Some(1_136_214_245_000));
    }

    #[tokio::test]
    async fn test_store_entries_duplicates_are_skipped() {
        let (db, feed) = test_db_with_feed().await;
        let parsed = ParsedFeed {
            entries: vec![
                entry("One", "https://example.com/1", ""),
                entry("One again", "https://example.com/1", ""),
                entry("Two", "https://example.com/2", ""),
            ],
            ..Default::default()
        };

        let report = store_entries(&db, feed.id, &parsed).await;
        assert_eq!(report, IngestReport { created: 2, skipped: 1, failed: 0 });
    }

    #[tokio::test]
    async fn test_store_entries_isolates_failures() {
        let (db, feed) = test_db_with_feed().await;
        let store = FailingStore {
            inner: db.clone(),
            poisoned_link: "https://example.com/2".into(),
            attempted: Mutex::new(Vec::new()),
        };
        let parsed = ParsedFeed {
            entries: vec![
                entry("One", "https://example.com/1", ""),
                entry("Two", "https://example.com/2", ""),
                entry("Three", "https://example.com/3", ""),
            ],
            ..Default::default()
        };

        let report = store_entries(&store, feed.id, &parsed).await;
        assert_eq!(report, IngestReport { created: 2, skipped: 0, failed: 1 });
        assert_eq!(
            *store.attempted.lock().unwrap(),
            vec![
                "https://example.com/1",
                "https://example.com/2",
                "https://example.com/3",
            ]
        );

        let titles: Vec<String> = db
            .get_posts_for_feed(feed.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["One", "Three"]);
    }

    #[tokio::test]
    async fn test_mark_failure_aborts_before_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<rss><channel/></rss>"))
            .expect(0)
            .mount(&server)
            .await;

        let feed = Feed {
            id: 7,
            name: "Blog".into(),
            url: format!("{}/rss", server.uri()),
            user_id: 1,
            created_at: 0,
            updated_at: 0,
            last_fetched_at: None,
        };
        let fetcher = Fetcher::new(Duration::from_secs(5)).unwrap();

        let result = ingest_once(&UnmarkableStore, &fetcher, &feed).await;
        assert!(
            matches!(result, Err(IngestError::MarkFetched(StoreError::Other(_)))),
            "got {:?}",
            result
        );
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
