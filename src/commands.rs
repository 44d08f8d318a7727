//! Command handlers behind the `gator` CLI.
//!
//! Each handler does the work and returns data; printing is left to
//! `main.rs`. Handlers that change the current user persist the config.
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::feed::{FetchError, Fetcher};
use crate::storage::{Database, Feed, FeedFollow, FeedWithOwner, Post, StoreError, User};
use crate::sync::{self, CycleOutcome, RunError};
use crate::util::{validate_feed_url, IntervalError, UrlValidationError};

/// Default number of posts shown by `browse`.
pub const DEFAULT_BROWSE_LIMIT: i64 = 2;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("No user is logged in. Run `gator register <name>` or `gator login <name>` first.")]
    NotLoggedIn,

    #[error("User '{0}' does not exist")]
    UnknownUser(String),

    #[error("User '{0}' already exists")]
    UserExists(String),

    #[error("No feed with URL '{0}' in the catalog")]
    UnknownFeed(String),

    #[error("A feed with URL '{0}' already exists")]
    FeedExists(String),

    #[error("Already following '{0}'")]
    AlreadyFollowing(String),

    #[error("Not following '{0}'")]
    NotFollowing(String),

    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),

    #[error(transparent)]
    Interval(#[from] IntervalError),

    #[error("Failed to set up HTTP client: {0}")]
    HttpClient(#[from] FetchError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolve the configured current user against the database.
pub async fn current_user(db: &Database, config: &Config) -> Result<User, CommandError> {
    let name = config
        .current_user_name
        .as_deref()
        .ok_or(CommandError::NotLoggedIn)?;
    match db.get_user(name).await {
        Ok(user) => Ok(user),
        Err(StoreError::NotFound) => Err(CommandError::UnknownUser(name.to_string())),
        Err(e) => Err(e.into()),
    }
}

pub async fn register(
    db: &Database,
    config: &mut Config,
    config_path: &Path,
    name: &str,
) -> Result<User, CommandError> {
    let user = match db.create_user(name).await {
        Ok(user) => user,
        Err(StoreError::Conflict(_)) => return Err(CommandError::UserExists(name.to_string())),
        Err(e) => return Err(e.into()),
    };
    config.set_user(&user.name, config_path)?;
    tracing::info!(user = %user.name, "Registered user");
    Ok(user)
}

pub async fn login(
    db: &Database,
    config: &mut Config,
    config_path: &Path,
    name: &str,
) -> Result<User, CommandError> {
    let user = match db.get_user(name).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(CommandError::UnknownUser(name.to_string())),
        Err(e) => return Err(e.into()),
    };
    config.set_user(&user.name, config_path)?;
    Ok(user)
}

/// All users, each paired with whether it is the current one.
pub async fn users(db: &Database, config: &Config) -> Result<Vec<(User, bool)>, CommandError> {
    let current = config.current_user_name.as_deref();
    Ok(db
        .get_users()
        .await?
        .into_iter()
        .map(|u| {
            let is_current = current == Some(u.name.as_str());
            (u, is_current)
        })
        .collect())
}

/// Delete every user. Feeds, follows and posts go with them.
pub async fn reset(db: &Database) -> Result<u64, CommandError> {
    let removed = db.reset().await?;
    tracing::info!(users = removed, "Database reset");
    Ok(removed)
}

/// Add a feed owned by the current user, who also follows it.
pub async fn add_feed(
    db: &Database,
    config: &Config,
    name: &str,
    url: &str,
) -> Result<(Feed, FeedFollow), CommandError> {
    let user = current_user(db, config).await?;
    let url = validate_feed_url(url)?;

    let feed = match db.create_feed(user.id, name, &url).await {
        Ok(feed) => feed,
        Err(StoreError::Conflict(_)) => return Err(CommandError::FeedExists(url)),
        Err(e) => return Err(e.into()),
    };
    let follow = db.create_feed_follow(user.id, feed.id).await?;
    tracing::info!(feed = %feed.name, url = %feed.url, user = %user.name, "Added feed");
    Ok((feed, follow))
}

pub async fn feeds(db: &Database) -> Result<Vec<FeedWithOwner>, CommandError> {
    Ok(db.get_feeds_with_owner().await?)
}

async fn feed_by_url(db: &Database, url: &str) -> Result<Feed, CommandError> {
    let normalized = validate_feed_url(url)?;
    match db.get_feed_by_url(&normalized).await {
        Ok(feed) => Ok(feed),
        Err(StoreError::NotFound) => Err(CommandError::UnknownFeed(normalized)),
        Err(e) => Err(e.into()),
    }
}

pub async fn follow(
    db: &Database,
    config: &Config,
    url: &str,
) -> Result<(User, Feed), CommandError> {
    let user = current_user(db, config).await?;
    let feed = feed_by_url(db, url).await?;
    match db.create_feed_follow(user.id, feed.id).await {
        Ok(_) => Ok((user, feed)),
        Err(StoreError::Conflict(_)) => Err(CommandError::AlreadyFollowing(feed.name)),
        Err(e) => Err(e.into()),
    }
}

pub async fn unfollow(db: &Database, config: &Config, url: &str) -> Result<Feed, CommandError> {
    let user = current_user(db, config).await?;
    let feed = feed_by_url(db, url).await?;
    match db.delete_feed_follow(user.id, feed.id).await {
        Ok(()) => Ok(feed),
        Err(StoreError::NotFound) => Err(CommandError::NotFollowing(feed.name)),
        Err(e) => Err(e.into()),
    }
}

pub async fn following(db: &Database, config: &Config) -> Result<Vec<Feed>, CommandError> {
    let user = current_user(db, config).await?;
    Ok(db.get_followed_feeds(user.id).await?)
}

/// Most recent posts from the current user's followed feeds.
pub async fn browse(
    db: &Database,
    config: &Config,
    limit: Option<i64>,
) -> Result<Vec<Post>, CommandError> {
    let user = current_user(db, config).await?;
    Ok(db
        .get_posts_for_user(user.id, limit.unwrap_or(DEFAULT_BROWSE_LIMIT))
        .await?)
}

/// Run the scheduler until `shutdown` resolves. Returns completed cycles.
pub async fn agg<F>(
    db: &Database,
    fetcher: &Fetcher,
    interval: Duration,
    shutdown: F,
) -> Result<u64, CommandError>
where
    F: Future<Output = ()>,
{
    Ok(sync::run(db, fetcher, interval, shutdown).await?)
}

/// Run exactly one scheduler cycle.
pub async fn scrape(db: &Database, fetcher: &Fetcher) -> CycleOutcome {
    sync::run_cycle(db, fetcher).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    async fn setup(name: &str) -> (Database, Config, PathBuf) {
        let dir = std::env::temp_dir().join(format!("gator_commands_test_{}", name));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::remove_file(&path).ok();
        let db = Database::open(":memory:").await.unwrap();
        (db, Config::default(), path)
    }

    #[tokio::test]
    async fn test_register_sets_current_user() {
        let (db, mut config, path) = setup("register").await;

        let user = register(&db, &mut config, &path, "alice").await.unwrap();
        assert_eq!(user.name, "alice");
        assert_eq!(config.current_user_name.as_deref(), Some("alice"));
        assert_eq!(Config::load(&path).unwrap().current_user_name.as_deref(), Some("alice"));

        let err = register(&db, &mut config, &path, "alice").await.unwrap_err();
        assert!(matches!(err, CommandError::UserExists(n) if n == "alice"));
    }

    #[tokio::test]
    async fn test_login_requires_existing_user() {
        let (db, mut config, path) = setup("login").await;

        let err = login(&db, &mut config, &path, "ghost").await.unwrap_err();
        assert!(matches!(err, CommandError::UnknownUser(_)));
        assert!(config.current_user_name.is_none());

        db.create_user("bob").await.unwrap();
        login(&db, &mut config, &path, "bob").await.unwrap();
        assert_eq!(config.current_user_name.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn test_users_marks_current() {
        let (db, mut config, path) = setup("users").await;
        register(&db, &mut config, &path, "alice").await.unwrap();
        register(&db, &mut config, &path, "bob").await.unwrap();

        let listed = users(&db, &config).await.unwrap();
        let marks: Vec<(&str, bool)> = listed.iter().map(|(u, c)| (u.name.as_str(), *c)).collect();
        assert_eq!(marks, vec![("alice", false), ("bob", true)]);
    }

    #[tokio::test]
    async fn test_commands_need_login() {
        let (db, config, _) = setup("need_login").await;

        assert!(matches!(
            add_feed(&db, &config, "Blog", "https://example.com/rss").await,
            Err(CommandError::NotLoggedIn)
        ));
        assert!(matches!(following(&db, &config).await, Err(CommandError::NotLoggedIn)));
        assert!(matches!(browse(&db, &config, None).await, Err(CommandError::NotLoggedIn)));
    }

    #[tokio::test]
    async fn test_add_feed_follows_it() {
        let (db, mut config, path) = setup("add_feed").await;
        register(&db, &mut config, &path, "alice").await.unwrap();

        let (feed, follow) = add_feed(&db, &config, "Blog", "HTTPS://Example.com/rss")
            .await
            .unwrap();
        assert_eq!(feed.url, "https://example.com/rss");
        assert_eq!(follow.feed_id, feed.id);
        assert_eq!(following(&db, &config).await.unwrap(), vec![feed.clone()]);

        let listed = feeds(&db).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].owner, "alice");

        let err = add_feed(&db, &config, "Again", "https://example.com/rss")
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::FeedExists(_)));
    }

    #[tokio::test]
    async fn test_add_feed_rejects_bad_url() {
        let (db, mut config, path) = setup("bad_url").await;
        register(&db, &mut config, &path, "alice").await.unwrap();

        let err = add_feed(&db, &config, "Local", "file:///etc/passwd")
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidUrl(_)));
        assert!(feeds(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_follow_and_unfollow() {
        let (db, mut config, path) = setup("follow").await;
        register(&db, &mut config, &path, "alice").await.unwrap();
        add_feed(&db, &config, "Blog", "https://example.com/rss").await.unwrap();
        register(&db, &mut config, &path, "bob").await.unwrap();

        let (user, feed) = follow(&db, &config, "https://example.com/rss").await.unwrap();
        assert_eq!(user.name, "bob");
        assert_eq!(feed.name, "Blog");
        assert!(matches!(
            follow(&db, &config, "https://example.com/rss").await,
            Err(CommandError::AlreadyFollowing(_))
        ));

        unfollow(&db, &config, "https://example.com/rss").await.unwrap();
        assert!(following(&db, &config).await.unwrap().is_empty());
        assert!(matches!(
            unfollow(&db, &config, "https://example.com/rss").await,
            Err(CommandError::NotFollowing(_))
        ));
        assert!(matches!(
            follow(&db, &config, "https://nowhere.example/rss").await,
            Err(CommandError::UnknownFeed(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_clears_users() {
        let (db, mut config, path) = setup("reset").await;
        register(&db, &mut config, &path, "alice").await.unwrap();
        add_feed(&db, &config, "Blog", "https://example.com/rss").await.unwrap();

        assert_eq!(reset(&db).await.unwrap(), 1);
        assert!(users(&db, &config).await.unwrap().is_empty());
        assert!(feeds(&db).await.unwrap().is_empty());
        // The config still names alice, who is gone now
        assert!(matches!(
            following(&db, &config).await,
            Err(CommandError::UnknownUser(_))
        ));
    }

    #[tokio::test]
    async fn test_scrape_on_empty_catalog() {
        let (db, _, _) = setup("scrape").await;
        let fetcher = Fetcher::new(Duration::from_secs(1)).unwrap();
        assert!(matches!(scrape(&db, &fetcher).await, CycleOutcome::CatalogEmpty));
    }
}
