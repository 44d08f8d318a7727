use anyhow::{Context, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use gator::commands::{self, CommandError};
use gator::config::{default_config_dir, Config};
use gator::feed::Fetcher;
use gator::storage::{Database, StoreError};
use gator::sync::CycleOutcome;
use gator::util::parse_interval;

#[derive(Parser, Debug)]
#[command(name = "gator", version, about = "Multi-user RSS aggregator")]
struct Args {
    /// Config file (default: ~/.config/gator/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding `db_path` from the config
    #[arg(long, value_name = "FILE", global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a user and log in as it
    Register { name: String },
    /// Switch the current user
    Login { name: String },
    /// List all users
    Users,
    /// Delete all users, feeds, follows and posts
    Reset,
    /// Add a feed and follow it
    #[command(name = "addfeed")]
    AddFeed { name: String, url: String },
    /// List every feed in the catalog
    Feeds,
    /// Follow an existing feed by URL
    Follow { url: String },
    /// Stop following a feed
    Unfollow { url: String },
    /// List feeds the current user follows
    Following,
    /// Show recent posts from followed feeds
    Browse { limit: Option<i64> },
    /// Collect feeds every INTERVAL (e.g. 30s, 1m, 1h) until Ctrl-C
    Agg { interval: Option<String> },
    /// Collect the stalest feed once
    Scrape,
}

fn format_millis(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "unknown date".to_string())
}

async fn open_database(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory '{}'", parent.display())
            })?;
        }
    }

    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    match Database::open(path_str).await {
        Ok(db) => Ok(db),
        Err(StoreError::InstanceLocked) => {
            eprintln!("Error: {}", StoreError::InstanceLocked);
            std::process::exit(1);
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open database '{}': {}", path.display(), e)),
    }
}

fn print_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Ingested { feed, report } => println!(
            "{}: {} new, {} already stored, {} failed",
            feed.name, report.created, report.skipped, report.failed
        ),
        CycleOutcome::CatalogEmpty => {
            println!("No feeds to collect. Add one with `gator addfeed`.")
        }
        CycleOutcome::SelectFailed(e) => eprintln!("Failed to select a feed: {}", e),
        CycleOutcome::IngestFailed { feed, error } => {
            eprintln!("{} ({}): {}", feed.name, feed.url, error)
        }
    }
}

async fn run_command(
    command: Command,
    db: &Database,
    config: &mut Config,
    config_path: &Path,
) -> Result<(), CommandError> {
    match command {
        Command::Register { name } => {
            let user = commands::register(db, config, config_path, &name).await?;
            println!("Registered and logged in as {}", user.name);
        }
        Command::Login { name } => {
            let user = commands::login(db, config, config_path, &name).await?;
            println!("Logged in as {}", user.name);
        }
        Command::Users => {
            for (user, current) in commands::users(db, config).await? {
                if current {
                    println!("* {} (current)", user.name);
                } else {
                    println!("* {}", user.name);
                }
            }
        }
        Command::Reset => {
            let removed = commands::reset(db).await?;
            println!("Database reset ({} users removed)", removed);
        }
        Command::AddFeed { name, url } => {
            let (feed, _) = commands::add_feed(db, config, &name, &url).await?;
            println!("Added and followed {} ({})", feed.name, feed.url);
        }
        Command::Feeds => {
            for feed in commands::feeds(db).await? {
                println!("* {} {} (added by {})", feed.name, feed.url, feed.owner);
            }
        }
        Command::Follow { url } => {
            let (user, feed) = commands::follow(db, config, &url).await?;
            println!("{} now follows {}", user.name, feed.name);
        }
        Command::Unfollow { url } => {
            let feed = commands::unfollow(db, config, &url).await?;
            println!("Unfollowed {}", feed.name);
        }
        Command::Following => {
            for feed in commands::following(db, config).await? {
                println!("* {}", feed.name);
            }
        }
        Command::Browse { limit } => {
            let posts = commands::browse(db, config, limit).await?;
            if posts.is_empty() {
                println!("No posts yet. Run `gator agg` to collect some.");
            }
            for post in posts {
                let date = post
                    .published_at
                    .map(format_millis)
                    .unwrap_or_else(|| "unknown date".to_string());
                println!("{} | {}", date, post.title);
                println!("  {}", post.url);
                if !post.description.is_empty() {
                    println!("  {}", post.description);
                }
            }
        }
        Command::Agg { interval } => {
            let raw = interval.unwrap_or_else(|| config.default_tick_interval.clone());
            let interval = parse_interval(&raw)?;
            let fetcher = Fetcher::new(config.request_timeout())?;
            println!("Collecting feeds every {:?}. Press Ctrl-C to stop.", interval);
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            };
            let cycles = commands::agg(db, &fetcher, interval, shutdown).await?;
            println!("Stopped after {} cycles", cycles);
        }
        Command::Scrape => {
            let fetcher = Fetcher::new(config.request_timeout())?;
            print_outcome(&commands::scrape(db, &fetcher).await);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gator=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = default_config_dir().context("Failed to locate config directory")?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config '{}'", config_path.display()))?;

    let db_path = match &args.db {
        Some(p) => p.clone(),
        None => config.resolve_db_path(config_path.parent().unwrap_or(&config_dir)),
    };
    tracing::debug!(config = %config_path.display(), db = %db_path.display(), "Starting");

    let db = open_database(&db_path).await?;

    if let Err(e) = run_command(args.command, &db, &mut config, &config_path).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
