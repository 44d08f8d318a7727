//! Feed ingestion scheduler.
//!
//! Each tick selects the least-recently-fetched feed, fetches and parses it,
//! and stores entries it has not seen before:
//!
//! - `selector` - least-recently-fetched feed choice
//! - `pipeline` - mark-fetched, fetch, parse, per-entry persistence
//! - `runner` - fixed-interval loop with per-cycle failure isolation
//!
//! All storage access goes through [`crate::storage::CatalogStore`].
//!
//! # Example
//!
//! ```ignore
//! use gator::sync;
//!
//! let cycles = sync::run(&db, &fetcher, Duration::from_secs(60), shutdown).await?;
//! let report = sync::ingest_once(&db, &fetcher, &feed).await?;
//! ```

mod pipeline;
mod runner;
mod selector;

pub use pipeline::{ingest_once, parse_published, store_entries, IngestError, IngestReport};
pub use runner::{run, run_cycle, CycleOutcome, RunError};
pub use selector::{next_feed, SelectError};
