//! Retrieving and decoding syndication documents.
//!
//! - `fetcher` - single-attempt HTTP retrieval with a timeout, size cap and
//!   fixed `User-Agent`
//! - `parser` - RSS decoding into a [`ParsedFeed`], with entity unescaping
//!   and lenient handling of missing fields
//!
//! Neither half touches storage; the [`crate::sync`] pipeline wires them to
//! the catalog.

mod fetcher;
mod parser;

pub use fetcher::{FetchError, Fetcher, DEFAULT_TIMEOUT, USER_AGENT};
pub use parser::{parse_feed, ParseError, ParsedEntry, ParsedFeed};
