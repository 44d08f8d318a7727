//! gator: a multi-user RSS aggregator.
//!
//! Users register feeds and follow them; a scheduler polls the catalog one
//! feed per tick, least-recently-fetched first, and stores new posts.

pub mod commands;
pub mod config;
pub mod feed;
pub mod storage;
pub mod sync;
pub mod util;
