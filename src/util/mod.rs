//! Input validation shared by the command-line front end.
//!
//! - **Feed URLs**: scheme/host checks and normalization before a feed is stored
//! - **Intervals**: `30s` / `1m` / `1h30m` tick intervals for `agg`

mod interval;
mod url_validator;

pub use interval::{parse_interval, IntervalError};
pub use url_validator::{validate_feed_url, UrlValidationError};
