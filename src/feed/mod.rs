//! Wiki sources: fetching and parsing.
//!
//! The digest is built from two views of the same activity:
//!
//! - **Syndication feed**: one item per edit, with the diff HTML inlined
//! - **Change log**: the RecentChanges API, with structured metadata but no text
//!
//! # Architecture
//!
//! - [`fetcher`] - HTTP access to the four wiki endpoints
//! - [`parser`] - Feed XML into [`FeedRecord`]s, using `feed-rs`
//! - [`changelog`] - API JSON into [`ChangeLogRecord`]s
//! - [`diff`] - Inserted-line extraction from diff table HTML
//!
//! Parsing is pure: each parser takes bytes and returns records, so the two
//! sources can be fetched concurrently and parsed independently.

mod changelog;
mod diff;
mod fetcher;
mod parser;

pub use changelog::{parse_change_log, ChangeLogParseError, ChangeLogRecord};
pub use diff::{extract_insertions, is_multi_revision};
pub use fetcher::{DigestFilter, FetchError, RevisionDiff, WikiClient};
pub use parser::{parse_feed, FeedParseError, FeedRecord};
