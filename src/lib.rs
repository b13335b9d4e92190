//! Recent talk-page discussions from a MediaWiki wiki, as a dated digest.
//!
//! See [`digest::DigestContext`] for the entry point.

pub mod config;
pub mod digest;
pub mod feed;
pub mod storage;
