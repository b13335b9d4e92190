//! Turning the two wiki sources into a dated discussion digest.
//!
//! Data flows one way: [`reconcile`] attaches feed text to change-log
//! records, [`fill_gaps`] back-fills whatever the feed could not supply,
//! and [`group_by_date`] buckets the result by day. [`DigestContext`] runs
//! the whole pipeline and owns the cache.

mod cache;
mod content;
mod gapfill;
mod group;
pub mod patterns;
mod pipeline;
mod reconcile;

pub use cache::{CacheError, DigestCache};
pub use content::build_content;
pub use gapfill::{apply_revision_diffs, fill_gaps, retry_record, MAX_REVIDS_PER_REQUEST};
pub use group::{group_by_date, DateGroup, GroupedResult};
pub use pipeline::{DigestContext, DigestError};
pub use reconcile::{align, reconcile, Alignment, ReconciliationResult};
