//! Alignment of the syndication feed against the change log.
//!
//! The change log lists every tagged edit but carries no text; the feed
//! carries text but may fold several consecutive edits to one page into a
//! single combined diff. Both are newest-first and describe the same window,
//! so a single forward pass with one cursor per sequence lines them up.
//!
//! The work is split in two so each half can be tested on its own:
//! [`align`] decides, per change-log record, which feed item (if any) it
//! corresponds to; [`reconcile`] applies that decision, building content for
//! exact matches and collecting everything else for gap-filling.

use std::collections::BTreeMap;

use super::content::build_content;
use crate::feed::{ChangeLogRecord, FeedRecord};

/// How one change-log record relates to the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Same revision bounds as `feed[feed_index]`; its text can be used.
    Exact { feed_index: usize },
    /// Part of the combined multi-revision diff `feed[feed_index]`.
    Collapsed { feed_index: usize },
    /// The feed ran out before this record.
    FeedExhausted,
    /// Neither an exact match nor a combined diff. Both cursors move on so
    /// the pass terminates; the record is fetched separately.
    Mismatch { feed_index: usize },
}

impl Alignment {
    /// Whether the feed supplied this record's content.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Alignment::Exact { .. })
    }
}

/// Change-log records after alignment, plus the ones still lacking content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationResult {
    /// Same length and order as the parsed change log.
    pub records: Vec<ChangeLogRecord>,
    /// `to_revision` → index into `records`, for every record without content.
    pub unresolved: BTreeMap<u64, usize>,
}

/// Aligns each change-log record with the feed, returning one [`Alignment`]
/// per record (`result.len() == log.len()`).
pub fn align(feed: &[FeedRecord], log: &[ChangeLogRecord]) -> Vec<Alignment> {
    let mut alignments = Vec::with_capacity(log.len());
    let mut i = 0;
    let mut j = 0;

    while i < log.len() {
        let Some(item) = feed.get(j) else {
            alignments.push(Alignment::FeedExhausted);
            i += 1;
            continue;
        };
        let record = &log[i];

        if record.from_revision == item.from_revision && record.to_revision == item.to_revision {
            alignments.push(Alignment::Exact { feed_index: j });
            i += 1;
            j += 1;
        } else if item.has_multiple_revisions {
            // Consume records until the one that starts where the combined diff starts.
            while i < log.len() {
                let boundary = log[i].from_revision == item.from_revision;
                alignments.push(Alignment::Collapsed { feed_index: j });
                i += 1;
                if boundary {
                    break;
                }
            }
            j += 1;
        } else {
            tracing::debug!(
                log_from = record.from_revision,
                log_to = record.to_revision,
                feed_from = item.from_revision,
                feed_to = item.to_revision,
                "Feed and change log out of step"
            );
            alignments.push(Alignment::Mismatch { feed_index: j });
            i += 1;
            j += 1;
        }
    }

    alignments
}

/// Fills change-log records with feed content where the two line up.
///
/// Records matched exactly get `contents` built from the feed item; every
/// other record is listed in [`ReconciliationResult::unresolved`].
pub fn reconcile(feed: &[FeedRecord], log: Vec<ChangeLogRecord>) -> ReconciliationResult {
    let alignments = align(feed, &log);
    let mut records = log;
    let mut unresolved = BTreeMap::new();

    for (index, (record, alignment)) in records.iter_mut().zip(&alignments).enumerate() {
        match *alignment {
            Alignment::Exact { feed_index } => {
                let item = &feed[feed_index];
                let lines = item.text_additions.as_deref().unwrap_or_default();
                record.contents = Some(build_content(lines, item.heading.as_deref(), item.is_reply));
            }
            Alignment::Collapsed { .. } | Alignment::FeedExhausted | Alignment::Mismatch { .. } => {
                if let Some(previous) = unresolved.insert(record.to_revision, index) {
                    tracing::warn!(
                        revision = record.to_revision,
                        first = previous,
                        second = index,
                        "Revision listed twice in change log, keeping first"
                    );
                    unresolved.insert(record.to_revision, previous);
                }
            }
        }
    }

    let matched = alignments.iter().filter(|a| a.is_resolved()).count();
    tracing::debug!(
        records = records.len(),
        matched = matched,
        unresolved = unresolved.len(),
        "Reconciled feed against change log"
    );

    ReconciliationResult {
        records,
        unresolved,
    }
}
