//! Back-filling content the feed could not supply.
//!
//! Records left unresolved by reconciliation are fetched one diff per
//! revision from the revision API. Deleted or suppressed revisions come back
//! without a diff; those records keep `contents == None` and can be retried
//! individually through the comparison endpoint with [`retry_record`].

use futures::stream::{self, StreamExt};

use super::content::build_content;
use super::reconcile::ReconciliationResult;
use crate::feed::{extract_insertions, ChangeLogRecord, FetchError, RevisionDiff, WikiClient};

/// Revision ids the API accepts in one request.
pub const MAX_REVIDS_PER_REQUEST: usize = 50;

/// Concurrent batch requests.
const MAX_CONCURRENT_BATCHES: usize = 4;

/// Fetches diffs for every unresolved record and fills in their content.
///
/// Returns the number of records filled. With nothing unresolved no request
/// is made. Diffs from every batch that succeeded are applied before the
/// first batch error is returned, so only the failed batch's records stay
/// without content.
pub async fn fill_gaps(
    client: &WikiClient,
    result: &mut ReconciliationResult,
) -> Result<usize, FetchError> {
    if result.unresolved.is_empty() {
        return Ok(0);
    }

    let revids: Vec<u64> = result.unresolved.keys().copied().collect();
    tracing::debug!(revisions = revids.len(), "Fetching diffs for unresolved revisions");

    let batches: Vec<Result<Vec<RevisionDiff>, FetchError>> =
        stream::iter(revids.chunks(MAX_REVIDS_PER_REQUEST))
            .map(|batch| client.fetch_revision_diffs(batch))
            .buffer_unordered(MAX_CONCURRENT_BATCHES)
            .collect()
            .await;

    let mut diffs = Vec::with_capacity(revids.len());
    let mut first_error = None;
    for batch in batches {
        match batch {
            Ok(batch) => diffs.extend(batch),
            Err(e) => {
                tracing::warn!(error = %e, "Diff batch failed");
                first_error.get_or_insert(e);
            }
        }
    }

    let filled = apply_revision_diffs(result, diffs);
    match first_error {
        Some(e) => Err(e),
        None => Ok(filled),
    }
}

/// Writes content for each diff whose revision is unresolved.
///
/// The unresolved map has one index per revision, so every write lands on a
/// distinct record. Filled revisions are removed from the map; revisions
/// without a diff body stay in it.
pub fn apply_revision_diffs(
    result: &mut ReconciliationResult,
    diffs: impl IntoIterator<Item = RevisionDiff>,
) -> usize {
    let mut filled = 0;

    for diff in diffs {
        let Some(&index) = result.unresolved.get(&diff.revid) else {
            tracing::debug!(revision = diff.revid, "Diff for a revision that was not requested");
            continue;
        };
        let Some(body) = diff.body else {
            tracing::info!(revision = diff.revid, "Revision has no diff (deleted or suppressed)");
            continue;
        };

        let contents = content_from_diff(&body, &result.records[index]);
        result.records[index].contents = Some(contents);
        result.unresolved.remove(&diff.revid);
        filled += 1;
    }

    if !result.unresolved.is_empty() {
        tracing::warn!(
            remaining = result.unresolved.len(),
            "Some revisions could not be loaded"
        );
    }

    filled
}

/// Re-fetches one record's content through the comparison endpoint.
///
/// Page creations (`from_revision == 0`) are fetched as a single-revision
/// diff instead, see [`WikiClient::fetch_comparison`].
///
/// Returns `Ok(true)` when content was found and written, `Ok(false)` when the
/// comparison came back empty (the record stays in the failed state).
pub async fn retry_record(
    client: &WikiClient,
    record: &mut ChangeLogRecord,
) -> Result<bool, FetchError> {
    let body = client
        .fetch_comparison(record.from_revision, record.to_revision)
        .await?;

    match body {
        Some(body) => {
            let contents = content_from_diff(&body, record);
            record.contents = Some(contents);
            tracing::info!(revision = record.to_revision, "Reloaded record content");
            Ok(true)
        }
        None => {
            tracing::info!(revision = record.to_revision, "Comparison returned no diff");
            Ok(false)
        }
    }
}

fn content_from_diff(body: &str, record: &ChangeLogRecord) -> String {
    let lines = extract_insertions(body);
    build_content(&lines, record.heading.as_deref(), record.is_reply)
}
