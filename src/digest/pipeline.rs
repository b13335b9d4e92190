use chrono::FixedOffset;
use thiserror::Error;

use super::cache::DigestCache;
use super::gapfill;
use super::group::{group_by_date, GroupedResult};
use super::reconcile::reconcile;
use crate::feed::{
    parse_change_log, parse_feed, ChangeLogParseError, ChangeLogRecord, DigestFilter,
    FeedParseError, FetchError, WikiClient,
};

/// Why a digest could not be produced.
///
/// The message is the same for every variant. The underlying cause is logged
/// when the error is created and stays reachable through `source()`.
#[derive(Debug, Error)]
pub enum DigestError {
    /// A primary source could not be fetched
    #[error("Could not load recent discussions. Please try again later.")]
    Fetch(#[source] FetchError),

    /// The syndication feed was not a readable feed document
    #[error("Could not load recent discussions. Please try again later.")]
    Feed(#[source] FeedParseError),

    /// The change log was not a readable API response
    #[error("Could not load recent discussions. Please try again later.")]
    ChangeLog(#[source] ChangeLogParseError),
}

/// Everything one digest needs, passed explicitly instead of held globally.
///
/// `offset` is the viewer's UTC offset, used for the day labels.
#[derive(Clone)]
pub struct DigestContext {
    client: WikiClient,
    cache: DigestCache,
    offset: FixedOffset,
}

impl DigestContext {
    pub fn new(client: WikiClient, cache: DigestCache, offset: FixedOffset) -> Self {
        Self {
            client,
            cache,
            offset,
        }
    }

    pub fn cache(&self) -> &DigestCache {
        &self.cache
    }

    /// The digest for `filter`, from cache when possible.
    ///
    /// Only the unfiltered view is cached; any other filter always fetches.
    /// A cache read failure is logged and falls through to a live fetch.
    pub async fn load(
        &self,
        filter: &DigestFilter,
        bypass_cache: bool,
    ) -> Result<GroupedResult, DigestError> {
        if filter.is_default() && !bypass_cache {
            match self.cache.get().await {
                Ok(Some(digest)) => {
                    tracing::debug!(slot = %self.cache.slot(), "Serving digest from cache");
                    return Ok(digest);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Cache read failed, fetching live"),
            }
        }

        self.refresh(filter).await
    }

    /// Fetch both sources and rebuild the digest.
    ///
    /// Either primary source failing fails the whole refresh. Back-filling is
    /// best effort: if it fails, affected records are returned without
    /// content.
    pub async fn refresh(&self, filter: &DigestFilter) -> Result<GroupedResult, DigestError> {
        let (feed_bytes, log_bytes) = tokio::try_join!(
            self.client.fetch_feed(filter),
            self.client.fetch_change_log(filter)
        )
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch discussion sources");
            DigestError::Fetch(e)
        })?;

        let feed = parse_feed(&feed_bytes).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse syndication feed");
            DigestError::Feed(e)
        })?;
        let log = parse_change_log(&log_bytes).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse change log");
            DigestError::ChangeLog(e)
        })?;

        let mut result = reconcile(&feed, log);
        tracing::info!(
            feed_items = feed.len(),
            records = result.records.len(),
            unresolved = result.unresolved.len(),
            "Reconciled sources"
        );

        if !result.unresolved.is_empty() {
            match gapfill::fill_gaps(&self.client, &mut result).await {
                Ok(filled) => tracing::debug!(filled, "Back-filled record content"),
                Err(e) => tracing::warn!(error = %e, "Back-fill failed, some records have no content"),
            }
        }

        let digest = group_by_date(result.records, &self.offset);
        self.store(filter, &digest).await;
        Ok(digest)
    }

    /// Write `digest` to the cache if `filter` is the cached view.
    ///
    /// Failures are logged; a digest that cannot be cached is still usable.
    pub async fn store(&self, filter: &DigestFilter, digest: &GroupedResult) {
        if !filter.is_default() {
            return;
        }
        if let Err(e) = self.cache.put(digest).await {
            tracing::warn!(slot = %self.cache.slot(), error = %e, "Failed to cache digest");
        }
    }

    /// Re-fetch one record's content through the comparison endpoint.
    pub async fn retry_record(&self, record: &mut ChangeLogRecord) -> Result<bool, DigestError> {
        gapfill::retry_record(&self.client, record)
            .await
            .map_err(|e| {
                tracing::error!(revision = record.to_revision, error = %e, "Retry failed");
                DigestError::Fetch(e)
            })
    }

    /// Retry every record without content, one at a time.
    ///
    /// Returns how many were loaded. Individual failures are logged and
    /// skipped.
    pub async fn retry_failed(&self, digest: &mut GroupedResult) -> usize {
        let mut loaded = 0;
        for record in digest.records_mut().filter(|r| r.contents.is_none()) {
            if let Ok(true) = self.retry_record(record).await {
                loaded += 1;
            }
        }
        loaded
    }
}
