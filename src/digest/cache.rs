use chrono::Utc;
use thiserror::Error;

use super::group::GroupedResult;
use crate::storage::{Database, DatabaseError};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Failed to serialize digest: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A single named cache slot holding one serialized digest.
///
/// Values are stored as JSON with an absolute expiry. A value that no
/// longer deserializes (e.g. written by an older build) is cleared and
/// treated as a miss rather than surfaced as an error.
#[derive(Clone)]
pub struct DigestCache {
    db: Database,
    slot: String,
    ttl_secs: i64,
}

impl DigestCache {
    pub fn new(db: Database, slot: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            db,
            slot: slot.into(),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub async fn get(&self) -> Result<Option<GroupedResult>, DatabaseError> {
        self.get_at(Utc::now().timestamp()).await
    }

    /// Fresh digest at `now` (Unix seconds), if any.
    pub async fn get_at(&self, now: i64) -> Result<Option<GroupedResult>, DatabaseError> {
        let Some(entry) = self.db.read_slot(&self.slot, now).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&entry.value) {
            Ok(digest) => Ok(Some(digest)),
            Err(e) => {
                tracing::warn!(slot = %self.slot, error = %e, "Discarding unreadable cache entry");
                self.db.clear_slot(&self.slot).await?;
                Ok(None)
            }
        }
    }

    pub async fn put(&self, digest: &GroupedResult) -> Result<(), CacheError> {
        self.put_at(digest, Utc::now().timestamp()).await
    }

    /// Store `digest`, fresh until `now + ttl`.
    pub async fn put_at(&self, digest: &GroupedResult, now: i64) -> Result<(), CacheError> {
        let value = serde_json::to_string(digest)?;
        let expires_at = now.saturating_add(self.ttl_secs);
        self.db.write_slot(&self.slot, &value, expires_at).await?;
        tracing::debug!(slot = %self.slot, expires_at, bytes = value.len(), "Cached digest");
        Ok(())
    }

    pub async fn clear(&self) -> Result<bool, DatabaseError> {
        self.db.clear_slot(&self.slot).await
    }
}
