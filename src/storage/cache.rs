use super::schema::Database;
use super::types::{CacheEntry, DatabaseError};

impl Database {
    // ========================================================================
    // Cache Slot Operations
    // ========================================================================

    /// Read a slot if it is still fresh at `now` (Unix seconds).
    ///
    /// An expired row is deleted and reported as absent, so a stale value is
    /// never returned twice.
    pub async fn read_slot(
        &self,
        key: &str,
        now: i64,
    ) -> Result<Option<CacheEntry>, DatabaseError> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT value, expires_at FROM cache_slots WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((value, expires_at)) if expires_at > now => {
                Ok(Some(CacheEntry { value, expires_at }))
            }
            Some((_, expires_at)) => {
                tracing::debug!(key = %key, expires_at, now, "Cache slot expired");
                self.clear_slot(key).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Store a slot value (UPSERT), replacing any previous value.
    pub async fn write_slot(
        &self,
        key: &str,
        value: &str,
        expires_at: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO cache_slots (key, value, expires_at, updated_at)
            VALUES (?, ?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete a slot. Returns whether a row was removed.
    pub async fn clear_slot(&self, key: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM cache_slots WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{CacheEntry, Database};
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_read_missing_slot() {
        let db = test_db().await;
        assert_eq!(db.read_slot("digest", 1_000).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_and_read_slot() {
        let db = test_db().await;
        db.write_slot("digest", "{}", 1_300).await.unwrap();

        let entry = db.read_slot("digest", 1_000).await.unwrap();
        assert_eq!(
            entry,
            Some(CacheEntry {
                value: "{}".to_string(),
                expires_at: 1_300,
            })
        );
    }

    #[tokio::test]
    async fn test_write_slot_upsert() {
        let db = test_db().await;
        db.write_slot("digest", "first", 1_300).await.unwrap();
        db.write_slot("digest", "second", 2_000).await.unwrap();

        let entry = db.read_slot("digest", 1_500).await.unwrap().unwrap();
        assert_eq!(entry.value, "second");
        assert_eq!(entry.expires_at, 2_000);
    }

    #[tokio::test]
    async fn test_expired_slot_is_deleted() {
        let db = test_db().await;
        db.write_slot("digest", "old", 1_300).await.unwrap();

        // Expiry is exclusive: a slot is stale at exactly `expires_at`.
        assert_eq!(db.read_slot("digest", 1_300).await.unwrap(), None);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cache_slots")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_slots_are_independent() {
        let db = test_db().await;
        db.write_slot("a", "one", 1_300).await.unwrap();
        db.write_slot("b", "two", 1_300).await.unwrap();

        assert!(db.clear_slot("a").await.unwrap());
        assert!(!db.clear_slot("a").await.unwrap());
        assert_eq!(db.read_slot("a", 1_000).await.unwrap(), None);
        assert_eq!(
            db.read_slot("b", 1_000).await.unwrap().map(|e| e.value),
            Some("two".to_string())
        );
    }
}
