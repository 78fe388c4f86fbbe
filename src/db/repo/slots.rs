use super::{parse_column, Repository};
use crate::domain::{SequenceNumber, Slot, Timestamp};
use crate::engine::PendingRequest;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

impl Repository {
    // =========================================================================
    // Slot operations
    // =========================================================================

    /// Write a slot snapshot unless the stored row is newer.
    ///
    /// A row only moves forward on `(epoch_id, last_multiplier_time)`, so
    /// snapshots journaled out of order never regress it. Returns whether the
    /// row changed.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub async fn upsert_slot(&self, index: u32, slot: &Slot) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO slots (
                slot_index, epoch_id, init_price, start_time, ups, multiplier,
                last_multiplier_time, miner, uri, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(slot_index) DO UPDATE SET
                epoch_id = excluded.epoch_id,
                init_price = excluded.init_price,
                start_time = excluded.start_time,
                ups = excluded.ups,
                multiplier = excluded.multiplier,
                last_multiplier_time = excluded.last_multiplier_time,
                miner = excluded.miner,
                uri = excluded.uri,
                updated_at = excluded.updated_at
            WHERE excluded.epoch_id > slots.epoch_id
               OR (excluded.epoch_id = slots.epoch_id
                   AND excluded.last_multiplier_time >= slots.last_multiplier_time)
            "#,
        )
        .bind(index)
        .bind(slot.epoch_id as i64)
        .bind(slot.init_price.to_string())
        .bind(slot.start_time.as_secs() as i64)
        .bind(slot.ups.to_string())
        .bind(slot.multiplier.to_string())
        .bind(slot.last_multiplier_time.as_secs() as i64)
        .bind(slot.miner.to_string())
        .bind(slot.uri.as_str())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get the journaled snapshot of a slot.
    ///
    /// # Errors
    /// Returns an error if the query fails or the row is malformed.
    pub async fn get_slot(&self, index: u32) -> Result<Option<Slot>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT epoch_id, init_price, start_time, ups, multiplier,
                   last_multiplier_time, miner, uri
            FROM slots
            WHERE slot_index = ?
            "#,
        )
        .bind(index)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(slot_from_row).transpose()
    }

    /// All journaled slots, ordered by index.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row is malformed.
    pub async fn list_slots(&self) -> Result<Vec<(u32, Slot)>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT slot_index, epoch_id, init_price, start_time, ups, multiplier,
                   last_multiplier_time, miner, uri
            FROM slots
            ORDER BY slot_index ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Ok((row.try_get("slot_index")?, slot_from_row(row)?)))
            .collect()
    }

    // =========================================================================
    // Pending oracle requests
    // =========================================================================

    /// Record an outstanding oracle request. Idempotent per sequence number,
    /// and a no-op once the request has been resolved.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_pending(
        &self,
        sequence_number: SequenceNumber,
        request: &PendingRequest,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO pending_requests
                (sequence_number, slot_index, epoch_id, created_at)
            SELECT ?1, ?2, ?3, ?4
            WHERE NOT EXISTS (
                SELECT 1 FROM resolved_requests WHERE sequence_number = ?1
            )
            "#,
        )
        .bind(sequence_number as i64)
        .bind(request.slot_index)
        .bind(request.epoch_id as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a request resolved and drop its pending row, whatever the outcome.
    /// Returns whether a pending row was removed.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn resolve_pending(
        &self,
        sequence_number: SequenceNumber,
        outcome: &str,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO resolved_requests (sequence_number, outcome, resolved_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(sequence_number as i64)
        .bind(outcome)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;
        let result = sqlx::query("DELETE FROM pending_requests WHERE sequence_number = ?")
            .bind(sequence_number as i64)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Outstanding requests, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_pending(&self) -> Result<Vec<(SequenceNumber, PendingRequest)>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT sequence_number, slot_index, epoch_id
            FROM pending_requests
            ORDER BY sequence_number ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let sequence_number: i64 = row.try_get("sequence_number")?;
                let epoch_id: i64 = row.try_get("epoch_id")?;
                Ok((
                    sequence_number as SequenceNumber,
                    PendingRequest {
                        slot_index: row.try_get("slot_index")?,
                        epoch_id: epoch_id as u64,
                    },
                ))
            })
            .collect()
    }
}

fn slot_from_row(row: &SqliteRow) -> Result<Slot, sqlx::Error> {
    let epoch_id: i64 = row.try_get("epoch_id")?;
    let start_time: i64 = row.try_get("start_time")?;
    let last_multiplier_time: i64 = row.try_get("last_multiplier_time")?;
    Ok(Slot {
        epoch_id: epoch_id as u64,
        init_price: parse_column(row, "init_price")?,
        start_time: Timestamp::new(start_time as u64),
        ups: parse_column(row, "ups")?,
        multiplier: parse_column(row, "multiplier")?,
        last_multiplier_time: Timestamp::new(last_multiplier_time as u64),
        miner: parse_column(row, "miner")?,
        uri: row.try_get("uri")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::domain::{Address, Amount};
    use tempfile::TempDir;

    async fn setup_test_db() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn slot(epoch_id: u64, last_multiplier_time: u64) -> Slot {
        Slot {
            epoch_id,
            init_price: Amount::from_whole(2),
            start_time: Timestamp::new(1_000),
            ups: Amount::from_whole(4),
            multiplier: Amount::from_whole(3),
            last_multiplier_time: Timestamp::new(last_multiplier_time),
            miner: Address::from_low_u64(9),
            uri: "ipfs://x".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get_slot() {
        let (repo, _temp) = setup_test_db().await;
        assert_eq!(repo.get_slot(0).await.unwrap(), None);

        assert!(repo.upsert_slot(0, &slot(1, 0)).await.unwrap());
        assert_eq!(repo.get_slot(0).await.unwrap(), Some(slot(1, 0)));
    }

    #[tokio::test]
    async fn test_upsert_never_regresses() {
        let (repo, _temp) = setup_test_db().await;
        repo.upsert_slot(0, &slot(3, 50)).await.unwrap();

        assert!(!repo.upsert_slot(0, &slot(2, 90)).await.unwrap());
        assert!(!repo.upsert_slot(0, &slot(3, 40)).await.unwrap());
        assert_eq!(repo.get_slot(0).await.unwrap(), Some(slot(3, 50)));

        assert!(repo.upsert_slot(0, &slot(3, 60)).await.unwrap());
        assert!(repo.upsert_slot(0, &slot(4, 0)).await.unwrap());
        assert_eq!(repo.get_slot(0).await.unwrap(), Some(slot(4, 0)));
    }

    #[tokio::test]
    async fn test_list_slots_ordered() {
        let (repo, _temp) = setup_test_db().await;
        repo.upsert_slot(5, &slot(1, 0)).await.unwrap();
        repo.upsert_slot(2, &slot(1, 0)).await.unwrap();
        let indices: Vec<u32> = repo
            .list_slots()
            .await
            .unwrap()
            .into_iter()
            .map(|(i, _)| i)
            .collect();
        assert_eq!(indices, vec![2, 5]);
    }

    #[tokio::test]
    async fn test_pending_lifecycle() {
        let (repo, _temp) = setup_test_db().await;
        let request = PendingRequest {
            slot_index: 1,
            epoch_id: 7,
        };
        repo.insert_pending(11, &request).await.unwrap();
        repo.insert_pending(11, &request).await.unwrap();
        repo.insert_pending(12, &request).await.unwrap();
        assert_eq!(
            repo.list_pending().await.unwrap(),
            vec![(11, request), (12, request)]
        );

        assert!(repo.resolve_pending(11, "applied").await.unwrap());
        assert!(!repo.resolve_pending(11, "orphaned").await.unwrap());
        assert_eq!(repo.list_pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resolved_request_is_not_reinserted() {
        let (repo, _temp) = setup_test_db().await;
        let request = PendingRequest {
            slot_index: 0,
            epoch_id: 1,
        };
        // Callback journaled before the takeover that made the request.
        assert!(!repo.resolve_pending(5, "applied").await.unwrap());
        repo.insert_pending(5, &request).await.unwrap();
        repo.insert_pending(6, &request).await.unwrap();
        assert_eq!(repo.list_pending().await.unwrap(), vec![(6, request)]);
    }
}
