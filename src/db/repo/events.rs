use super::Repository;
use crate::domain::{Event, Timestamp};
use serde::Serialize;
use sqlx::Row;

/// An event as read back from the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEvent {
    pub id: i64,
    pub created_at: Timestamp,
    pub event: Event,
}

impl Repository {
    // =========================================================================
    // Event log
    // =========================================================================

    /// Append events in one transaction, preserving their order.
    ///
    /// # Errors
    /// Returns an error if serialization or any insert fails; nothing is written then.
    pub async fn insert_events(
        &self,
        events: &[Event],
        created_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for event in events {
            let payload =
                serde_json::to_string(event).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO events (slot_index, kind, payload, created_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(event.slot_index())
            .bind(event.kind())
            .bind(payload)
            .bind(created_at.as_secs() as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Most recent events for a slot, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a payload is malformed.
    pub async fn query_slot_events(
        &self,
        slot_index: u32,
        limit: u32,
    ) -> Result<Vec<StoredEvent>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, payload, created_at
            FROM events
            WHERE slot_index = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(slot_index)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let payload: String = row.try_get("payload")?;
                let created_at: i64 = row.try_get("created_at")?;
                let event = serde_json::from_str(&payload).map_err(|e| {
                    sqlx::Error::ColumnDecode {
                        index: "payload".to_string(),
                        source: Box::new(e),
                    }
                })?;
                Ok(StoredEvent {
                    id: row.try_get("id")?,
                    created_at: Timestamp::new(created_at as u64),
                    event,
                })
            })
            .collect()
    }

    /// Number of logged events of a given kind.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn count_events(&self, kind: &str) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM events WHERE kind = ?")
            .bind(kind)
            .fetch_one(&self.pool)
            .await?;
        row.try_get("n")
    }
}
