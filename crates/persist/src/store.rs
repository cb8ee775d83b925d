//! [`SqliteStore`]: the concrete `(pv, fp)` table plus the ping queue table,
//! behind one pool so both collaborators share the same transactional
//! guarantees without coordinating across processes.

use async_trait::async_trait;
use ceu_errors::{Error, PersistError};
use ceu_events::Event;
use ceu_engine::{PersistedData, PingManager};
use ceu_types::SessionId;
use sqlx::{Pool, Row, Sqlite};

#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    #[must_use]
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn store_error(message: impl Into<String>) -> Error {
        PersistError::StoreError {
            message: message.into(),
        }
        .into()
    }

    /// Ping rows never flushed to a remote collector, oldest first. The
    /// sqlite queue is this crate's durability layer; nothing in this
    /// workspace drains it over the network.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn pending_pings(&self, limit: i64) -> Result<Vec<(i64, String)>, Error> {
        let rows = sqlx::query(
            "SELECT id, event_json FROM ping_queue WHERE sent_at IS NULL ORDER BY id ASC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::store_error(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get::<i64, _>("id"), row.get::<String, _>("event_json")))
            .collect())
    }

    /// Marks the given queue rows as sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn mark_pings_sent(&self, ids: &[i64]) -> Result<(), Error> {
        let now = chrono::Utc::now().timestamp();
        for id in ids {
            sqlx::query("UPDATE ping_queue SET sent_at = ?1 WHERE id = ?2")
                .bind(now)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| Self::store_error(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl PersistedData for SqliteStore {
    async fn get_pv(&self, id: &str) -> Option<String> {
        sqlx::query("SELECT pv FROM component_data WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten()
            .map(|row| row.get::<String, _>("pv"))
    }

    async fn get_fp(&self, id: &str) -> Option<String> {
        sqlx::query("SELECT fp FROM component_data WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten()
            .map(|row| row.get::<String, _>("fp"))
    }

    async fn set_pv_fp(&self, id: &str, pv: &str, fp: &str) -> Result<(), Error> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO component_data (id, pv, fp, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET pv = excluded.pv, fp = excluded.fp, updated_at = excluded.updated_at",
        )
        .bind(id)
        .bind(pv)
        .bind(fp)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::store_error(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl PingManager for SqliteStore {
    async fn send_ping(
        &self,
        session_id: SessionId,
        component_id: &str,
        events: Vec<Event>,
    ) -> Result<(), Error> {
        let now = chrono::Utc::now().timestamp();
        let session_id = session_id.to_string();

        for event in &events {
            let event_json = serde_json::to_string(event)
                .map_err(|e| Self::store_error(format!("serializing ping event: {e}")))?;

            sqlx::query(
                "INSERT INTO ping_queue (session_id, component_id, event_json, queued_at) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&session_id)
            .bind(component_id)
            .bind(event_json)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::store_error(e.to_string()))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteStore {
        // A single connection: sqlite's `:memory:` database is private to
        // the connection that created it, so a pooled size > 1 would hand
        // later queries a blank database.
        let options = sqlx::sqlite::SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        crate::run_migrations(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    #[tokio::test]
    async fn pv_fp_round_trips() {
        let store = store().await;
        assert_eq!(store.get_pv("app1").await, None);

        store.set_pv_fp("app1", "1.2.3", "fp-a").await.unwrap();
        assert_eq!(store.get_pv("app1").await, Some("1.2.3".to_string()));
        assert_eq!(store.get_fp("app1").await, Some("fp-a".to_string()));

        store.set_pv_fp("app1", "1.2.4", "fp-b").await.unwrap();
        assert_eq!(store.get_pv("app1").await, Some("1.2.4".to_string()));
    }

    #[tokio::test]
    async fn send_ping_queues_one_row_per_event() {
        let store = store().await;
        let session_id = SessionId::new_v4();
        let events = vec![
            Event::terminal(
                ceu_events::EventType::Update,
                true,
                ceu_errors::ErrorCategory::None,
                0,
                0,
                None,
                None,
                ceu_errors::ErrorCategory::None,
                0,
            ),
        ];

        store.send_ping(session_id, "app1", events).await.unwrap();
        let pending = store.pending_pings(10).await.unwrap();
        assert_eq!(pending.len(), 1);

        let ids: Vec<i64> = pending.iter().map(|(id, _)| *id).collect();
        store.mark_pings_sent(&ids).await.unwrap();
        assert!(store.pending_pings(10).await.unwrap().is_empty());
    }
}
