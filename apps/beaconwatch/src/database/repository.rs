use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::params;

use super::models::StatusRecord;
use crate::pool::{LibsqlManager, LibsqlPool};

/// Append-only access to the `service_status` table
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Append one record; existing rows are never touched
    async fn insert(&self, record: &StatusRecord) -> Result<i64>;

    /// Records reported strictly after `since`, newest first.
    ///
    /// Rows sharing a timestamp come back in reverse insertion order. Other
    /// writers share the table, so metadata that is not JSON reads as `None`.
    async fn reported_since(&self, since: DateTime<Utc>) -> Result<Vec<StatusRecord>>;

    /// Delete records reported strictly before `cutoff`, returning how many went
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// LibSQL status store
pub struct StatusStoreImpl {
    pool: LibsqlPool,
}

impl StatusStoreImpl {
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl StatusStore for StatusStoreImpl {
    async fn insert(&self, record: &StatusRecord) -> Result<i64> {
        let conn = self.get_conn().await?;
        let metadata = record.metadata.as_ref().map(serde_json::to_string).transpose()?;

        conn.execute(
            "INSERT INTO service_status (name, status, metadata, last_update) VALUES (?, ?, ?, ?)",
            params![
                record.name.clone(),
                record.status.clone(),
                metadata,
                StatusRecord::timestamp_to_i64(record.reported_at)
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn reported_since(&self, since: DateTime<Utc>) -> Result<Vec<StatusRecord>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT name, status, metadata, last_update FROM service_status WHERE last_update > ? ORDER BY last_update DESC, id DESC",
                params![StatusRecord::timestamp_to_i64(since)],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            let metadata: Option<String> = row.get(2)?;
            let last_update: i64 = row.get(3)?;

            records.push(StatusRecord {
                name: row.get(0)?,
                status: row.get(1)?,
                metadata: metadata.as_deref().and_then(|raw| serde_json::from_str(raw).ok()),
                reported_at: StatusRecord::i64_to_timestamp(last_update),
            });
        }

        Ok(records)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute(
                "DELETE FROM service_status WHERE last_update < ?",
                params![StatusRecord::timestamp_to_i64(cutoff)],
            )
            .await?;
        Ok(deleted)
    }
}
