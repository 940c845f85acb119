//! Shared fixtures for unit tests.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::{TempDir, tempdir};

use crate::database::{StatusRecord, StatusStore, StatusStoreImpl};
use crate::pool::{LibsqlPool, open_pool};

/// On-disk pool in a fresh temp dir; keep the `TempDir` alive for the test.
pub async fn create_test_pool(file: &str) -> Result<(LibsqlPool, TempDir)> {
    let temp_dir = tempdir()?;
    let pool = open_pool(&temp_dir.path().join(file), 4).await?;
    Ok((pool, temp_dir))
}

pub async fn create_test_store() -> Result<(StatusStoreImpl, TempDir)> {
    let (pool, temp_dir) = create_test_pool("status.db").await?;
    let conn = pool.get().await?;
    crate::database::initialize_database(&conn).await?;
    drop(conn);
    Ok((StatusStoreImpl::new_from_pool(pool), temp_dir))
}

/// Status store kept in memory, optionally refusing (or never answering) calls.
#[derive(Default)]
pub struct MemoryStore {
    pub records: Mutex<Vec<StatusRecord>>,
    pub fail_writes: bool,
    pub hang_writes: bool,
    pub fail_reads: bool,
    pub fail_deletes: bool,
}

impl MemoryStore {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn statuses(&self, name: &str) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.name == name)
            .map(|r| r.status.clone())
            .collect()
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn insert(&self, record: &StatusRecord) -> Result<i64> {
        if self.hang_writes {
            std::future::pending::<()>().await;
        }
        if self.fail_writes {
            anyhow::bail!("disk full");
        }
        let mut records = self.records.lock().unwrap();
        records.push(record.clone());
        Ok(records.len() as i64)
    }

    async fn reported_since(&self, since: DateTime<Utc>) -> Result<Vec<StatusRecord>> {
        if self.fail_reads {
            anyhow::bail!("connection refused");
        }
        let records = self.records.lock().unwrap();
        let mut recent: Vec<_> =
            records.iter().rev().filter(|r| r.reported_at > since).cloned().collect();
        // stable sort keeps reverse insertion order for equal timestamps
        recent.sort_by(|a, b| b.reported_at.cmp(&a.reported_at));
        Ok(recent)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        if self.fail_deletes {
            anyhow::bail!("table locked");
        }
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.reported_at >= cutoff);
        Ok((before - records.len()) as u64)
    }
}
