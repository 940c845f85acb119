use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::pool::{LibsqlManager, LibsqlPool};

/// Beacon chain tables of the primary store
#[async_trait]
pub trait PrimaryStore: Send + Sync {
    async fn max_attestation_slot(&self) -> Result<u64>;
    async fn max_block_slot(&self) -> Result<u64>;
    async fn max_epoch(&self) -> Result<u64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalBlock {
    pub number: u64,
    pub time: DateTime<Utc>,
}

/// Execution chain tables of the secondary, indexed store
#[async_trait]
pub trait SecondaryStore: Send + Sync {
    async fn latest_canonical_block(&self) -> Result<CanonicalBlock>;
    async fn latest_indexed_block_number(&self) -> Result<u64>;
}

/// Both chain views backed by one libsql database.
///
/// Expected tables: `validators(lastattestationslot)`, `blocks(slot)`,
/// `epochs(epoch)`, `eth1_blocks(number, time)` with `time` in unix seconds,
/// and `eth1_indexed(block_number)`.
pub struct SqlChainStore {
    pool: LibsqlPool,
}

impl SqlChainStore {
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }

    /// `MAX()` over an empty table yields NULL, which is an observation failure
    async fn max_of(&self, sql: &str, table: &str) -> Result<u64> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query(sql, ()).await?;
        let max: Option<i64> = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => None,
        };
        let max = max.ok_or_else(|| anyhow!("{table} table is empty"))?;
        Ok(u64::try_from(max)?)
    }
}

#[async_trait]
impl PrimaryStore for SqlChainStore {
    async fn max_attestation_slot(&self) -> Result<u64> {
        self.max_of("SELECT MAX(lastattestationslot) FROM validators", "validators").await
    }

    async fn max_block_slot(&self) -> Result<u64> {
        self.max_of("SELECT MAX(slot) FROM blocks", "blocks").await
    }

    async fn max_epoch(&self) -> Result<u64> {
        self.max_of("SELECT MAX(epoch) FROM epochs", "epochs").await
    }
}

#[async_trait]
impl SecondaryStore for SqlChainStore {
    async fn latest_canonical_block(&self) -> Result<CanonicalBlock> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query("SELECT number, time FROM eth1_blocks ORDER BY number DESC LIMIT 1", ())
            .await?;
        let row = rows.next().await?.ok_or_else(|| anyhow!("eth1_blocks table is empty"))?;

        let number: i64 = row.get(0)?;
        let time: i64 = row.get(1)?;
        Ok(CanonicalBlock {
            number: u64::try_from(number)?,
            time: DateTime::from_timestamp(time, 0)
                .ok_or_else(|| anyhow!("block {number} has invalid time {time}"))?,
        })
    }

    async fn latest_indexed_block_number(&self) -> Result<u64> {
        self.max_of("SELECT MAX(block_number) FROM eth1_indexed", "eth1_indexed").await
    }
}
