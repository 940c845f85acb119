use std::{path::Path, time::Duration};

use deadpool::managed::{self, Pool, RecycleResult};
use libsql::{Builder, Connection, Database, Error as LibsqlError};

/// Concurrent probes write to the same file, so writers wait for the lock
/// instead of failing with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct LibsqlManager {
    database: Database,
}

impl LibsqlManager {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

impl managed::Manager for LibsqlManager {
    type Type = Connection;
    type Error = LibsqlError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        let conn = self.database.connect()?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    async fn recycle(
        &self,
        conn: &mut Self::Type,
        _: &managed::Metrics,
    ) -> RecycleResult<Self::Error> {
        conn.query("SELECT 1", ())
            .await?
            .next()
            .await?
            .ok_or(LibsqlError::QueryReturnedNoRows)?;
        Ok(())
    }
}

pub type LibsqlPool = Pool<LibsqlManager>;

/// Open (or create) a local libsql database and wrap it in a pool.
pub async fn open_pool(path: &Path, max_size: usize) -> anyhow::Result<LibsqlPool> {
    let database = Builder::new_local(path).build().await?;
    let pool = Pool::builder(LibsqlManager::new(database)).max_size(max_size).build()?;
    tracing::debug!(path = %path.display(), max_size, "Opened libsql pool");
    Ok(pool)
}
