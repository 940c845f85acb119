/// Status store persistence
///
/// The `service_status` table is the only state shared between probes:
/// every probe appends to it and the services probe reads it back.
pub mod migrations;
pub mod models;
pub mod repository;

pub use models::StatusRecord;
pub use repository::{StatusStore, StatusStoreImpl};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
