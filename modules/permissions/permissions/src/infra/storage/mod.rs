//! Grant store adapters.

pub mod entity;
mod mapper;
pub mod memory;
pub mod migrations;
pub mod sea_orm_store;

#[cfg(test)]
pub(crate) mod test_support;

pub use memory::InMemoryPermissionStore;
pub use sea_orm_store::SeaOrmPermissionStore;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::info;

/// Open `dsn` and bring the schema up to date.
///
/// An in-memory SQLite database lives inside a single connection, so its
/// pool is capped at one.
///
/// # Errors
/// Connection or migration failure.
pub async fn connect(dsn: &str) -> anyhow::Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(dsn);
    options.sqlx_logging(false);
    if dsn.contains(":memory:") {
        options.max_connections(1).min_connections(1);
    }
    let conn = Database::connect(options).await?;
    info!("Running permissions database migrations");
    migrations::Migrator::up(&conn, None).await?;
    info!("Permissions database migrations completed successfully");
    Ok(conn)
}
