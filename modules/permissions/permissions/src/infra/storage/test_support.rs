#![allow(clippy::unwrap_used, clippy::expect_used)]

use sea_orm::DatabaseConnection;

/// Fresh in-memory SQLite database with the schema applied.
pub async fn inmem_db() -> DatabaseConnection {
    super::connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite with migrations")
}
