//! Test utilities shared by service integration tests
//!
//! Tests run against an in-memory SQLite database with the full migration
//! set applied, so every crate exercises the same schema the server boots
//! with.

use crate::DbConnection;
use parley_migrations::Migrator;
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;

/// Fresh in-memory database with migrations applied
pub struct TestDatabase {
    pub db: Arc<DbConnection>,
}

impl TestDatabase {
    pub async fn new() -> anyhow::Result<Self> {
        let db = Database::connect("sqlite::memory:").await?;
        Migrator::up(&db, None).await?;
        Ok(Self { db: Arc::new(db) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_apply_on_sqlite() {
        let test_db = TestDatabase::new().await.unwrap();
        // A second `up` must be a no-op
        Migrator::up(test_db.db.as_ref(), None).await.unwrap();
    }
}
