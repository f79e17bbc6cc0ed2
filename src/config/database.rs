//! Database configuration module for the mess ledger.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs. Constraints the entity macros cannot
//! express (the composite meal-entry uniqueness) are added as explicit indexes.

use crate::entities::{
    AttendanceToken, BazarRecord, ExpenseCategory, ExpenseRecord, MealAttendance, MealEntry,
    Member, PaymentRecord, Tenant, meal_entry,
};
use crate::errors::{Error, Result};
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};
use std::future::Future;
use tracing::{debug, info, warn};

/// Default database location when neither the environment nor the config file set one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/mess_ledger.sqlite?mode=rwc";

/// Name of the unique index that backs the one-entry-per-member-per-day rule.
pub const MEAL_ENTRY_UNIQUE_INDEX: &str = "idx_meal_entries_tenant_member_date";

/// Gets the database URL from `DATABASE_URL`, falling back to `configured` and then to
/// [`DEFAULT_DATABASE_URL`].
#[must_use]
pub fn get_database_url(configured: Option<&str>) -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        configured
            .map_or_else(|| DEFAULT_DATABASE_URL.to_string(), ToString::to_string)
    })
}

/// Establishes a connection to the database at `database_url`.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to database at {}", database_url);
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates all tables from the entity definitions plus the composite unique index on
/// meal entries. Safe to call on every start.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let tables = [
        schema.create_table_from_entity(Tenant),
        schema.create_table_from_entity(Member),
        schema.create_table_from_entity(ExpenseCategory),
        schema.create_table_from_entity(MealEntry),
        schema.create_table_from_entity(BazarRecord),
        schema.create_table_from_entity(ExpenseRecord),
        schema.create_table_from_entity(PaymentRecord),
        schema.create_table_from_entity(AttendanceToken),
        schema.create_table_from_entity(MealAttendance),
    ];
    for mut table in tables {
        table.if_not_exists();
        db.execute(builder.build(&table)).await?;
    }

    let meal_unique = Index::create()
        .name(MEAL_ENTRY_UNIQUE_INDEX)
        .table(MealEntry)
        .col(meal_entry::Column::TenantId)
        .col(meal_entry::Column::MemberId)
        .col(meal_entry::Column::Date)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&meal_unique)).await?;

    info!("Database tables ensured");
    Ok(())
}

/// Runs a read-only store operation, retrying when the pool could not hand out a
/// connection. Business-rule failures and other store errors are returned immediately.
///
/// Only use this for work with no side effects; a retried write could commit twice.
pub async fn retry_read<T, F, Fut>(attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Err(Error::Database(DbErr::ConnectionAcquire(e))) if attempt < attempts => {
                warn!("Read attempt {} failed to acquire a connection: {}", attempt, e);
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{MealEntryModel, TenantModel};
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let _: Vec<TenantModel> = Tenant::find().limit(1).all(&db).await?;
        let _: Vec<MealEntryModel> = MealEntry::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_retry_read_gives_up_after_attempts() {
        let mut calls = 0;
        let result: Result<()> = retry_read(3, || {
            calls += 1;
            async {
                Err(Error::Database(DbErr::ConnectionAcquire(
                    sea_orm::ConnAcquireErr::Timeout,
                )))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_retry_read_does_not_retry_business_errors() {
        let mut calls = 0;
        let result: Result<()> = retry_read(3, || {
            calls += 1;
            async { Err(Error::TenantNotFound { id: 1 }) }
        })
        .await;
        assert!(matches!(result, Err(Error::TenantNotFound { id: 1 })));
        assert_eq!(calls, 1);
    }
}
