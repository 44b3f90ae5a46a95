//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs. Creation is idempotent: running it
//! against an existing database leaves existing tables untouched.

use crate::entities::{
    AdditionalCost, Material, Product, Purchase, PurchaseColumn, PurchaseItem, StockHistory,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use std::path::Path;
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/stockbook.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable, falling back
/// to a local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!(%database_url, "Connecting to database");
    if let Some(dir) = sqlite_parent_dir(&database_url) {
        std::fs::create_dir_all(dir)?;
    }
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Directory that must exist before a file-backed `SQLite` URL can be opened.
fn sqlite_parent_dir(database_url: &str) -> Option<&Path> {
    let path = database_url.strip_prefix("sqlite://")?;
    let path = path.split('?').next()?;
    Path::new(path)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
}

/// Creates all tables (if missing) plus the per-user invoice number index.
///
/// Parents are created before children so foreign keys resolve.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, Material).await?;
    create_table(db, &schema, Product).await?;
    create_table(db, &schema, Purchase).await?;
    create_table(db, &schema, PurchaseItem).await?;
    create_table(db, &schema, AdditionalCost).await?;
    create_table(db, &schema, StockHistory).await?;

    let invoice_index = Index::create()
        .name("idx_purchases_user_invoice")
        .table(Purchase)
        .col(PurchaseColumn::UserId)
        .col(PurchaseColumn::InvoiceNumber)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&invoice_index)).await?;

    info!("Database tables ensured");
    Ok(())
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}
