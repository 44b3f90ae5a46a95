//! Shared test utilities for stockbook.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        inventory::{self, NewStockItem},
        purchase::{self, PurchaseDetails, PurchaseDraft, PurchaseItemDraft},
    },
    entities::{self, Material, Product, StockHistory},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a material with the given stock and unit price.
pub async fn create_custom_material(
    db: &DatabaseConnection,
    user_id: &str,
    name: &str,
    stock: Decimal,
    price: Decimal,
) -> Result<entities::material::Model> {
    let item = NewStockItem {
        stock,
        price,
        ..NewStockItem::named(name)
    };
    inventory::create_material(db, user_id, item).await
}

/// Creates a product with the given stock and unit price.
pub async fn create_custom_product(
    db: &DatabaseConnection,
    user_id: &str,
    name: &str,
    stock: Decimal,
    price: Decimal,
) -> Result<entities::product::Model> {
    let item = NewStockItem {
        stock,
        price,
        ..NewStockItem::named(name)
    };
    inventory::create_product(db, user_id, item).await
}

/// Creates a material with a low-stock threshold.
///
/// # Defaults
/// * price: 1
pub async fn create_material_with_min(
    db: &DatabaseConnection,
    user_id: &str,
    name: &str,
    stock: Decimal,
    min_stock: Decimal,
) -> Result<entities::material::Model> {
    let item = NewStockItem {
        stock,
        price: Decimal::ONE,
        min_stock,
        ..NewStockItem::named(name)
    };
    inventory::create_material(db, user_id, item).await
}

/// Sets up a test environment with one material owned by `alice`.
/// Returns (db, material) with stock 10 at unit price 100.
pub async fn setup_with_material() -> Result<(DatabaseConnection, entities::material::Model)> {
    let db = setup_test_db().await?;
    let material =
        create_custom_material(&db, "alice", "Flour", Decimal::from(10), Decimal::from(100))
            .await?;
    Ok((db, material))
}

/// A pending draft with the given lines and everything else defaulted.
#[must_use]
pub fn draft_with_items(items: Vec<PurchaseItemDraft>) -> PurchaseDraft {
    PurchaseDraft {
        supplier_name: Some("Test Supplier".to_string()),
        items,
        ..PurchaseDraft::default()
    }
}

/// Creates a single-line pending purchase for `alice`.
pub async fn create_pending_purchase(
    db: &DatabaseConnection,
    material_id: i64,
    quantity: Decimal,
    price: Decimal,
    auto_update_price: bool,
) -> Result<PurchaseDetails> {
    let mut draft = draft_with_items(vec![PurchaseItemDraft::material(
        material_id,
        quantity,
        price,
    )]);
    draft.auto_update_price = auto_update_price;
    purchase::create_purchase(db, &draft, "alice").await
}

/// Reloads a material, failing if it has been deleted.
pub async fn load_material(db: &DatabaseConnection, id: i64) -> Result<entities::material::Model> {
    Material::find_by_id(id)
        .one(db)
        .await?
        .ok_or(Error::MaterialNotFound { id })
}

/// Reloads a product, failing if it has been deleted.
pub async fn load_product(db: &DatabaseConnection, id: i64) -> Result<entities::product::Model> {
    Product::find_by_id(id)
        .one(db)
        .await?
        .ok_or(Error::ProductNotFound { id })
}

/// Number of stock ledger rows across all users.
pub async fn count_ledger_rows(db: &DatabaseConnection) -> Result<u64> {
    Ok(StockHistory::find().count(db).await?)
}
