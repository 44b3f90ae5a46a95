//! Inventory business logic - creating and looking up materials and products.
//!
//! Stock and price of existing items are only ever changed through purchase
//! reconciliation (see [`crate::core::reconciler`]); this module covers the
//! records those purchases point at.

use crate::{
    entities::{Material, Product, material, product},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Deserialize;

/// Fields for a new material or product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStockItem {
    /// Display name, trimmed before storing
    pub name: String,
    /// Unit of measure; ignored for products
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Opening stock
    #[serde(default)]
    pub stock: Decimal,
    /// Opening unit cost
    #[serde(default)]
    pub price: Decimal,
    /// Low-stock threshold
    #[serde(default)]
    pub min_stock: Decimal,
}

fn default_unit() -> String {
    "pcs".to_string()
}

impl NewStockItem {
    /// A named item with zero stock, zero price and no threshold.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: default_unit(),
            stock: Decimal::ZERO,
            price: Decimal::ZERO,
            min_stock: Decimal::ZERO,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput {
                message: "Name cannot be empty".to_string(),
            });
        }
        if self.stock < Decimal::ZERO || self.price < Decimal::ZERO || self.min_stock < Decimal::ZERO
        {
            return Err(Error::InvalidInput {
                message: format!(
                    "Stock, price and minimum stock must be non-negative (got {}, {}, {})",
                    self.stock, self.price, self.min_stock
                ),
            });
        }
        Ok(())
    }
}

/// Creates a material owned by `user_id`.
///
/// # Errors
/// Returns `InvalidInput` if the name is blank or any amount is negative.
pub async fn create_material(
    db: &DatabaseConnection,
    user_id: &str,
    item: NewStockItem,
) -> Result<material::Model> {
    item.validate()?;
    let now = Utc::now();

    let material = material::ActiveModel {
        user_id: Set(user_id.to_string()),
        name: Set(item.name.trim().to_string()),
        unit: Set(item.unit),
        stock: Set(item.stock),
        price: Set(item.price),
        min_stock: Set(item.min_stock),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    material.insert(db).await.map_err(Into::into)
}

/// Creates a product owned by `user_id`.
///
/// # Errors
/// Returns `InvalidInput` if the name is blank or any amount is negative.
pub async fn create_product(
    db: &DatabaseConnection,
    user_id: &str,
    item: NewStockItem,
) -> Result<product::Model> {
    item.validate()?;
    let now = Utc::now();

    let product = product::ActiveModel {
        user_id: Set(user_id.to_string()),
        name: Set(item.name.trim().to_string()),
        stock: Set(item.stock),
        price: Set(item.price),
        min_stock: Set(item.min_stock),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    product.insert(db).await.map_err(Into::into)
}

/// Finds a material by id.
pub async fn get_material_by_id(
    db: &DatabaseConnection,
    material_id: i64,
) -> Result<Option<material::Model>> {
    Material::find_by_id(material_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a product by id.
pub async fn get_product_by_id(
    db: &DatabaseConnection,
    product_id: i64,
) -> Result<Option<product::Model>> {
    Product::find_by_id(product_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// All of a user's materials, alphabetically.
pub async fn list_materials(db: &DatabaseConnection, user_id: &str) -> Result<Vec<material::Model>> {
    Material::find()
        .filter(material::Column::UserId.eq(user_id))
        .order_by_asc(material::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// All of a user's products, alphabetically.
pub async fn list_products(db: &DatabaseConnection, user_id: &str) -> Result<Vec<product::Model>> {
    Product::find()
        .filter(product::Column::UserId.eq(user_id))
        .order_by_asc(product::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_material_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_material(&db, "alice", NewStockItem::named("   ")).await;
        assert!(matches!(result, Err(Error::InvalidInput { .. })));

        let mut negative = NewStockItem::named("Flour");
        negative.price = dec!(-1);
        let result = create_material(&db, "alice", negative).await;
        assert!(matches!(result, Err(Error::InvalidInput { .. })));

        let mut negative = NewStockItem::named("Bread");
        negative.stock = dec!(-3);
        let result = create_product(&db, "alice", negative).await;
        assert!(matches!(result, Err(Error::InvalidInput { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_and_list_integration() -> Result<()> {
        let db = setup_test_db().await?;

        let material = create_custom_material(&db, "alice", "  Sugar ", dec!(5), dec!(1.25)).await?;
        assert_eq!(material.name, "Sugar");
        assert_eq!(material.unit, "pcs");
        assert_eq!(material.stock, dec!(5));

        create_custom_material(&db, "alice", "Flour", dec!(1), dec!(1)).await?;
        create_custom_material(&db, "bob", "Cocoa", dec!(1), dec!(1)).await?;
        create_custom_product(&db, "alice", "Cake", dec!(0), dec!(12)).await?;

        let materials = list_materials(&db, "alice").await?;
        let names: Vec<_> = materials.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Flour", "Sugar"]);
        assert_eq!(list_products(&db, "alice").await?.len(), 1);
        assert!(list_products(&db, "bob").await?.is_empty());

        let found = get_material_by_id(&db, material.id).await?.unwrap();
        assert_eq!(found, material);
        assert!(get_product_by_id(&db, 999).await?.is_none());

        Ok(())
    }
}
