//! Stock business logic - stock levels, unit prices and the stock ledger.
//!
//! Materials and products live in separate tables but share the same stock
//! columns. [`StockTarget`] names one of them so the reconciler can treat both
//! uniformly. All mutating helpers are generic over [`ConnectionTrait`] and are
//! meant to run inside the caller's transaction; none of them opens one.

use crate::{
    core::pricing::StockSnapshot,
    entities::{
        Material, MovementType, Product, StockHistory, material, product, stock_history,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// A material or product whose stock can move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum StockTarget {
    /// Material by id
    Material(i64),
    /// Product by id
    Product(i64),
}

impl StockTarget {
    fn not_found(self) -> Error {
        match self {
            Self::Material(id) => Error::MaterialNotFound { id },
            Self::Product(id) => Error::ProductNotFound { id },
        }
    }
}

impl fmt::Display for StockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Material(id) => write!(f, "material {id}"),
            Self::Product(id) => write!(f, "product {id}"),
        }
    }
}

/// Stock state of a target as read from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetState {
    /// Which material or product
    pub target: StockTarget,
    /// Owner of the target
    pub user_id: String,
    /// Current stock level
    pub stock: Decimal,
    /// Current unit cost
    pub price: Decimal,
}

impl TargetState {
    /// Pricing view of this state.
    #[must_use]
    pub const fn snapshot(&self) -> StockSnapshot {
        StockSnapshot {
            stock: self.stock,
            price: self.price,
        }
    }
}

/// Reads the current stock and price of a target.
///
/// # Errors
/// Returns `MaterialNotFound`/`ProductNotFound` if the target does not exist.
pub async fn load_target<C>(db: &C, target: StockTarget) -> Result<TargetState>
where
    C: ConnectionTrait,
{
    let state = match target {
        StockTarget::Material(id) => Material::find_by_id(id).one(db).await?.map(|m| TargetState {
            target,
            user_id: m.user_id,
            stock: m.stock,
            price: m.price,
        }),
        StockTarget::Product(id) => Product::find_by_id(id).one(db).await?.map(|p| TargetState {
            target,
            user_id: p.user_id,
            stock: p.stock,
            price: p.price,
        }),
    };
    state.ok_or_else(|| target.not_found())
}

/// Reads a target and checks it belongs to `user_id`.
///
/// A target owned by someone else is reported as not found so that ids of
/// other users' stock are not disclosed.
pub async fn load_owned_target<C>(db: &C, user_id: &str, target: StockTarget) -> Result<TargetState>
where
    C: ConnectionTrait,
{
    let state = load_target(db, target).await?;
    if state.user_id != user_id {
        return Err(target.not_found());
    }
    Ok(state)
}

/// Atomically adds `delta` to a target's stock (negative to remove).
///
/// Uses a single `UPDATE ... SET stock = stock + delta` so concurrent
/// adjustments cannot lose updates.
pub async fn adjust_stock_atomic<C>(db: &C, target: StockTarget, delta: Decimal) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let result = match target {
        StockTarget::Material(id) => {
            Material::update_many()
                .col_expr(
                    material::Column::Stock,
                    Expr::col(material::Column::Stock).add(delta),
                )
                .col_expr(material::Column::UpdatedAt, Expr::value(now))
                .filter(material::Column::Id.eq(id))
                .exec(db)
                .await?
        }
        StockTarget::Product(id) => {
            Product::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).add(delta),
                )
                .col_expr(product::Column::UpdatedAt, Expr::value(now))
                .filter(product::Column::Id.eq(id))
                .exec(db)
                .await?
        }
    };

    if result.rows_affected == 0 {
        return Err(target.not_found());
    }
    debug!(%target, %delta, "Stock adjusted");
    Ok(())
}

/// Overwrites a target's unit price.
pub async fn set_price<C>(db: &C, target: StockTarget, price: Decimal) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let result = match target {
        StockTarget::Material(id) => {
            Material::update_many()
                .col_expr(material::Column::Price, Expr::value(price))
                .col_expr(material::Column::UpdatedAt, Expr::value(now))
                .filter(material::Column::Id.eq(id))
                .exec(db)
                .await?
        }
        StockTarget::Product(id) => {
            Product::update_many()
                .col_expr(product::Column::Price, Expr::value(price))
                .col_expr(product::Column::UpdatedAt, Expr::value(now))
                .filter(product::Column::Id.eq(id))
                .exec(db)
                .await?
        }
    };

    if result.rows_affected == 0 {
        return Err(target.not_found());
    }
    debug!(%target, %price, "Price updated");
    Ok(())
}

/// A ledger row about to be written.
#[derive(Debug, Clone)]
pub struct NewMovement<'a> {
    /// Owner of the ledger row
    pub user_id: &'a str,
    /// Material or product that moved
    pub target: StockTarget,
    /// Direction of the movement
    pub movement_type: MovementType,
    /// Always positive; `movement_type` carries the direction
    pub quantity: Decimal,
    /// Human-readable cause, e.g. `Purchase completed: INV-...`
    pub description: String,
    /// Invoice number or purchase id the movement belongs to
    pub reference: String,
}

/// Appends one row to the stock ledger.
pub async fn record_movement<C>(db: &C, movement: NewMovement<'_>) -> Result<stock_history::Model>
where
    C: ConnectionTrait,
{
    if movement.quantity <= Decimal::ZERO {
        return Err(Error::InvalidInput {
            message: format!(
                "Ledger quantity must be positive, got {}",
                movement.quantity
            ),
        });
    }

    let (material_id, product_id) = match movement.target {
        StockTarget::Material(id) => (Some(id), None),
        StockTarget::Product(id) => (None, Some(id)),
    };

    let row = stock_history::ActiveModel {
        user_id: Set(movement.user_id.to_string()),
        material_id: Set(material_id),
        product_id: Set(product_id),
        movement_type: Set(movement.movement_type),
        quantity: Set(movement.quantity),
        description: Set(movement.description),
        reference: Set(movement.reference),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    row.insert(db).await.map_err(Into::into)
}

/// Retrieves the ledger for one target, newest first.
///
/// Only rows written for `user_id` are returned.
pub async fn get_stock_history(
    db: &DatabaseConnection,
    user_id: &str,
    target: StockTarget,
) -> Result<Vec<stock_history::Model>> {
    load_owned_target(db, user_id, target).await?;

    let query = StockHistory::find().filter(stock_history::Column::UserId.eq(user_id));
    let query = match target {
        StockTarget::Material(id) => query.filter(stock_history::Column::MaterialId.eq(id)),
        StockTarget::Product(id) => query.filter(stock_history::Column::ProductId.eq(id)),
    };
    query
        .order_by_desc(stock_history::Column::CreatedAt)
        .order_by_desc(stock_history::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Ledger rows written with the given reference, oldest first.
pub async fn get_stock_history_by_reference(
    db: &DatabaseConnection,
    user_id: &str,
    reference: &str,
) -> Result<Vec<stock_history::Model>> {
    StockHistory::find()
        .filter(stock_history::Column::UserId.eq(user_id))
        .filter(stock_history::Column::Reference.eq(reference))
        .order_by_asc(stock_history::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Materials and products at or below their minimum stock.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LowStockReport {
    /// Low materials, by name
    pub materials: Vec<material::Model>,
    /// Low products, by name
    pub products: Vec<product::Model>,
    /// When the report was built
    pub generated_at: Option<DateTime<Utc>>,
}

impl LowStockReport {
    /// True when nothing needs restocking.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty() && self.products.is_empty()
    }
}

/// Lists the user's materials and products whose stock is at or below their
/// minimum-stock threshold, alphabetically.
pub async fn get_low_stock(db: &DatabaseConnection, user_id: &str) -> Result<LowStockReport> {
    let materials = Material::find()
        .filter(material::Column::UserId.eq(user_id))
        .filter(Expr::col(material::Column::Stock).lte(Expr::col(material::Column::MinStock)))
        .order_by_asc(material::Column::Name)
        .all(db)
        .await?;

    let products = Product::find()
        .filter(product::Column::UserId.eq(user_id))
        .filter(Expr::col(product::Column::Stock).lte(Expr::col(product::Column::MinStock)))
        .order_by_asc(product::Column::Name)
        .all(db)
        .await?;

    Ok(LowStockReport {
        materials,
        products,
        generated_at: Some(Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_adjust_stock_atomic_material_and_product() -> Result<()> {
        let db = setup_test_db().await?;
        let material = create_custom_material(&db, "alice", "Flour", dec!(10), dec!(2)).await?;
        let product = create_custom_product(&db, "alice", "Bread", dec!(3), dec!(5)).await?;

        adjust_stock_atomic(&db, StockTarget::Material(material.id), dec!(4.5)).await?;
        adjust_stock_atomic(&db, StockTarget::Product(product.id), dec!(-5)).await?;

        let material = load_target(&db, StockTarget::Material(material.id)).await?;
        let product = load_target(&db, StockTarget::Product(product.id)).await?;
        assert_eq!(material.stock, dec!(14.5));
        // No floor: stock may go negative
        assert_eq!(product.stock, dec!(-2));

        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_stock_missing_target() -> Result<()> {
        let db = setup_test_db().await?;
        let result = adjust_stock_atomic(&db, StockTarget::Material(404), dec!(1)).await;
        assert!(matches!(result, Err(Error::MaterialNotFound { id: 404 })));

        let result = set_price(&db, StockTarget::Product(405), dec!(1)).await;
        assert!(matches!(result, Err(Error::ProductNotFound { id: 405 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_load_owned_target_hides_other_users_stock() -> Result<()> {
        let db = setup_test_db().await?;
        let material = create_custom_material(&db, "alice", "Sugar", dec!(1), dec!(1)).await?;

        let result = load_owned_target(&db, "bob", StockTarget::Material(material.id)).await;
        assert!(matches!(result, Err(Error::MaterialNotFound { .. })));

        let state = load_owned_target(&db, "alice", StockTarget::Material(material.id)).await?;
        assert_eq!(state.snapshot().stock, dec!(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_record_movement_and_history() -> Result<()> {
        let db = setup_test_db().await?;
        let material = create_custom_material(&db, "alice", "Yeast", dec!(0), dec!(1)).await?;
        let target = StockTarget::Material(material.id);

        let first = record_movement(
            &db,
            NewMovement {
                user_id: "alice",
                target,
                movement_type: MovementType::In,
                quantity: dec!(3),
                description: "Purchase completed: INV-1".to_string(),
                reference: "INV-1".to_string(),
            },
        )
        .await?;
        let second = record_movement(
            &db,
            NewMovement {
                user_id: "alice",
                target,
                movement_type: MovementType::Out,
                quantity: dec!(1),
                description: "Purchase cancelled: INV-1".to_string(),
                reference: "INV-1".to_string(),
            },
        )
        .await?;

        assert_eq!(first.material_id, Some(material.id));
        assert_eq!(first.product_id, None);

        let history = get_stock_history(&db, "alice", target).await?;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], second);
        assert_eq!(history[1], first);

        let by_reference = get_stock_history_by_reference(&db, "alice", "INV-1").await?;
        assert_eq!(by_reference, vec![first, second]);
        Ok(())
    }

    #[tokio::test]
    async fn test_record_movement_rejects_non_positive_quantity() -> Result<()> {
        let db = setup_test_db().await?;
        let result = record_movement(
            &db,
            NewMovement {
                user_id: "alice",
                target: StockTarget::Material(1),
                movement_type: MovementType::Out,
                quantity: dec!(-1),
                description: String::new(),
                reference: String::new(),
            },
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidInput { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_get_low_stock() -> Result<()> {
        let db = setup_test_db().await?;
        let low = create_material_with_min(&db, "alice", "Butter", dec!(2), dec!(5)).await?;
        create_material_with_min(&db, "alice", "Salt", dec!(50), dec!(5)).await?;
        create_material_with_min(&db, "bob", "Eggs", dec!(0), dec!(5)).await?;

        let report = get_low_stock(&db, "alice").await?;
        assert_eq!(report.materials.len(), 1);
        assert_eq!(report.materials[0].id, low.id);
        assert!(report.products.is_empty());
        assert!(!report.is_empty());
        Ok(())
    }
}
