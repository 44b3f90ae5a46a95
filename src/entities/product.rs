//! Product entity - Represents finished goods held for sale.
//!
//! Products can be bought in directly through a purchase, in which case they
//! follow the same stock and cost rules as materials.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the product
    pub user_id: String,
    /// Name of the product
    pub name: String,
    /// Current stock level
    pub stock: Decimal,
    /// Current unit cost
    pub price: Decimal,
    /// Threshold at or below which the product is reported as low stock
    pub min_stock: Decimal,
    /// When the product was created
    pub created_at: DateTimeUtc,
    /// When the product was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One product appears on many purchase lines
    #[sea_orm(has_many = "super::purchase_item::Entity")]
    PurchaseItems,
    /// One product has many stock movements
    #[sea_orm(has_many = "super::stock_history::Entity")]
    StockHistories,
}

impl Related<super::purchase_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseItems.def()
    }
}

impl Related<super::stock_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockHistories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
