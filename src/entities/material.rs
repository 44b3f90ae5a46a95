//! Material entity - Represents raw materials consumed by production.
//!
//! Materials carry a running stock level and a current unit cost. Both are
//! mutated by purchase reconciliation: stock on completion/reversal, and price
//! when a purchase recomputes cost.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Material database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    /// Unique identifier for the material
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the material
    pub user_id: String,
    /// Name of the material (e.g., "Flour", "Packaging box")
    pub name: String,
    /// Unit of measure stock is counted in
    pub unit: String,
    /// Current stock level
    pub stock: Decimal,
    /// Current unit cost
    pub price: Decimal,
    /// Threshold at or below which the material is reported as low stock
    pub min_stock: Decimal,
    /// When the material was created
    pub created_at: DateTimeUtc,
    /// When the material was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Material and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One material appears on many purchase lines
    #[sea_orm(has_many = "super::purchase_item::Entity")]
    PurchaseItems,
    /// One material has many stock movements
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
