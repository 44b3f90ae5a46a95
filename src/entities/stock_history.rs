//! Stock history entity - The append-only stock ledger.
//!
//! Every stock mutation writes exactly one row here. Rows are never updated or
//! deleted; `quantity` is always positive and `movement_type` carries the sign.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Direction of a stock movement
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(12))")]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    /// Stock added
    #[sea_orm(string_value = "in")]
    In,
    /// Stock removed
    #[sea_orm(string_value = "out")]
    Out,
    /// Manual correction
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
}

impl MovementType {
    /// Storage spelling of the movement type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
            Self::Adjustment => "adjustment",
        }
    }
}

/// Stock history database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_histories")]
pub struct Model {
    /// Unique identifier for the ledger row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the stock that moved
    pub user_id: String,
    /// Material that moved, exclusive with `product_id`
    pub material_id: Option<i64>,
    /// Product that moved, exclusive with `material_id`
    pub product_id: Option<i64>,
    /// Direction of the movement
    pub movement_type: MovementType,
    /// Quantity moved, always positive
    pub quantity: Decimal,
    /// Human-readable description (e.g. `"Purchase completed: INV-20240101-0001"`)
    pub description: String,
    /// Reference to the originating document, usually an invoice number
    pub reference: String,
    /// When the movement was recorded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `StockHistory` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::material::Entity",
        from = "Column::MaterialId",
        to = "super::material::Column::Id"
    )]
    Material,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Material.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
