//! Purchase item entity - One line within a purchase.
//!
//! A line references exactly one material or one product, selected by
//! `item_type`. Lines are immutable once written; only the owning purchase's
//! status changes.

use super::purchase::DiscountType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of stock a line replenishes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// Line replenishes a material
    #[sea_orm(string_value = "material")]
    Material,
    /// Line replenishes a product
    #[sea_orm(string_value = "product")]
    Product,
}

/// Purchase item database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_items")]
pub struct Model {
    /// Unique identifier for the line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning purchase
    pub purchase_id: i64,
    /// Whether this line references a material or a product
    pub item_type: ItemType,
    /// Referenced material, set iff `item_type` is material
    pub material_id: Option<i64>,
    /// Referenced product, set iff `item_type` is product
    pub product_id: Option<i64>,
    /// Quantity bought, always positive
    pub quantity: Decimal,
    /// Unit of measure
    pub unit: String,
    /// Unit price before discount
    pub price: Decimal,
    /// Line discount value
    pub discount: Decimal,
    /// How `discount` is interpreted
    pub discount_type: DiscountType,
    /// `quantity * price` minus discount
    pub total_price: Decimal,
}

/// Defines relationships between `PurchaseItem` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line belongs to one purchase
    #[sea_orm(
        belongs_to = "super::purchase::Entity",
        from = "Column::PurchaseId",
        to = "super::purchase::Column::Id",
        on_delete = "Cascade"
    )]
    Purchase,
    /// Material referenced by the line
    #[sea_orm(
        belongs_to = "super::material::Entity",
        from = "Column::MaterialId",
        to = "super::material::Column::Id"
    )]
    Material,
    /// Product referenced by the line
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::purchase::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Purchase.def()
    }
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
