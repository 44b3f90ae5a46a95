//! Additional cost entity - Landed costs (shipping, handling) of a purchase.
//!
//! These never touch stock. They are apportioned per unit across all lines
//! when a completion recomputes weighted-average cost.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Additional cost database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "additional_costs")]
pub struct Model {
    /// Unique identifier for the cost
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning purchase
    pub purchase_id: i64,
    /// What the cost was for
    pub description: String,
    /// Cost amount
    pub amount: Decimal,
}

/// Defines relationships between `AdditionalCost` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each cost belongs to one purchase
    #[sea_orm(
        belongs_to = "super::purchase::Entity",
        from = "Column::PurchaseId",
        to = "super::purchase::Column::Id",
        on_delete = "Cascade"
    )]
    Purchase,
}

impl Related<super::purchase::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Purchase.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
