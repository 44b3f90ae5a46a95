//! Purchase entity - A record of goods bought from a supplier.
//!
//! A purchase owns its line items and additional costs. Its `status` drives
//! stock reconciliation: entering `completed` credits stock, leaving it debits
//! stock again. `version` is bumped on every transition so that two concurrent
//! transitions of the same purchase cannot both apply their effects.

use crate::errors::Error;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Lifecycle state of a purchase
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    /// Ordered but not yet received; no stock effects
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Received; stock has been credited
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Abandoned; any earlier credit has been reversed
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl PurchaseStatus {
    /// Wire/storage spelling of the status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurchaseStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(Error::InvalidInput {
                message: format!(
                    "Unknown purchase status '{other}' (expected pending, completed or cancelled)"
                ),
            }),
        }
    }
}

/// How the purchase was placed
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Ordered through an online channel
    #[sea_orm(string_value = "online")]
    Online,
    /// Bought in person or by phone
    #[default]
    #[sea_orm(string_value = "offline")]
    Offline,
}

/// Interpretation of a discount value
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(12))")]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// Absolute amount subtracted
    #[default]
    #[sea_orm(string_value = "nominal")]
    Nominal,
    /// Percentage (0-100) of the discounted base
    #[sea_orm(string_value = "percentage")]
    Percentage,
}

/// Purchase database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchases")]
pub struct Model {
    /// Unique identifier for the purchase
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the purchase
    pub user_id: String,
    /// Invoice number, unique per user
    pub invoice_number: String,
    /// Supplier the goods were bought from
    pub supplier_name: Option<String>,
    /// Free-form external reference (supplier order number etc.)
    pub reference: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Online or offline order
    pub order_type: OrderType,
    /// Current lifecycle state
    pub status: PurchaseStatus,
    /// Purchase-level discount value
    pub discount: Decimal,
    /// How `discount` is interpreted
    pub discount_type: DiscountType,
    /// Sum of line totals
    pub subtotal: Decimal,
    /// Subtotal minus discount plus additional costs
    pub total: Decimal,
    /// Recompute weighted-average cost of targets on completion
    pub auto_update_price: bool,
    /// Optimistic concurrency counter, bumped on every transition
    pub version: i32,
    /// When the purchase was made (may be backdated)
    pub created_at: DateTimeUtc,
    /// When the purchase was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Purchase and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One purchase has many line items
    #[sea_orm(has_many = "super::purchase_item::Entity")]
    PurchaseItems,
    /// One purchase has many additional costs
    #[sea_orm(has_many = "super::additional_cost::Entity")]
    AdditionalCosts,
}

impl Related<super::purchase_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseItems.def()
    }
}

impl Related<super::additional_cost::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AdditionalCosts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Label used in ledger descriptions: the external reference when present,
    /// otherwise the invoice number.
    #[must_use]
    pub fn display_reference(&self) -> &str {
        self.reference
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(&self.invoice_number)
    }

    /// Value stored in the ledger `reference` column: the invoice number, or
    /// the purchase id if the invoice number is blank.
    #[must_use]
    pub fn ledger_reference(&self) -> String {
        if self.invoice_number.trim().is_empty() {
            self.id.to_string()
        } else {
            self.invoice_number.clone()
        }
    }
}
