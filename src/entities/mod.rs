//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod additional_cost;
pub mod material;
pub mod product;
pub mod purchase;
pub mod purchase_item;
pub mod stock_history;

// Re-export specific types to avoid conflicts
pub use additional_cost::{
    Column as AdditionalCostColumn, Entity as AdditionalCost, Model as AdditionalCostModel,
};
pub use material::{Column as MaterialColumn, Entity as Material, Model as MaterialModel};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use purchase::{
    Column as PurchaseColumn, DiscountType, Entity as Purchase, Model as PurchaseModel, OrderType,
    PurchaseStatus,
};
pub use purchase_item::{
    Column as PurchaseItemColumn, Entity as PurchaseItem, ItemType, Model as PurchaseItemModel,
};
pub use stock_history::{
    Column as StockHistoryColumn, Entity as StockHistory, Model as StockHistoryModel,
    MovementType,
};
