//! Core business logic, independent of the command-line front end.
//!
//! - [`pricing`]: pure money math
//! - [`stock`]: stock adjustments and the stock ledger
//! - [`inventory`]: materials and products
//! - [`purchase`]: drafts, creation and lookup
//! - [`reconciler`]: purchase status transitions and their stock effects
//! - [`import`]: bulk purchase import

pub mod import;
pub mod inventory;
pub mod pricing;
pub mod purchase;
pub mod reconciler;
pub mod stock;
