/// Database configuration and connection management
pub mod database;

/// Reconciler settings loading from stockbook.toml
pub mod settings;

pub use settings::{Config, ImportPriceMode, ReconcilerSettings};
