//! Reconciler settings loading from `stockbook.toml` and the environment.
//!
//! The settings file is optional. A missing file yields the defaults
//! (permissive stock, direct-overwrite pricing for imports); a present but
//! malformed file is an error. `STOCKBOOK_STRICT_STOCK` overrides the file.

use crate::core::pricing::PriceStrategy;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

/// Default location of the settings file
pub const DEFAULT_CONFIG_PATH: &str = "stockbook.toml";

const STRICT_STOCK_ENV: &str = "STOCKBOOK_STRICT_STOCK";

/// Configuration structure representing the entire `stockbook.toml` file
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Purchase reconciliation behaviour
    #[serde(default)]
    pub reconciler: ReconcilerSettings,
}

/// Knobs for the purchase lifecycle reconciler
#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerSettings {
    /// Reject reversals that would drive stock below zero
    #[serde(default)]
    pub strict_stock: bool,
    /// Price strategy applied when bulk-importing completed purchases
    #[serde(default)]
    pub import_price_mode: ImportPriceMode,
}

/// Price handling for purchases created already completed by the import path
#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImportPriceMode {
    /// Overwrite the target price with the imported unit price
    #[default]
    Overwrite,
    /// Follow the purchase's `auto_update_price` flag like a normal completion
    Weighted,
}

impl ImportPriceMode {
    /// Resolves the concrete strategy for one imported purchase.
    #[must_use]
    pub const fn strategy(self, auto_update_price: bool) -> PriceStrategy {
        match self {
            Self::Overwrite => PriceStrategy::DirectOverwrite,
            Self::Weighted => PriceStrategy::for_completion(auto_update_price),
        }
    }
}

/// Loads settings from a TOML file and applies environment overrides.
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - An override variable holds something other than `true`/`false`
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    debug!(?path, "Loading settings");
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.display()),
    })?;

    let mut config = parse_config(&contents)?;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Loads settings from `./stockbook.toml`, falling back to defaults if the
/// file does not exist.
pub fn load_default_config() -> Result<Config> {
    if Path::new(DEFAULT_CONFIG_PATH).exists() {
        return load_config(DEFAULT_CONFIG_PATH);
    }
    warn!("{DEFAULT_CONFIG_PATH} not found, using default settings");
    let mut config = Config::default();
    apply_env_overrides(&mut config)?;
    Ok(config)
}

fn parse_config(contents: &str) -> Result<Config> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {DEFAULT_CONFIG_PATH}: {e}"),
    })
}

fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Ok(raw) = std::env::var(STRICT_STOCK_ENV) {
        config.reconciler.strict_stock = parse_bool(&raw).ok_or_else(|| Error::Config {
            message: format!("{STRICT_STOCK_ENV} must be true or false, got '{raw}'"),
        })?;
    }
    Ok(())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_reconciler_settings() {
        let toml_str = r#"
            [reconciler]
            strict_stock = true
            import_price_mode = "weighted"
        "#;

        let config = parse_config(toml_str).unwrap();
        assert!(config.reconciler.strict_stock);
        assert_eq!(config.reconciler.import_price_mode, ImportPriceMode::Weighted);
    }

    #[test]
    fn test_missing_section_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.reconciler, ReconcilerSettings::default());
        assert!(!config.reconciler.strict_stock);
        assert_eq!(config.reconciler.import_price_mode, ImportPriceMode::Overwrite);
    }

    #[test]
    fn test_invalid_price_mode_is_rejected() {
        let result = parse_config("[reconciler]\nimport_price_mode = \"fifo\"\n");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_import_mode_strategy() {
        assert_eq!(
            ImportPriceMode::Overwrite.strategy(true),
            PriceStrategy::DirectOverwrite
        );
        assert_eq!(
            ImportPriceMode::Weighted.strategy(true),
            PriceStrategy::WeightedAverage
        );
        assert_eq!(ImportPriceMode::Weighted.strategy(false), PriceStrategy::Keep);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool(" TRUE "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
