//! Bulk purchase import.
//!
//! Each draft is written in its own transaction, so one bad row does not
//! undo the rows before it. Completed drafts take the price strategy from
//! [`ReconcilerSettings::import_price_mode`] rather than the interactive rule.

use crate::{
    config::ReconcilerSettings,
    core::{
        purchase::{self, PurchaseDraft},
        reconciler,
    },
    entities::PurchaseStatus,
    errors::{ErrorKind, Result},
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::path::Path;
use tracing::{info, instrument, warn};

/// A draft that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFailure {
    /// Zero-based position in the input
    pub index: usize,
    /// Why the draft was rejected
    pub message: String,
}

/// Outcome of an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Ids of the purchases created, in input order
    pub imported: Vec<i64>,
    /// Drafts that were skipped
    pub failed: Vec<ImportFailure>,
}

impl ImportReport {
    /// True when every draft was imported.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Parses a JSON array of purchase drafts.
///
/// # Errors
/// Returns `Json` if the document is not an array of drafts.
pub fn parse_drafts(json: &str) -> Result<Vec<PurchaseDraft>> {
    Ok(serde_json::from_str(json)?)
}

/// Reads and parses a JSON file of purchase drafts.
///
/// # Errors
/// Returns `Io` if the file cannot be read and `Json` if it cannot be parsed.
pub fn read_drafts(path: impl AsRef<Path>) -> Result<Vec<PurchaseDraft>> {
    let content = std::fs::read_to_string(path)?;
    parse_drafts(&content)
}

/// Imports `drafts` for `user_id`, collecting per-draft failures instead of
/// stopping at the first one.
///
/// # Errors
/// Only fails on errors of kind [`ErrorKind::Internal`], which would fail every
/// remaining draft too. Everything else is reported in [`ImportReport::failed`].
#[instrument(skip(db, settings, drafts), fields(count = drafts.len()))]
pub async fn import_purchases(
    db: &DatabaseConnection,
    settings: &ReconcilerSettings,
    drafts: Vec<PurchaseDraft>,
    user_id: &str,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for (index, draft) in drafts.into_iter().enumerate() {
        let outcome = if draft.status == PurchaseStatus::Completed {
            let strategy = settings
                .import_price_mode
                .strategy(draft.auto_update_price);
            reconciler::complete_purchase_creation(db, &draft, user_id, strategy).await
        } else {
            purchase::create_purchase(db, &draft, user_id).await
        };

        match outcome {
            Ok(details) => report.imported.push(details.purchase.id),
            Err(err) if err.kind() == ErrorKind::Internal => return Err(err),
            Err(err) => {
                warn!(index, "Skipping purchase: {err}");
                report.failed.push(ImportFailure {
                    index,
                    message: err.to_string(),
                });
            }
        }
    }

    info!(
        imported = report.imported.len(),
        failed = report.failed.len(),
        "Import finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{config::ImportPriceMode, errors::Error, core::stock::{self, StockTarget}, test_utils::*};
    use rust_decimal_macros::dec;

    const DRAFTS: &str = r#"[
        {
            "invoice_number": "SUP-1",
            "status": "completed",
            "auto_update_price": true,
            "items": [
                { "item_type": "material", "material_id": 1, "quantity": "5", "price": "200" }
            ]
        },
        {
            "status": "completed",
            "items": [
                { "item_type": "material", "material_id": 999, "quantity": "1", "price": "1" }
            ]
        },
        {
            "supplier_name": "Mill",
            "items": [
                { "item_type": "material", "material_id": 1, "quantity": "2", "price": "90" }
            ]
        }
    ]"#;

    #[test]
    fn test_parse_drafts() {
        let drafts = parse_drafts(DRAFTS).unwrap();
        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[0].status, PurchaseStatus::Completed);
        assert_eq!(drafts[0].items[0].quantity, dec!(5));
        assert_eq!(drafts[2].status, PurchaseStatus::Pending);
        assert_eq!(drafts[2].items[0].unit, "pcs");

        assert!(matches!(parse_drafts("{}"), Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn test_import_collects_failures_and_overwrites_price() -> Result<()> {
        let (db, material) = setup_with_material().await?;
        assert_eq!(material.id, 1);

        let report = import_purchases(
            &db,
            &ReconcilerSettings::default(),
            parse_drafts(DRAFTS)?,
            "alice",
        )
        .await?;

        assert_eq!(report.imported.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 1);
        assert!(report.failed[0].message.contains("Material not found"));
        assert!(!report.is_clean());

        // Only the completed draft moved stock; overwrite mode took its price
        let material = load_material(&db, material.id).await?;
        assert_eq!(material.stock, dec!(15));
        assert_eq!(material.price, dec!(200));

        let history =
            stock::get_stock_history(&db, "alice", StockTarget::Material(material.id)).await?;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reference, "SUP-1");
        Ok(())
    }

    #[tokio::test]
    async fn test_import_reports_overflowing_amounts() -> Result<()> {
        let (db, material) = setup_with_material().await?;
        let drafts = parse_drafts(
            r#"[
                {
                    "status": "completed",
                    "items": [
                        { "item_type": "material", "material_id": 1,
                          "quantity": "79228162514264337593543950335", "price": "2" }
                    ]
                },
                {
                    "items": [
                        { "item_type": "material", "material_id": 1, "quantity": "1", "price": "3" }
                    ]
                }
            ]"#,
        )?;

        let report =
            import_purchases(&db, &ReconcilerSettings::default(), drafts, "alice").await?;
        assert_eq!(report.imported.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 0);
        assert!(report.failed[0].message.contains("too large"));
        assert_eq!(load_material(&db, material.id).await?.stock, dec!(10));
        Ok(())
    }

    #[tokio::test]
    async fn test_import_weighted_mode() -> Result<()> {
        let (db, material) = setup_with_material().await?;
        let settings = ReconcilerSettings {
            import_price_mode: ImportPriceMode::Weighted,
            ..ReconcilerSettings::default()
        };

        let mut drafts = parse_drafts(DRAFTS)?;
        drafts.truncate(1);
        let report = import_purchases(&db, &settings, drafts, "alice").await?;
        assert!(report.is_clean());

        let material = load_material(&db, material.id).await?;
        assert_eq!(material.stock, dec!(15));
        assert_eq!(material.price.round_dp(2), dec!(133.33));
        Ok(())
    }
}
