//! Purchase business logic - drafts, invoice numbers, creation and lookup.
//!
//! A purchase is written together with its items and additional costs in one
//! transaction. Creating a purchase that is already `completed` is routed to
//! [`reconciler::complete_purchase_creation`] so it gets the same stock and
//! ledger effects as a later status change would.

use crate::{
    core::{
        pricing::{self, PriceStrategy, PricedLine, Totals},
        reconciler,
        stock::{self, StockTarget},
    },
    entities::{
        AdditionalCost, DiscountType, ItemType, OrderType, Purchase, PurchaseItem,
        PurchaseStatus, additional_cost, purchase, purchase_item,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// One line of a purchase that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PurchaseItemDraft {
    /// Whether the line buys a material or a product
    pub item_type: ItemType,
    /// Set for material lines
    #[serde(default)]
    pub material_id: Option<i64>,
    /// Set for product lines
    #[serde(default)]
    pub product_id: Option<i64>,
    /// Units bought, positive
    pub quantity: Decimal,
    /// Unit of measure
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Unit price before discount
    pub price: Decimal,
    /// Line discount value
    #[serde(default)]
    pub discount: Decimal,
    /// How `discount` is interpreted
    #[serde(default)]
    pub discount_type: DiscountType,
}

fn default_unit() -> String {
    "pcs".to_string()
}

impl PurchaseItemDraft {
    /// Line buying `quantity` of a material at `price` per unit.
    #[must_use]
    pub fn material(material_id: i64, quantity: Decimal, price: Decimal) -> Self {
        Self {
            item_type: ItemType::Material,
            material_id: Some(material_id),
            product_id: None,
            quantity,
            unit: default_unit(),
            price,
            discount: Decimal::ZERO,
            discount_type: DiscountType::Nominal,
        }
    }

    /// Line buying `quantity` of a product at `price` per unit.
    #[must_use]
    pub fn product(product_id: i64, quantity: Decimal, price: Decimal) -> Self {
        Self {
            item_type: ItemType::Product,
            material_id: None,
            product_id: Some(product_id),
            quantity,
            unit: default_unit(),
            price,
            discount: Decimal::ZERO,
            discount_type: DiscountType::Nominal,
        }
    }

    /// The material or product this line replenishes.
    pub fn target(&self) -> Result<StockTarget> {
        resolve_target(self.item_type, self.material_id, self.product_id)
    }

    fn total(&self) -> Option<Decimal> {
        pricing::line_total(self.quantity, self.price, self.discount, self.discount_type)
    }
}

/// A landed cost that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdditionalCostDraft {
    /// What the cost was for, e.g. `Shipping`
    pub description: String,
    /// Cost amount, non-negative
    pub amount: Decimal,
}

/// A purchase that has not been stored yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PurchaseDraft {
    /// Generated as `INV-YYYYMMDD-NNNN` when absent
    pub invoice_number: Option<String>,
    /// Supplier the goods come from
    pub supplier_name: Option<String>,
    /// External reference shown in ledger descriptions
    pub reference: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Online or offline order
    pub order_type: OrderType,
    /// Initial status; `completed` applies stock effects immediately
    pub status: PurchaseStatus,
    /// Purchase-level discount value
    pub discount: Decimal,
    /// How `discount` is interpreted
    pub discount_type: DiscountType,
    /// Recompute weighted-average cost on completion
    pub auto_update_price: bool,
    /// Backdated creation time; defaults to now
    pub created_at: Option<DateTime<Utc>>,
    /// Lines; at least one
    pub items: Vec<PurchaseItemDraft>,
    /// Landed costs spread over every purchased unit
    pub additional_costs: Vec<AdditionalCostDraft>,
}

impl PurchaseDraft {
    /// Checks everything that can be checked without storage.
    ///
    /// # Errors
    /// Returns `InvalidInput` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(invalid("A purchase needs at least one item"));
        }
        if let Some(invoice) = &self.invoice_number {
            if invoice.trim().is_empty() {
                return Err(invalid("Invoice number cannot be blank"));
            }
        }
        validate_discount(self.discount, self.discount_type, "Purchase")?;

        for (index, item) in self.items.iter().enumerate() {
            let line = index + 1;
            item.target()
                .map_err(|e| invalid(&format!("Item {line}: {e}")))?;
            if item.quantity <= Decimal::ZERO {
                return Err(invalid(&format!(
                    "Item {line}: quantity must be positive, got {}",
                    item.quantity
                )));
            }
            if item.price < Decimal::ZERO {
                return Err(invalid(&format!(
                    "Item {line}: price cannot be negative, got {}",
                    item.price
                )));
            }
            validate_discount(item.discount, item.discount_type, &format!("Item {line}"))?;
        }

        if let Some(cost) = self.additional_costs.iter().find(|c| c.amount < Decimal::ZERO) {
            return Err(invalid(&format!(
                "Additional cost '{}' cannot be negative",
                cost.description
            )));
        }
        self.totals()?;
        Ok(())
    }

    /// Line totals in line order, plus subtotal and total.
    ///
    /// # Errors
    /// Returns `InvalidInput` if any amount overflows.
    pub fn totals(&self) -> Result<(Vec<Decimal>, Totals)> {
        let mut line_totals = Vec::with_capacity(self.items.len());
        for (index, item) in self.items.iter().enumerate() {
            let total = item
                .total()
                .ok_or_else(|| invalid(&format!("Item {}: amount is too large", index + 1)))?;
            line_totals.push(total);
        }
        let cost_amounts: Vec<Decimal> = self.additional_costs.iter().map(|c| c.amount).collect();
        let totals = pricing::purchase_totals(
            &line_totals,
            self.discount,
            self.discount_type,
            &cost_amounts,
        )
        .ok_or_else(|| invalid("Purchase total is too large"))?;
        Ok((line_totals, totals))
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidInput {
        message: message.to_string(),
    }
}

fn validate_discount(value: Decimal, kind: DiscountType, what: &str) -> Result<()> {
    if value < Decimal::ZERO {
        return Err(invalid(&format!("{what}: discount cannot be negative")));
    }
    if kind == DiscountType::Percentage && value > Decimal::ONE_HUNDRED {
        return Err(invalid(&format!(
            "{what}: percentage discount cannot exceed 100"
        )));
    }
    Ok(())
}

/// Maps a line's type and references to its target, enforcing that exactly
/// the reference matching the type is set.
pub fn resolve_target(
    item_type: ItemType,
    material_id: Option<i64>,
    product_id: Option<i64>,
) -> Result<StockTarget> {
    match (item_type, material_id, product_id) {
        (ItemType::Material, Some(id), None) => Ok(StockTarget::Material(id)),
        (ItemType::Product, None, Some(id)) => Ok(StockTarget::Product(id)),
        _ => Err(Error::InvalidInput {
            message: format!(
                "A {} line must reference exactly one {0} (material_id: {material_id:?}, product_id: {product_id:?})",
                item_type.to_value()
            ),
        }),
    }
}

/// Target of a stored line.
pub fn item_target(item: &purchase_item::Model) -> Result<StockTarget> {
    resolve_target(item.item_type, item.material_id, item.product_id)
}

/// A purchase together with its lines and landed costs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseDetails {
    /// The purchase row
    pub purchase: purchase::Model,
    /// Lines in insertion order
    pub items: Vec<purchase_item::Model>,
    /// Landed costs in insertion order
    pub additional_costs: Vec<additional_cost::Model>,
}

impl PurchaseDetails {
    /// Landed cost amounts.
    #[must_use]
    pub fn additional_cost_amounts(&self) -> Vec<Decimal> {
        self.additional_costs.iter().map(|c| c.amount).collect()
    }

    /// Quantity and unit price of every line, in line order.
    #[must_use]
    pub fn priced_lines(&self) -> Vec<PricedLine> {
        self.items
            .iter()
            .map(|i| PricedLine {
                quantity: i.quantity,
                price: i.price,
            })
            .collect()
    }
}

/// Loads a purchase with its lines (in insertion order) and costs.
///
/// # Errors
/// Returns `PurchaseNotFound` if no purchase has this id.
pub async fn load_purchase<C>(db: &C, purchase_id: i64) -> Result<PurchaseDetails>
where
    C: ConnectionTrait,
{
    let purchase = Purchase::find_by_id(purchase_id)
        .one(db)
        .await?
        .ok_or(Error::PurchaseNotFound { id: purchase_id })?;

    let items = PurchaseItem::find()
        .filter(purchase_item::Column::PurchaseId.eq(purchase_id))
        .order_by_asc(purchase_item::Column::Id)
        .all(db)
        .await?;

    let additional_costs = AdditionalCost::find()
        .filter(additional_cost::Column::PurchaseId.eq(purchase_id))
        .order_by_asc(additional_cost::Column::Id)
        .all(db)
        .await?;

    Ok(PurchaseDetails {
        purchase,
        items,
        additional_costs,
    })
}

/// Loads a purchase and checks that `user_id` owns it.
///
/// # Errors
/// Returns `PurchaseNotFound` or `Forbidden`.
pub async fn load_owned_purchase<C>(db: &C, purchase_id: i64, user_id: &str) -> Result<PurchaseDetails>
where
    C: ConnectionTrait,
{
    let details = load_purchase(db, purchase_id).await?;
    if details.purchase.user_id != user_id {
        return Err(Error::Forbidden {
            user_id: user_id.to_string(),
            purchase_id,
        });
    }
    Ok(details)
}

/// Retrieves a purchase owned by `user_id`.
pub async fn get_purchase(
    db: &DatabaseConnection,
    purchase_id: i64,
    user_id: &str,
) -> Result<PurchaseDetails> {
    load_owned_purchase(db, purchase_id, user_id).await
}

/// All of a user's purchases, newest first.
pub async fn list_purchases(db: &DatabaseConnection, user_id: &str) -> Result<Vec<purchase::Model>> {
    Purchase::find()
        .filter(purchase::Column::UserId.eq(user_id))
        .order_by_desc(purchase::Column::CreatedAt)
        .order_by_desc(purchase::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn invoice_exists<C>(db: &C, user_id: &str, invoice_number: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    let count = Purchase::find()
        .filter(purchase::Column::UserId.eq(user_id))
        .filter(purchase::Column::InvoiceNumber.eq(invoice_number))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Next free invoice number of the form `INV-YYYYMMDD-NNNN` for `date`.
///
/// The sequence is per user and per day.
pub async fn generate_invoice_number<C>(db: &C, user_id: &str, date: NaiveDate) -> Result<String>
where
    C: ConnectionTrait,
{
    let prefix = format!("INV-{}-", date.format("%Y%m%d"));
    let existing = Purchase::find()
        .filter(purchase::Column::UserId.eq(user_id))
        .filter(purchase::Column::InvoiceNumber.starts_with(&prefix))
        .count(db)
        .await?;

    let mut sequence = existing + 1;
    loop {
        let candidate = format!("{prefix}{sequence:04}");
        if !invoice_exists(db, user_id, &candidate).await? {
            return Ok(candidate);
        }
        sequence += 1;
    }
}

/// Writes a validated draft with the given status. No stock effects.
///
/// Every referenced material/product must exist and belong to `user_id`.
/// Runs on the caller's connection or transaction.
pub(crate) async fn insert_purchase<C>(
    db: &C,
    user_id: &str,
    draft: &PurchaseDraft,
    status: PurchaseStatus,
) -> Result<PurchaseDetails>
where
    C: ConnectionTrait,
{
    for item in &draft.items {
        stock::load_owned_target(db, user_id, item.target()?).await?;
    }

    let created_at = draft.created_at.unwrap_or_else(Utc::now);
    let invoice_number = match &draft.invoice_number {
        Some(invoice) => {
            let invoice = invoice.trim().to_string();
            if invoice_exists(db, user_id, &invoice).await? {
                return Err(Error::InvalidInput {
                    message: format!("Invoice number {invoice} is already in use"),
                });
            }
            invoice
        }
        None => generate_invoice_number(db, user_id, created_at.date_naive()).await?,
    };

    let (line_totals, totals) = draft.totals()?;

    let purchase = purchase::ActiveModel {
        user_id: Set(user_id.to_string()),
        invoice_number: Set(invoice_number),
        supplier_name: Set(draft.supplier_name.clone()),
        reference: Set(draft.reference.clone()),
        notes: Set(draft.notes.clone()),
        order_type: Set(draft.order_type),
        status: Set(status),
        discount: Set(draft.discount),
        discount_type: Set(draft.discount_type),
        subtotal: Set(totals.subtotal),
        total: Set(totals.total),
        auto_update_price: Set(draft.auto_update_price),
        version: Set(0),
        created_at: Set(created_at),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let mut items = Vec::with_capacity(draft.items.len());
    for (item, total_price) in draft.items.iter().zip(line_totals) {
        let stored = purchase_item::ActiveModel {
            purchase_id: Set(purchase.id),
            item_type: Set(item.item_type),
            material_id: Set(item.material_id),
            product_id: Set(item.product_id),
            quantity: Set(item.quantity),
            unit: Set(item.unit.clone()),
            price: Set(item.price),
            discount: Set(item.discount),
            discount_type: Set(item.discount_type),
            total_price: Set(total_price),
            ..Default::default()
        }
        .insert(db)
        .await?;
        items.push(stored);
    }

    let mut additional_costs = Vec::with_capacity(draft.additional_costs.len());
    for cost in &draft.additional_costs {
        let stored = additional_cost::ActiveModel {
            purchase_id: Set(purchase.id),
            description: Set(cost.description.clone()),
            amount: Set(cost.amount),
            ..Default::default()
        }
        .insert(db)
        .await?;
        additional_costs.push(stored);
    }

    Ok(PurchaseDetails {
        purchase,
        items,
        additional_costs,
    })
}

/// Creates a purchase from a draft.
///
/// Drafts with status `completed` are created and completed atomically, with
/// the price strategy chosen by the draft's `auto_update_price` flag. Other
/// statuses are stored without stock effects.
///
/// # Errors
/// Returns `InvalidInput` for a malformed draft or duplicate invoice number,
/// `MaterialNotFound`/`ProductNotFound` for unknown or foreign targets, and
/// `TransactionFailed` if storage fails.
#[instrument(skip(db, draft), fields(items = draft.items.len(), status = %draft.status))]
pub async fn create_purchase(
    db: &DatabaseConnection,
    draft: &PurchaseDraft,
    user_id: &str,
) -> Result<PurchaseDetails> {
    if draft.status == PurchaseStatus::Completed {
        return reconciler::complete_purchase_creation(
            db,
            draft,
            user_id,
            PriceStrategy::for_completion(draft.auto_update_price),
        )
        .await;
    }

    draft.validate()?;
    let txn = db.begin().await.map_err(Error::transaction)?;
    let outcome = insert_purchase(&txn, user_id, draft, draft.status).await;
    let details = reconciler::finish_transaction(txn, outcome).await?;

    info!(
        purchase_id = details.purchase.id,
        invoice = %details.purchase.invoice_number,
        "Purchase created"
    );
    Ok(details)
}
