//! Purchase lifecycle reconciler - the only code that moves stock for purchases.
//!
//! Every entry point runs in exactly one database transaction. Within it the
//! purchase row is claimed (status written and `version` bumped with a
//! compare-and-set), then stock, price and ledger effects are applied. Any
//! failure rolls the whole unit back: status, stock, price and ledger rows are
//! left exactly as they were.
//!
//! | from \ to   | pending     | completed  | cancelled   |
//! |-------------|-------------|------------|-------------|
//! | pending     | no-op       | completion | status only |
//! | completed   | rejected    | no-op      | reversal    |
//! | cancelled   | status only | completion | no-op       |
//!
//! Completion credits stock and, depending on the [`PriceStrategy`], rewrites
//! unit prices. Reversal debits stock; prices are never reverted. A completed
//! purchase only leaves `completed` through a reversal, so its lines are
//! credited at most once per completion.

use crate::{
    config::ReconcilerSettings,
    core::{
        pricing::{self, PriceStrategy, PricedLine, StockSnapshot},
        purchase::{self, PurchaseDetails, PurchaseDraft, item_target},
        stock::{self, NewMovement, StockTarget},
    },
    entities::{
        AdditionalCost, MovementType, Purchase, PurchaseItem, PurchaseStatus, additional_cost,
        purchase as purchase_entity, purchase_item, stock_history,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveEnum, DatabaseTransaction, TransactionTrait, prelude::*, sea_query::Expr,
};
use tracing::{debug, info, instrument, warn};

/// Effect class of a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Requested status equals the current one; nothing is written
    Unchanged,
    /// Status changes, stock does not
    StatusOnly,
    /// Entering `completed`: credit stock, maybe reprice
    Complete,
    /// Leaving `completed`: debit stock
    Reverse,
}

/// Classifies `from -> to`.
///
/// # Errors
/// Returns `InvalidInput` for `completed -> pending`: the stock would stay
/// credited and a later completion would credit it again.
pub fn plan_transition(from: PurchaseStatus, to: PurchaseStatus) -> Result<Transition> {
    use PurchaseStatus::{Cancelled, Completed, Pending};

    match (from, to) {
        (Pending, Pending) | (Completed, Completed) | (Cancelled, Cancelled) => {
            Ok(Transition::Unchanged)
        }
        (_, Completed) => Ok(Transition::Complete),
        (Completed, Cancelled) => Ok(Transition::Reverse),
        (Completed, Pending) => Err(Error::InvalidInput {
            message: "A completed purchase cannot go back to pending; cancel it instead"
                .to_string(),
        }),
        (Cancelled, Pending) | (Pending, Cancelled) => Ok(Transition::StatusOnly),
    }
}

/// Why stock is being taken back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReversalCause {
    /// Status moved to `cancelled`
    Cancelled,
    /// Purchase is being deleted
    Deleted,
}

impl ReversalCause {
    const fn label(self) -> &'static str {
        match self {
            Self::Cancelled => "Purchase cancelled",
            Self::Deleted => "Purchase deleted",
        }
    }
}

/// Commits `txn` if `outcome` succeeded, otherwise rolls it back and
/// re-labels storage errors as [`Error::TransactionFailed`].
pub(crate) async fn finish_transaction<T>(txn: DatabaseTransaction, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            txn.commit().await.map_err(Error::transaction)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                warn!("Rollback failed after {err}: {rollback_err}");
            }
            Err(err.within_transaction())
        }
    }
}

/// Moves a purchase to `requested_status`, applying stock, price and ledger
/// effects atomically.
///
/// Requesting the current status again is a no-op, so retried completions never
/// credit stock twice.
///
/// # Errors
/// - `InvalidInput` if `requested_status` is not a known status, or the
///   purchase is completed and `pending` is requested
/// - `PurchaseNotFound` / `Forbidden` if the purchase is missing or foreign
/// - `MaterialNotFound` / `ProductNotFound` if a line's target is gone
/// - `InsufficientStock` if strict mode rejects a reversal
/// - `TransactionFailed` on storage errors or a concurrent transition
#[instrument(skip(db, settings))]
pub async fn set_purchase_status(
    db: &DatabaseConnection,
    settings: &ReconcilerSettings,
    purchase_id: i64,
    requested_status: &str,
    user_id: &str,
) -> Result<PurchaseDetails> {
    let requested: PurchaseStatus = requested_status.parse()?;

    let txn = db.begin().await.map_err(Error::transaction)?;
    let outcome = transition_within(&txn, settings, purchase_id, requested, user_id).await;
    finish_transaction(txn, outcome).await
}

async fn transition_within(
    txn: &DatabaseTransaction,
    settings: &ReconcilerSettings,
    purchase_id: i64,
    requested: PurchaseStatus,
    user_id: &str,
) -> Result<PurchaseDetails> {
    let details = purchase::load_owned_purchase(txn, purchase_id, user_id).await?;
    let current = details.purchase.status;
    let transition = plan_transition(current, requested)?;

    if transition == Transition::Unchanged {
        debug!(purchase_id, status = %current, "Status unchanged, nothing to apply");
        return Ok(details);
    }

    claim_purchase(txn, &details.purchase, requested).await?;

    match transition {
        Transition::Complete => {
            let strategy = PriceStrategy::for_completion(details.purchase.auto_update_price);
            apply_completion(txn, &details, strategy).await?;
        }
        Transition::Reverse => {
            apply_reversal(txn, settings, &details, ReversalCause::Cancelled).await?;
        }
        Transition::StatusOnly | Transition::Unchanged => {}
    }

    info!(
        purchase_id,
        from = %current,
        to = %requested,
        items = details.items.len(),
        "Purchase status changed"
    );
    purchase::load_purchase(txn, purchase_id).await
}

/// Creates a purchase that is already `completed`, applying the same effects
/// as completing it later would.
///
/// The draft's own `status` is ignored. `strategy` is chosen by the caller:
/// interactive creation follows `auto_update_price`, bulk import uses the
/// configured import mode.
///
/// # Errors
/// Returns `InvalidInput` for a malformed draft,
/// `MaterialNotFound`/`ProductNotFound` for unknown targets and
/// `TransactionFailed` on storage errors.
#[instrument(skip(db, draft), fields(items = draft.items.len()))]
pub async fn complete_purchase_creation(
    db: &DatabaseConnection,
    draft: &PurchaseDraft,
    user_id: &str,
    strategy: PriceStrategy,
) -> Result<PurchaseDetails> {
    draft.validate()?;

    let txn = db.begin().await.map_err(Error::transaction)?;
    let outcome = create_completed_within(&txn, draft, user_id, strategy).await;
    let details = finish_transaction(txn, outcome).await?;

    info!(
        purchase_id = details.purchase.id,
        invoice = %details.purchase.invoice_number,
        ?strategy,
        "Purchase created as completed"
    );
    Ok(details)
}

async fn create_completed_within(
    txn: &DatabaseTransaction,
    draft: &PurchaseDraft,
    user_id: &str,
    strategy: PriceStrategy,
) -> Result<PurchaseDetails> {
    let details =
        purchase::insert_purchase(txn, user_id, draft, PurchaseStatus::Completed).await?;
    apply_completion(txn, &details, strategy).await?;
    Ok(details)
}

/// Deletes a purchase with its lines and costs. A completed purchase has its
/// stock taken back out first, in the same transaction.
///
/// # Errors
/// Same as [`set_purchase_status`], minus the status validation.
#[instrument(skip(db, settings))]
pub async fn delete_purchase(
    db: &DatabaseConnection,
    settings: &ReconcilerSettings,
    purchase_id: i64,
    user_id: &str,
) -> Result<()> {
    let txn = db.begin().await.map_err(Error::transaction)?;
    let outcome = delete_within(&txn, settings, purchase_id, user_id).await;
    finish_transaction(txn, outcome).await
}

async fn delete_within(
    txn: &DatabaseTransaction,
    settings: &ReconcilerSettings,
    purchase_id: i64,
    user_id: &str,
) -> Result<()> {
    let details = purchase::load_owned_purchase(txn, purchase_id, user_id).await?;
    claim_purchase(txn, &details.purchase, details.purchase.status).await?;

    let reversed = details.purchase.status == PurchaseStatus::Completed;
    if reversed {
        apply_reversal(txn, settings, &details, ReversalCause::Deleted).await?;
    }

    AdditionalCost::delete_many()
        .filter(additional_cost::Column::PurchaseId.eq(purchase_id))
        .exec(txn)
        .await?;
    PurchaseItem::delete_many()
        .filter(purchase_item::Column::PurchaseId.eq(purchase_id))
        .exec(txn)
        .await?;
    Purchase::delete_by_id(purchase_id).exec(txn).await?;

    info!(purchase_id, reversed, "Purchase deleted");
    Ok(())
}

/// Writes `status` and bumps `version`, provided nobody else has transitioned
/// the purchase since it was loaded.
async fn claim_purchase<C>(
    db: &C,
    purchase: &purchase_entity::Model,
    status: PurchaseStatus,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Purchase::update_many()
        .col_expr(purchase_entity::Column::Status, Expr::value(status.to_value()))
        .col_expr(
            purchase_entity::Column::Version,
            Expr::col(purchase_entity::Column::Version).add(1),
        )
        .col_expr(purchase_entity::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(purchase_entity::Column::Id.eq(purchase.id))
        .filter(purchase_entity::Column::Version.eq(purchase.version))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::TransactionFailed {
            message: format!(
                "Purchase {} was modified concurrently (expected version {})",
                purchase.id, purchase.version
            ),
        });
    }
    Ok(())
}

/// Lines of one purchase that share a target, with the target's state before
/// this completion touched it.
struct TargetGroup {
    target: StockTarget,
    before: StockSnapshot,
    lines: Vec<PricedLine>,
}

/// Credits stock for every line, writes one `in` ledger row per line, then
/// reprices each distinct target according to `strategy`.
///
/// Snapshots are taken before the first increment so the weighted average is
/// computed from pre-purchase stock.
async fn apply_completion<C>(
    db: &C,
    details: &PurchaseDetails,
    strategy: PriceStrategy,
) -> Result<Vec<stock_history::Model>>
where
    C: ConnectionTrait,
{
    let purchase = &details.purchase;

    let mut groups: Vec<TargetGroup> = Vec::new();
    for item in &details.items {
        let target = item_target(item)?;
        let line = PricedLine {
            quantity: item.quantity,
            price: item.price,
        };
        if let Some(group) = groups.iter_mut().find(|g| g.target == target) {
            group.lines.push(line);
            continue;
        }
        let state = stock::load_owned_target(db, &purchase.user_id, target).await?;
        groups.push(TargetGroup {
            target,
            before: state.snapshot(),
            lines: vec![line],
        });
    }

    let reference = purchase.ledger_reference();
    let description = format!("Purchase completed: {}", purchase.display_reference());
    let mut ledger = Vec::with_capacity(details.items.len());
    for item in &details.items {
        let target = item_target(item)?;
        stock::adjust_stock_atomic(db, target, item.quantity).await?;
        let row = stock::record_movement(
            db,
            NewMovement {
                user_id: &purchase.user_id,
                target,
                movement_type: MovementType::In,
                quantity: item.quantity,
                description: description.clone(),
                reference: reference.clone(),
            },
        )
        .await?;
        ledger.push(row);
    }

    if strategy != PriceStrategy::Keep {
        let per_unit = pricing::additional_cost_per_unit(
            &details.additional_cost_amounts(),
            &details.priced_lines(),
        );
        if per_unit.is_none() && strategy == PriceStrategy::WeightedAverage {
            debug!(purchase_id = purchase.id, "No purchased quantity, prices unchanged");
        }
        for group in &groups {
            match pricing::resolve_price(strategy, group.before, &group.lines, per_unit) {
                Some(price) => {
                    stock::set_price(db, group.target, price).await?;
                    debug!(item = %group.target, old = %group.before.price, new = %price, "Repriced");
                }
                None => debug!(item = %group.target, "Price left unchanged"),
            }
        }
    }

    Ok(ledger)
}

/// Debits stock for every line and writes one `out` ledger row per line.
///
/// In strict mode a debit that would take stock below zero aborts the whole
/// reversal with `InsufficientStock`.
async fn apply_reversal<C>(
    db: &C,
    settings: &ReconcilerSettings,
    details: &PurchaseDetails,
    cause: ReversalCause,
) -> Result<Vec<stock_history::Model>>
where
    C: ConnectionTrait,
{
    let purchase = &details.purchase;
    let reference = purchase.ledger_reference();
    let description = format!("{}: {}", cause.label(), purchase.display_reference());

    let mut ledger = Vec::with_capacity(details.items.len());
    for item in &details.items {
        let target = item_target(item)?;

        if settings.strict_stock {
            let state = stock::load_target(db, target).await?;
            if state.stock - item.quantity < Decimal::ZERO {
                return Err(Error::InsufficientStock {
                    target: target.to_string(),
                    current: state.stock,
                    required: item.quantity,
                });
            }
        }

        stock::adjust_stock_atomic(db, target, -item.quantity).await?;
        let row = stock::record_movement(
            db,
            NewMovement {
                user_id: &purchase.user_id,
                target,
                movement_type: MovementType::Out,
                quantity: item.quantity,
                description: description.clone(),
                reference: reference.clone(),
            },
        )
        .await?;
        ledger.push(row);
    }

    Ok(ledger)
}
