//! Pricing math - pure functions behind purchase totals and cost recomputation.
//!
//! Nothing in this module touches storage. The reconciler captures a
//! [`StockSnapshot`] of each target before it credits stock and hands the
//! snapshot in here, so the weighted-average formula always sees the
//! pre-increment baseline.

use crate::entities::DiscountType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// How a completion changes the unit price of the stock it credits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceStrategy {
    /// Blend existing stock value with purchased quantity and landed cost
    WeightedAverage,
    /// Replace the price with the purchased unit price (bulk-import behaviour)
    DirectOverwrite,
    /// Leave the price untouched
    Keep,
}

impl PriceStrategy {
    /// Strategy for a status-driven completion, selected by the purchase's
    /// `auto_update_price` flag.
    #[must_use]
    pub const fn for_completion(auto_update_price: bool) -> Self {
        if auto_update_price {
            Self::WeightedAverage
        } else {
            Self::Keep
        }
    }
}

/// Stock and unit price of a target as observed before a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockSnapshot {
    /// Stock before the increment
    pub stock: Decimal,
    /// Unit cost before repricing
    pub price: Decimal,
}

/// Quantity and unit price of one purchased line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    /// Units bought
    pub quantity: Decimal,
    /// Unit price paid, before landed costs
    pub price: Decimal,
}

/// Amount a discount takes off `base`. Percentages are of `base`; the result
/// never exceeds `base` and never goes below zero. `None` on overflow.
#[must_use]
pub fn discount_amount(base: Decimal, value: Decimal, kind: DiscountType) -> Option<Decimal> {
    let raw = match kind {
        DiscountType::Nominal => value,
        DiscountType::Percentage => base.checked_mul(value)?.checked_div(HUNDRED)?,
    };
    Some(raw.max(Decimal::ZERO).min(base.max(Decimal::ZERO)))
}

/// `quantity * price` less the line discount. `None` on overflow.
#[must_use]
pub fn line_total(
    quantity: Decimal,
    price: Decimal,
    discount: Decimal,
    kind: DiscountType,
) -> Option<Decimal> {
    let gross = quantity.checked_mul(price)?;
    gross.checked_sub(discount_amount(gross, discount, kind)?)
}

/// Purchase-level totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    /// Sum of line totals
    pub subtotal: Decimal,
    /// Subtotal after the purchase discount, plus landed costs
    pub total: Decimal,
}

fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, Decimal::checked_add)
}

/// Subtotal is the sum of line totals; total applies the purchase discount to
/// the subtotal and adds landed costs. `None` on overflow.
#[must_use]
pub fn purchase_totals(
    line_totals: &[Decimal],
    discount: Decimal,
    kind: DiscountType,
    additional_costs: &[Decimal],
) -> Option<Totals> {
    let subtotal = checked_sum(line_totals.iter().copied())?;
    let extra = checked_sum(additional_costs.iter().copied())?;
    let total = subtotal
        .checked_sub(discount_amount(subtotal, discount, kind)?)?
        .checked_add(extra)?
        .max(Decimal::ZERO);
    Some(Totals { subtotal, total })
}

/// Landed cost apportioned to each purchased unit, across every line of the
/// purchase regardless of target. `None` when the purchase has no quantity.
#[must_use]
pub fn additional_cost_per_unit(additional_costs: &[Decimal], lines: &[PricedLine]) -> Option<Decimal> {
    let total_quantity = checked_sum(lines.iter().map(|l| l.quantity))?;
    if total_quantity <= Decimal::ZERO {
        return None;
    }
    checked_sum(additional_costs.iter().copied())?.checked_div(total_quantity)
}

/// Weighted-average unit cost after receiving `lines` on top of `snapshot`.
///
/// Each line is valued at its unit price plus `additional_per_unit`. Returns
/// `None` when the combined quantity is not positive, which only happens if
/// earlier permissive reversals left the stock negative, or when the
/// arithmetic overflows.
#[must_use]
pub fn weighted_average(
    snapshot: StockSnapshot,
    lines: &[PricedLine],
    additional_per_unit: Decimal,
) -> Option<Decimal> {
    let mut total_value = snapshot.stock.checked_mul(snapshot.price)?;
    let mut total_quantity = snapshot.stock;

    for line in lines {
        let effective_price = line.price.checked_add(additional_per_unit)?;
        total_value = total_value.checked_add(line.quantity.checked_mul(effective_price)?)?;
        total_quantity = total_quantity.checked_add(line.quantity)?;
    }

    if total_quantity <= Decimal::ZERO {
        return None;
    }
    total_value.checked_div(total_quantity)
}

/// New unit price for one target under `strategy`, or `None` to leave the
/// price as it is.
///
/// `additional_per_unit` is the purchase-wide apportionment from
/// [`additional_cost_per_unit`]; when that is `None` the weighted-average step
/// is skipped entirely.
#[must_use]
pub fn resolve_price(
    strategy: PriceStrategy,
    snapshot: StockSnapshot,
    lines: &[PricedLine],
    additional_per_unit: Option<Decimal>,
) -> Option<Decimal> {
    match strategy {
        PriceStrategy::Keep => None,
        PriceStrategy::DirectOverwrite => lines.last().map(|l| l.price),
        PriceStrategy::WeightedAverage => {
            weighted_average(snapshot, lines, additional_per_unit?)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn line(quantity: Decimal, price: Decimal) -> PricedLine {
        PricedLine { quantity, price }
    }

    #[test]
    fn test_weighted_average_with_landed_cost() {
        let snapshot = StockSnapshot {
            stock: dec!(10),
            price: dec!(100),
        };
        let lines = [line(dec!(5), dec!(200))];
        let per_unit = additional_cost_per_unit(&[dec!(50)], &lines).unwrap();
        assert_eq!(per_unit, dec!(10));

        let price = weighted_average(snapshot, &lines, per_unit).unwrap();
        assert_eq!(price.round_dp(2), dec!(136.67));
    }

    #[test]
    fn test_weighted_average_groups_lines_for_same_target() {
        let snapshot = StockSnapshot {
            stock: dec!(0),
            price: dec!(0),
        };
        let lines = [line(dec!(2), dec!(10)), line(dec!(2), dec!(20))];
        assert_eq!(
            weighted_average(snapshot, &lines, Decimal::ZERO).unwrap(),
            dec!(15)
        );
    }

    #[test]
    fn test_weighted_average_skips_non_positive_quantity() {
        let snapshot = StockSnapshot {
            stock: dec!(-5),
            price: dec!(10),
        };
        assert!(weighted_average(snapshot, &[line(dec!(5), dec!(10))], Decimal::ZERO).is_none());
    }

    #[test]
    fn test_additional_cost_per_unit_zero_quantity() {
        assert!(additional_cost_per_unit(&[dec!(50)], &[]).is_none());
        assert!(additional_cost_per_unit(&[dec!(50)], &[line(dec!(0), dec!(1))]).is_none());
    }

    #[test]
    fn test_resolve_price_modes_differ() {
        let snapshot = StockSnapshot {
            stock: dec!(10),
            price: dec!(100),
        };
        let lines = [line(dec!(5), dec!(200))];
        let per_unit = Some(Decimal::ZERO);

        assert_eq!(
            resolve_price(PriceStrategy::Keep, snapshot, &lines, per_unit),
            None
        );
        assert_eq!(
            resolve_price(PriceStrategy::DirectOverwrite, snapshot, &lines, per_unit),
            Some(dec!(200))
        );
        let weighted =
            resolve_price(PriceStrategy::WeightedAverage, snapshot, &lines, per_unit).unwrap();
        assert_eq!(weighted.round_dp(4), dec!(133.3333));
        assert_eq!(
            resolve_price(PriceStrategy::WeightedAverage, snapshot, &lines, None),
            None
        );
    }

    #[test]
    fn test_line_total_discounts() {
        assert_eq!(
            line_total(dec!(4), dec!(25), dec!(10), DiscountType::Nominal),
            Some(dec!(90))
        );
        assert_eq!(
            line_total(dec!(4), dec!(25), dec!(10), DiscountType::Percentage),
            Some(dec!(90))
        );
        // A discount larger than the line cannot make it negative
        assert_eq!(
            line_total(dec!(1), dec!(5), dec!(50), DiscountType::Nominal),
            Some(dec!(0))
        );
    }

    #[test]
    fn test_overflow_is_reported_not_panicking() {
        assert_eq!(
            line_total(Decimal::MAX, dec!(2), Decimal::ZERO, DiscountType::Nominal),
            None
        );
        assert_eq!(
            purchase_totals(&[Decimal::MAX, Decimal::MAX], Decimal::ZERO, DiscountType::Nominal, &[]),
            None
        );
        let snapshot = StockSnapshot {
            stock: Decimal::MAX,
            price: dec!(10),
        };
        assert_eq!(weighted_average(snapshot, &[line(dec!(1), dec!(1))], Decimal::ZERO), None);
    }

    #[test]
    fn test_direct_overwrite_takes_last_line_price() {
        let snapshot = StockSnapshot {
            stock: dec!(10),
            price: dec!(100),
        };
        let lines = [line(dec!(5), dec!(200)), line(dec!(2), dec!(150))];
        assert_eq!(
            resolve_price(PriceStrategy::DirectOverwrite, snapshot, &lines, None),
            Some(dec!(150))
        );
    }

    #[test]
    fn test_purchase_totals() {
        let totals = purchase_totals(
            &[dec!(100), dec!(50)],
            dec!(10),
            DiscountType::Percentage,
            &[dec!(20), dec!(5)],
        )
        .unwrap();
        assert_eq!(totals.subtotal, dec!(150));
        assert_eq!(totals.total, dec!(160));
    }

    #[test]
    fn test_strategy_for_completion() {
        assert_eq!(PriceStrategy::for_completion(true), PriceStrategy::WeightedAverage);
        assert_eq!(PriceStrategy::for_completion(false), PriceStrategy::Keep);
    }

    proptest! {
        #[test]
        fn prop_weighted_average_between_old_and_new_price(
            stock in 0i64..10_000,
            old_price in 0i64..100_000,
            quantity in 1i64..10_000,
            new_price in 0i64..100_000,
        ) {
            let snapshot = StockSnapshot {
                stock: Decimal::from(stock),
                price: Decimal::from(old_price),
            };
            let lines = [line(Decimal::from(quantity), Decimal::from(new_price))];
            let avg = weighted_average(snapshot, &lines, Decimal::ZERO).unwrap();
            let low = Decimal::from(old_price.min(new_price));
            let high = Decimal::from(old_price.max(new_price));
            prop_assert!(avg >= low - dec!(0.0001) && avg <= high + dec!(0.0001));
        }

        #[test]
        fn prop_line_total_never_negative(
            quantity in 0i64..1_000,
            price in 0i64..1_000,
            discount in 0i64..100_000,
            percentage in any::<bool>(),
        ) {
            let kind = if percentage { DiscountType::Percentage } else { DiscountType::Nominal };
            let total = line_total(
                Decimal::from(quantity),
                Decimal::from(price),
                Decimal::from(discount),
                kind,
            )
            .unwrap();
            prop_assert!(total >= Decimal::ZERO);
            prop_assert!(total <= Decimal::from(quantity) * Decimal::from(price));
        }
    }
}
