//! Order totals: subtotal, taxable base, tax and grand total.
//!
//! [`compute_totals`] is pure. Callers validate prices and the tax percentage
//! first (see [`validate_lines`] and [`validate_tax_percentage`]).
//! Subtotal and tax are rounded to cents when computed; the total is their exact sum.
//! All arithmetic is checked: an overflow is a validation error, never a panic.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::PosError;
use crate::types::OrderLine;

/// Computed totals for a cart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub taxable_base: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

/// Minimal line view the calculator needs.
pub trait Priced {
    fn price(&self) -> Decimal;
    fn quantity(&self) -> u32;
    fn is_taxable(&self) -> bool;
}

impl Priced for OrderLine {
    fn price(&self) -> Decimal {
        self.price
    }

    fn quantity(&self) -> u32 {
        self.quantity
    }

    fn is_taxable(&self) -> bool {
        self.is_taxable
    }
}

/// Rounds a monetary amount to 2 decimal places, midpoint away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Upper bound, in whole currency units, for any single price, tender, tip or order total.
pub const MAX_AMOUNT_UNITS: i64 = 1_000_000_000_000;

pub fn max_amount() -> Decimal {
    Decimal::from(MAX_AMOUNT_UNITS)
}

/// Rejects negative amounts and amounts above [`max_amount`].
pub fn validate_amount(what: &str, amount: Decimal) -> Result<(), PosError> {
    if amount < Decimal::ZERO {
        return Err(PosError::validation(format!("{} must not be negative", what)));
    }
    if amount > max_amount() {
        return Err(PosError::validation(format!(
            "{} {} exceeds the limit of {}",
            what,
            amount,
            max_amount()
        )));
    }
    Ok(())
}

pub(crate) fn amount_overflow() -> PosError {
    PosError::validation("amount is too large to compute")
}

/// Computes totals for `lines` at `tax_percentage` (0-100).
pub fn compute_totals<L: Priced>(
    lines: &[L],
    tax_percentage: Decimal,
) -> Result<OrderTotals, PosError> {
    let mut subtotal = Decimal::ZERO;
    let mut taxable_base = Decimal::ZERO;
    for line in lines {
        let amount = line
            .price()
            .checked_mul(Decimal::from(line.quantity()))
            .ok_or_else(amount_overflow)?;
        subtotal = subtotal.checked_add(amount).ok_or_else(amount_overflow)?;
        if line.is_taxable() {
            taxable_base = taxable_base.checked_add(amount).ok_or_else(amount_overflow)?;
        }
    }
    let subtotal = round_money(subtotal);
    let taxable_base = round_money(taxable_base);
    let tax = taxable_base
        .checked_mul(tax_percentage)
        .and_then(|t| t.checked_div(Decimal::ONE_HUNDRED))
        .ok_or_else(amount_overflow)?;
    let tax_amount = round_money(tax);
    Ok(OrderTotals {
        subtotal,
        taxable_base,
        tax_amount,
        total: subtotal.checked_add(tax_amount).ok_or_else(amount_overflow)?,
    })
}

pub fn validate_tax_percentage(tax_percentage: Decimal) -> Result<(), PosError> {
    if tax_percentage < Decimal::ZERO || tax_percentage > Decimal::ONE_HUNDRED {
        return Err(PosError::validation(format!(
            "tax percentage {} outside [0, 100]",
            tax_percentage
        )));
    }
    Ok(())
}

/// Rejects empty carts, zero quantities and out-of-range prices.
pub fn validate_lines(lines: &[OrderLine]) -> Result<(), PosError> {
    if lines.is_empty() {
        return Err(PosError::validation("order must contain at least one item"));
    }
    for (i, line) in lines.iter().enumerate() {
        if line.quantity == 0 {
            return Err(PosError::validation(format!("item {} quantity must be at least 1", i)));
        }
        validate_amount(&format!("item {} price", i), line.price)?;
        if line.product_id.trim().is_empty() {
            return Err(PosError::validation(format!("item {} is missing a product id", i)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: u32, is_taxable: bool) -> OrderLine {
        OrderLine {
            product_id: "p".into(),
            name: "item".into(),
            variant: None,
            quantity,
            price: Decimal::from(price),
            note: None,
            is_taxable,
        }
    }

    #[test]
    fn mixed_taxability_cart() {
        let lines = vec![line(100, 2, true), line(50, 1, false)];
        let totals = compute_totals(&lines, Decimal::from(16)).unwrap();
        assert_eq!(totals.subtotal, Decimal::from(250));
        assert_eq!(totals.taxable_base, Decimal::from(200));
        assert_eq!(totals.tax_amount, Decimal::from(32));
        assert_eq!(totals.total, Decimal::from(282));
    }

    #[test]
    fn empty_cart_is_zero() {
        let totals = compute_totals::<OrderLine>(&[], Decimal::from(16)).unwrap();
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn tax_rounds_half_cent_up() {
        // 0.25 * 10% = 0.025
        let lines = vec![OrderLine {
            price: Decimal::new(25, 2),
            ..line(0, 1, true)
        }];
        let totals = compute_totals(&lines, Decimal::from(10)).unwrap();
        assert_eq!(totals.tax_amount, Decimal::new(3, 2));
        assert_eq!(totals.total, Decimal::new(28, 2));
    }

    #[test]
    fn zero_tax_percentage() {
        let totals = compute_totals(&[line(12, 3, true)], Decimal::ZERO).unwrap();
        assert_eq!(totals.tax_amount, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::from(36));
    }

    #[test]
    fn validation_rejects_bad_input() {
        assert!(validate_lines(&[]).is_err());
        assert!(validate_lines(&[line(-1, 1, true)]).is_err());
        assert!(validate_lines(&[line(1, 0, true)]).is_err());
        assert!(validate_lines(&[line(1, 1, true)]).is_ok());
        assert!(validate_tax_percentage(Decimal::from(101)).is_err());
        assert!(validate_tax_percentage(Decimal::from(-1)).is_err());
        assert!(validate_tax_percentage(Decimal::ONE_HUNDRED).is_ok());
    }

    #[test]
    fn price_above_limit_rejected() {
        let huge = OrderLine {
            price: Decimal::MAX,
            ..line(0, 2, true)
        };
        assert!(matches!(validate_lines(&[huge]), Err(PosError::Validation(_))));
        let at_limit = OrderLine {
            price: max_amount(),
            ..line(0, 1, true)
        };
        assert!(validate_lines(&[at_limit]).is_ok());
    }

    #[test]
    fn overflowing_cart_is_an_error_not_a_panic() {
        let huge = OrderLine {
            price: Decimal::MAX,
            ..line(0, 2, true)
        };
        assert_eq!(
            compute_totals(&[huge], Decimal::from(16)),
            Err(amount_overflow())
        );

        let single = OrderLine {
            price: Decimal::MAX,
            ..line(0, 1, false)
        };
        assert!(compute_totals(&[single.clone(), single], Decimal::ZERO).is_err());
    }
}
