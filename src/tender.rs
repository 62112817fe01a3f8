//! Tender reconciliation for single and split payments.
//!
//! Tips count toward `paid_amount` but never toward settling the order total:
//! only tender amounts offset what is due. Over-payment is allowed and surfaces
//! as `change_due`, which is derived and not persisted on the order.

use rust_decimal::Decimal;

use crate::calculator::{amount_overflow, validate_amount};
use crate::error::PosError;
use crate::types::{PaymentMethod, Tender, TenderInput};

/// Paid/remaining bookkeeping for an order total.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    pub paid_amount: Decimal,
    pub remaining_amount: Decimal,
    pub is_paid: bool,
    pub change_due: Decimal,
}

/// Reconciles `tenders` against `total`. Sums that overflow are a validation error.
pub fn reconcile(total: Decimal, tenders: &[Tender]) -> Result<PaymentSummary, PosError> {
    let mut tendered = Decimal::ZERO;
    let mut tips = Decimal::ZERO;
    for tender in tenders {
        tendered = tendered.checked_add(tender.amount).ok_or_else(amount_overflow)?;
        tips = tips.checked_add(tender.tip).ok_or_else(amount_overflow)?;
    }
    let balance = total.checked_sub(tendered).ok_or_else(amount_overflow)?;
    Ok(PaymentSummary {
        paid_amount: tendered.checked_add(tips).ok_or_else(amount_overflow)?,
        remaining_amount: balance.max(Decimal::ZERO),
        is_paid: tendered >= total,
        change_due: (-balance).max(Decimal::ZERO),
    })
}

/// Tender list assembled before a single submit.
///
/// Mirrors the till flow: the cashier adds tenders until nothing is outstanding,
/// then the whole sheet goes to order creation at once.
#[derive(Clone, Debug)]
pub struct TenderSheet {
    total: Decimal,
    tenders: Vec<Tender>,
}

impl TenderSheet {
    pub fn new(total: Decimal) -> Self {
        Self {
            total,
            tenders: Vec::new(),
        }
    }

    /// Builds a sheet from client input. A missing amount takes the balance still
    /// outstanding at that position in the list.
    pub fn from_inputs(total: Decimal, inputs: &[TenderInput]) -> Result<Self, PosError> {
        let mut sheet = Self::new(total);
        for input in inputs {
            let amount = match input.amount {
                Some(amount) => amount,
                None => sheet.outstanding()?,
            };
            sheet.add(Tender {
                method: input.method,
                amount,
                tip: input.tip,
                reference: input.reference.clone(),
            })?;
        }
        Ok(sheet)
    }

    /// Appends a tender. Amount and tip must be non-negative and within the amount limit.
    pub fn add(&mut self, tender: Tender) -> Result<(), PosError> {
        validate_amount("tender amount", tender.amount)?;
        validate_amount("tender tip", tender.tip)?;
        self.tenders.push(tender);
        Ok(())
    }

    /// Single tender for the exact total.
    pub fn exact(total: Decimal, method: PaymentMethod) -> Self {
        Self {
            total,
            tenders: vec![Tender {
                method,
                amount: total,
                tip: Decimal::ZERO,
                reference: None,
            }],
        }
    }

    /// Balance not yet covered by tender amounts.
    pub fn outstanding(&self) -> Result<Decimal, PosError> {
        Ok(self.summary()?.remaining_amount)
    }

    pub fn summary(&self) -> Result<PaymentSummary, PosError> {
        reconcile(self.total, &self.tenders)
    }

    pub fn tenders(&self) -> &[Tender] {
        &self.tenders
    }

    pub fn into_tenders(self) -> Vec<Tender> {
        self.tenders
    }
}
