//! Core types and IDs for the order core (orders, lines, tenders, tables).
//!
//! Identifiers are newtype wrappers. Order lines and tenders are value objects:
//! product name, price and taxability are copied onto the line when the order is
//! created, so later catalogue edits never change a recorded order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use uuid::Uuid;

/// Internal order identity (document id).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Table identity (document id).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TableId(pub Uuid);

impl TableId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Human-facing, strictly increasing order number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(pub u64);

/// How the order leaves the counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderType {
    DineIn,
    Takeaway,
    Delivery,
}

/// Order status. `Billed` and `Cancelled` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Preparing,
    Served,
    Billed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Billed | OrderStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Preparing => "preparing",
            OrderStatus::Served => "served",
            OrderStatus::Billed => "billed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tender instrument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Wallet,
}

/// Table occupancy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
    Available,
    Occupied,
    Billed,
}

/// One order line, snapshotted from the product at add-time.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub quantity: u32,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default = "default_taxable")]
    pub is_taxable: bool,
}

fn default_taxable() -> bool {
    true
}

impl OrderLine {
    /// `price × quantity`, or `None` if the product overflows.
    pub fn line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

/// A recorded tender. Immutable once appended to an order.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tender {
    pub method: PaymentMethod,
    pub amount: Decimal,
    #[serde(default)]
    pub tip: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// Tender as submitted by a client. `amount` may be omitted, meaning
/// "whatever is still outstanding".
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenderInput {
    pub method: PaymentMethod,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub tip: Decimal,
    #[serde(default)]
    pub reference: Option<String>,
}

/// Optional staff and customer attribution carried on an order.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cashier_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cashier_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Order submitted for creation. Totals are optional: when absent they are
/// computed from the lines with the configured tax percentage.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(default)]
    pub table_id: Option<TableId>,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderLine>,
    #[serde(default)]
    pub subtotal: Option<Decimal>,
    #[serde(default)]
    pub tax_amount: Option<Decimal>,
    #[serde(default)]
    pub total: Option<Decimal>,
    #[serde(default)]
    pub payments: Vec<TenderInput>,
    #[serde(flatten)]
    pub attribution: Attribution,
}

/// The order aggregate as persisted.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<TableId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    pub items: Vec<OrderLine>,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub payments: Vec<Tender>,
    pub paid_amount: Decimal,
    pub remaining_amount: Decimal,
    pub is_paid: bool,
    #[serde(flatten)]
    pub attribution: Attribution,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Advances `updated_at`, never moving it backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

/// Dining table as seen by the order core.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: TableId,
    pub number: u32,
    pub name: String,
    pub capacity: u32,
    pub status: TableStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_order_id: Option<OrderId>,
}

impl Table {
    pub fn new(number: u32, name: impl Into<String>, capacity: u32) -> Self {
        Self {
            id: TableId::new(),
            number,
            name: name.into(),
            capacity,
            status: TableStatus::Available,
            current_order_id: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == TableStatus::Available
    }
}
