//! Read-only projections over orders: dashboard stats and the sales report.
//!
//! Revenue counts billed orders only. Tips are reported separately and never
//! enter revenue. Sums saturate at `Decimal::MAX` rather than panic.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

use crate::calculator::round_money;
use crate::error::PosError;
use crate::types::{Order, OrderStatus, OrderType, PaymentMethod, Table, TableStatus};

const TOP_ITEMS: usize = 10;

fn sum_money(amounts: impl Iterator<Item = Decimal>) -> Decimal {
    amounts.fold(Decimal::ZERO, Decimal::saturating_add)
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub today_orders: usize,
    pub today_revenue: Decimal,
    pub active_orders: usize,
    pub occupied_tables: usize,
    pub average_ticket: Decimal,
}

/// Snapshot for the dashboard as of `now` (UTC day boundaries).
pub fn dashboard_stats(orders: &[Order], tables: &[Table], now: DateTime<Utc>) -> DashboardStats {
    let today = now.date_naive();
    let todays: Vec<&Order> = orders
        .iter()
        .filter(|o| o.created_at.date_naive() == today)
        .collect();
    let billed: Vec<&Order> = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Billed)
        .collect();
    let billed_total = sum_money(billed.iter().map(|o| o.total));
    DashboardStats {
        today_orders: todays.len(),
        today_revenue: sum_money(
            todays
                .iter()
                .filter(|o| o.status == OrderStatus::Billed)
                .map(|o| o.total),
        ),
        active_orders: orders.iter().filter(|o| !o.status.is_terminal()).count(),
        occupied_tables: tables
            .iter()
            .filter(|t| t.status == TableStatus::Occupied)
            .count(),
        average_ticket: if billed.is_empty() {
            Decimal::ZERO
        } else {
            round_money(billed_total / Decimal::from(billed.len()))
        },
    }
}

/// Inclusive date range of a report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct ReportRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl ReportRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, PosError> {
        if from > to {
            return Err(PosError::validation(format!(
                "report range starts ({}) after it ends ({})",
                from, to
            )));
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let day = at.date_naive();
        day >= self.from && day <= self.to
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodTotals {
    pub count: usize,
    pub amount: Decimal,
    pub tips: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeTotals {
    pub count: usize,
    pub revenue: Decimal,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSales {
    pub product_id: String,
    pub name: String,
    pub quantity: u64,
    pub revenue: Decimal,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    pub range: ReportRange,
    pub order_count: usize,
    pub revenue: Decimal,
    pub tax_collected: Decimal,
    pub tips: Decimal,
    pub cancelled_orders: usize,
    pub by_payment_method: BTreeMap<PaymentMethod, MethodTotals>,
    pub by_order_type: BTreeMap<OrderType, TypeTotals>,
    pub top_items: Vec<ItemSales>,
}

/// Sales report over orders created inside `range`.
pub fn sales_report(orders: &[Order], range: ReportRange) -> SalesReport {
    let in_range: Vec<&Order> = orders.iter().filter(|o| range.contains(o.created_at)).collect();
    let billed: Vec<&Order> = in_range
        .iter()
        .copied()
        .filter(|o| o.status == OrderStatus::Billed)
        .collect();

    let mut by_payment_method: BTreeMap<PaymentMethod, MethodTotals> = BTreeMap::new();
    let mut by_order_type: BTreeMap<OrderType, TypeTotals> = BTreeMap::new();
    let mut items: HashMap<&str, ItemSales> = HashMap::new();

    for order in &billed {
        let t = by_order_type.entry(order.order_type).or_default();
        t.count += 1;
        t.revenue = t.revenue.saturating_add(order.total);

        for tender in &order.payments {
            let m = by_payment_method.entry(tender.method).or_default();
            m.count += 1;
            m.amount = m.amount.saturating_add(tender.amount);
            m.tips = m.tips.saturating_add(tender.tip);
        }

        for line in &order.items {
            let entry = items.entry(line.product_id.as_str()).or_insert_with(|| ItemSales {
                product_id: line.product_id.clone(),
                name: line.name.clone(),
                quantity: 0,
                revenue: Decimal::ZERO,
            });
            entry.quantity += u64::from(line.quantity);
            entry.revenue = entry
                .revenue
                .saturating_add(line.line_total().unwrap_or(Decimal::MAX));
        }
    }

    let mut top_items: Vec<ItemSales> = items.into_values().collect();
    top_items.sort_by(|a, b| {
        b.quantity
            .cmp(&a.quantity)
            .then_with(|| b.revenue.cmp(&a.revenue))
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    top_items.truncate(TOP_ITEMS);

    SalesReport {
        range,
        order_count: billed.len(),
        revenue: sum_money(billed.iter().map(|o| o.total)),
        tax_collected: sum_money(billed.iter().map(|o| o.tax_amount)),
        tips: sum_money(billed.iter().flat_map(|o| o.payments.iter()).map(|p| p.tip)),
        cancelled_orders: in_range
            .iter()
            .filter(|o| o.status == OrderStatus::Cancelled)
            .count(),
        by_payment_method,
        by_order_type,
        top_items,
    }
}
