//! Order lifecycle: creation, status transitions and table occupancy.
//!
//! [`OrderLifecycle`] is the single entry point for order writes. Creating a
//! dine-in order claims its table in the same store batch as the order insert;
//! reaching `billed` or `cancelled` releases it the same way.
//!
//! ```text
//!   preparing <-> served
//!       |            |
//!       +--> billed <+        (terminal)
//!       +--> cancelled <+     (terminal, from preparing or served)
//! ```

use chrono::Utc;
use log::info;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::audit::{self, AuditEvent, AuditSink};
use crate::calculator::{
    amount_overflow, compute_totals, validate_amount, validate_lines, validate_tax_percentage,
    OrderTotals,
};
use crate::error::PosError;
use crate::sequence::OrderNumberSequence;
use crate::store::{DocumentStore, WriteBatch};
use crate::tender::TenderSheet;
use crate::types::{
    Attribution, Order, OrderDraft, OrderId, OrderStatus, OrderType, Table, TenderInput,
};

/// How strictly status changes follow the transition graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransitionPolicy {
    /// Only the edges of the lifecycle graph.
    #[default]
    Strict,
    /// Legacy behaviour: any status from any non-terminal state.
    Lenient,
}

impl TransitionPolicy {
    pub fn allows(self, from: OrderStatus, to: OrderStatus) -> bool {
        use OrderStatus::*;
        if from.is_terminal() {
            return false;
        }
        match self {
            TransitionPolicy::Lenient => true,
            TransitionPolicy::Strict => matches!(
                (from, to),
                (Preparing, Served)
                    | (Served, Preparing)
                    | (Preparing, Billed)
                    | (Served, Billed)
                    | (Preparing, Cancelled)
                    | (Served, Cancelled)
            ),
        }
    }
}

/// Partial update of an order's non-lifecycle fields.
///
/// Lifecycle-owned fields (status, items, totals, numbering, table) are refused;
/// status changes go through [`OrderLifecycle::transition_status`].
#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    #[serde(flatten)]
    pub attribution: Attribution,
    #[serde(default)]
    pub payments: Option<Vec<TenderInput>>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

/// Owns order creation and status transitions.
pub struct OrderLifecycle {
    store: Arc<dyn DocumentStore>,
    sequence: OrderNumberSequence,
    tax_percentage: Decimal,
    policy: TransitionPolicy,
    audit: Arc<dyn AuditSink>,
}

impl OrderLifecycle {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        tax_percentage: Decimal,
        policy: TransitionPolicy,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, PosError> {
        validate_tax_percentage(tax_percentage)?;
        Ok(Self {
            sequence: OrderNumberSequence::new(store.clone()),
            store,
            tax_percentage,
            policy,
            audit,
        })
    }

    /// Seeds `count` tables ("Table 1".."Table N") when the store holds none.
    pub async fn ensure_tables(&self, count: u32) -> Result<usize, PosError> {
        if count == 0 || !self.store.list_tables().await?.is_empty() {
            return Ok(0);
        }
        let batch = (1..=count).fold(WriteBatch::new(), |batch, n| {
            batch.put_table(Table::new(n, format!("Table {}", n), 4))
        });
        self.store.commit(batch).await?;
        info!("tables seeded count={}", count);
        Ok(count as usize)
    }

    /// Validates and persists a new order, claiming its table if it has one.
    pub async fn create_order(&self, draft: OrderDraft, actor: &str) -> Result<Order, PosError> {
        let result = self.create_order_inner(draft).await;
        let (resource, outcome) = match &result {
            Ok(order) => (
                Some(serde_json::json!({
                    "order_id": order.id.to_string(),
                    "order_number": order.order_number.0,
                    "table_id": order.table_id.map(|t| t.to_string()),
                })),
                "success",
            ),
            Err(e) => (Some(serde_json::json!({ "error": e.to_string() })), outcome_of(e)),
        };
        self.audit
            .emit(&AuditEvent::now(actor, audit::ORDER_CREATE, resource, outcome));
        result
    }

    async fn create_order_inner(&self, draft: OrderDraft) -> Result<Order, PosError> {
        validate_lines(&draft.items)?;
        if draft.table_id.is_some() && draft.order_type != OrderType::DineIn {
            return Err(PosError::validation("only dine-in orders can be attached to a table"));
        }
        let totals = self.resolve_totals(&draft)?;
        let sheet = TenderSheet::from_inputs(totals.total, &draft.payments)?;

        let table = match draft.table_id {
            Some(table_id) => {
                let table = self
                    .store
                    .find_table(table_id)
                    .await?
                    .ok_or_else(|| PosError::not_found(format!("table {}", table_id)))?;
                if !table.is_available() {
                    return Err(PosError::TableUnavailable(table_id));
                }
                Some(table)
            }
            None => None,
        };

        let summary = sheet.summary()?;
        let order_number = self.sequence.next_order_number().await?;
        let now = Utc::now();
        let order = Order {
            id: OrderId::new(),
            order_number,
            order_type: draft.order_type,
            table_id: table.as_ref().map(|t| t.id),
            table_name: draft
                .table_name
                .or_else(|| table.as_ref().map(|t| t.name.clone())),
            items: draft.items,
            status: OrderStatus::Preparing,
            subtotal: totals.subtotal,
            tax_amount: totals.tax_amount,
            total: totals.total,
            payments: sheet.into_tenders(),
            paid_amount: summary.paid_amount,
            remaining_amount: summary.remaining_amount,
            is_paid: summary.is_paid,
            attribution: draft.attribution,
            created_at: now,
            updated_at: now,
        };

        let mut batch = WriteBatch::new().put_order(order.clone());
        if let Some(table) = &table {
            // Re-checked under the store lock; a concurrent claim fails the whole batch.
            batch = batch.occupy_table(table.id, order.id);
        }
        self.store.commit(batch).await?;

        info!(
            "order created order_id={} order_number={} type={:?} items={} total={} paid={} is_paid={}",
            order.id,
            order.order_number.0,
            order.order_type,
            order.items.len(),
            order.total,
            order.paid_amount,
            order.is_paid
        );
        if let Some(table) = &table {
            info!("table occupied table_id={} order_id={}", table.id, order.id);
        }
        Ok(order)
    }

    /// Uses client totals when all three are supplied and consistent, else computes them.
    fn resolve_totals(&self, draft: &OrderDraft) -> Result<OrderTotals, PosError> {
        let computed = compute_totals(&draft.items, self.tax_percentage)?;
        let totals = match (draft.subtotal, draft.tax_amount, draft.total) {
            (Some(subtotal), Some(tax_amount), Some(total)) => {
                validate_amount("subtotal", subtotal)?;
                validate_amount("tax amount", tax_amount)?;
                let sum = subtotal.checked_add(tax_amount).ok_or_else(amount_overflow)?;
                if sum != total {
                    return Err(PosError::validation(format!(
                        "total {} does not equal subtotal {} plus tax {}",
                        total, subtotal, tax_amount
                    )));
                }
                OrderTotals {
                    subtotal,
                    taxable_base: computed.taxable_base,
                    tax_amount,
                    total,
                }
            }
            _ => computed,
        };
        validate_amount("order total", totals.total)?;
        Ok(totals)
    }

    /// Moves an order to `new_status`, releasing its table on terminal states.
    pub async fn transition_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
        actor: &str,
    ) -> Result<Order, PosError> {
        let result = self.transition_inner(order_id, new_status).await;
        let resource = Some(serde_json::json!({
            "order_id": order_id.to_string(),
            "status": new_status.as_str(),
        }));
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => outcome_of(e),
        };
        self.audit.emit(&AuditEvent::now(
            actor,
            audit::ORDER_STATUS_CHANGE,
            resource,
            outcome,
        ));
        result
    }

    async fn transition_inner(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
    ) -> Result<Order, PosError> {
        let mut order = self.get_order(order_id).await?;
        let from = order.status;
        if !self.policy.allows(from, new_status) {
            return Err(PosError::InvalidTransition {
                from,
                to: new_status,
            });
        }
        order.status = new_status;
        order.touch(Utc::now());

        // Fails if another writer moved the order since it was read.
        let mut batch = WriteBatch::new().update_order(order.clone(), from);
        let released = match order.table_id {
            Some(table_id) if new_status.is_terminal() => {
                batch = batch.release_table(table_id, order.id);
                Some(table_id)
            }
            _ => None,
        };
        self.store.commit(batch).await?;

        info!(
            "order status changed order_id={} order_number={} from={} to={}",
            order.id, order.order_number.0, from, new_status
        );
        if let Some(table_id) = released {
            info!("table released table_id={} order_id={}", table_id, order.id);
        }
        Ok(order)
    }

    /// Applies a partial update to attribution fields and, on open orders, the tender list.
    pub async fn update_order(
        &self,
        order_id: OrderId,
        patch: OrderPatch,
        actor: &str,
    ) -> Result<Order, PosError> {
        let result = self.update_inner(order_id, patch).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => outcome_of(e),
        };
        self.audit.emit(&AuditEvent::now(
            actor,
            audit::ORDER_UPDATE,
            Some(serde_json::json!({ "order_id": order_id.to_string() })),
            outcome,
        ));
        result
    }

    async fn update_inner(&self, order_id: OrderId, patch: OrderPatch) -> Result<Order, PosError> {
        if let Some(field) = patch.rest.keys().next() {
            let hint = if field == "status" {
                "; use the status endpoint"
            } else {
                ""
            };
            return Err(PosError::validation(format!(
                "field '{}' cannot be updated{}",
                field, hint
            )));
        }
        let mut order = self.get_order(order_id).await?;
        let read_status = order.status;

        merge_attribution(&mut order.attribution, patch.attribution);
        if let Some(payments) = patch.payments {
            if order.status.is_terminal() {
                return Err(PosError::validation(format!(
                    "payments of a {} order cannot be changed",
                    order.status
                )));
            }
            let sheet = TenderSheet::from_inputs(order.total, &payments)?;
            let summary = sheet.summary()?;
            order.payments = sheet.into_tenders();
            order.paid_amount = summary.paid_amount;
            order.remaining_amount = summary.remaining_amount;
            order.is_paid = summary.is_paid;
        }
        order.touch(Utc::now());
        self.store
            .commit(WriteBatch::new().update_order(order.clone(), read_status))
            .await?;

        info!(
            "order updated order_id={} paid={} remaining={} is_paid={}",
            order.id, order.paid_amount, order.remaining_amount, order.is_paid
        );
        Ok(order)
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, PosError> {
        self.store
            .find_order(order_id)
            .await?
            .ok_or_else(|| PosError::not_found(format!("order {}", order_id)))
    }

    pub async fn list_orders(&self, limit: usize) -> Result<Vec<Order>, PosError> {
        self.store.list_orders(Some(limit)).await
    }

    /// Every order, for reporting.
    pub async fn all_orders(&self) -> Result<Vec<Order>, PosError> {
        self.store.list_orders(None).await
    }

    pub async fn list_tables(&self) -> Result<Vec<Table>, PosError> {
        self.store.list_tables().await
    }
}

fn merge_attribution(target: &mut Attribution, patch: Attribution) {
    let Attribution {
        cashier_id,
        cashier_name,
        waiter_id,
        waiter_name,
        customer_name,
        customer_phone,
        notes,
    } = patch;
    for (slot, value) in [
        (&mut target.cashier_id, cashier_id),
        (&mut target.cashier_name, cashier_name),
        (&mut target.waiter_id, waiter_id),
        (&mut target.waiter_name, waiter_name),
        (&mut target.customer_name, customer_name),
        (&mut target.customer_phone, customer_phone),
        (&mut target.notes, notes),
    ] {
        if value.is_some() {
            *slot = value;
        }
    }
}

fn outcome_of(err: &PosError) -> &'static str {
    match err {
        PosError::Persistence(_) | PosError::Configuration(_) => "error",
        _ => "rejected",
    }
}
