//! Document store seam.
//!
//! [`DocumentStore`] is the handle the lifecycle talks to. Writes that must land
//! together (an order and the table it claims or releases) go through one
//! [`WriteBatch`], applied all-or-nothing. [`MemoryStore`] keeps documents in
//! process and optionally mirrors them to a JSON file. Writes are applied in
//! place; a failed batch or a failed file save restores only the documents the
//! batch touched.

use async_trait::async_trait;
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::error::PosError;
use crate::persistence::{FilePersistence, PersistedState, StateView};
use crate::types::{Order, OrderId, OrderStatus, Table, TableId, TableStatus};

/// One write inside a batch.
#[derive(Clone, Debug)]
pub enum WriteOp {
    /// Insert or replace an order document.
    PutOrder(Order),
    /// Replace an existing order only if its stored status is still `expected`.
    UpdateOrder { order: Order, expected: OrderStatus },
    /// Insert or replace a table document.
    PutTable(Table),
    /// Mark the table occupied by `order_id`. Fails unless the table is available.
    OccupyTable { table_id: TableId, order_id: OrderId },
    /// Make the table available again if `order_id` still holds it.
    ReleaseTable { table_id: TableId, order_id: OrderId },
}

/// Ordered group of writes applied atomically by [`DocumentStore::commit`].
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_order(mut self, order: Order) -> Self {
        self.ops.push(WriteOp::PutOrder(order));
        self
    }

    pub fn update_order(mut self, order: Order, expected: OrderStatus) -> Self {
        self.ops.push(WriteOp::UpdateOrder { order, expected });
        self
    }

    pub fn put_table(mut self, table: Table) -> Self {
        self.ops.push(WriteOp::PutTable(table));
        self
    }

    pub fn occupy_table(mut self, table_id: TableId, order_id: OrderId) -> Self {
        self.ops.push(WriteOp::OccupyTable { table_id, order_id });
        self
    }

    pub fn release_table(mut self, table_id: TableId, order_id: OrderId) -> Self {
        self.ops.push(WriteOp::ReleaseTable { table_id, order_id });
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Atomically increments the named counter and returns the new value.
    /// A counter that was never used starts from 0, so the first call returns 1.
    async fn next_sequence(&self, name: &str) -> Result<u64, PosError>;

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, PosError>;

    /// Most recent first. `None` returns every order.
    async fn list_orders(&self, limit: Option<usize>) -> Result<Vec<Order>, PosError>;

    async fn find_table(&self, id: TableId) -> Result<Option<Table>, PosError>;

    /// Ordered by table number.
    async fn list_tables(&self) -> Result<Vec<Table>, PosError>;

    /// Applies every op in `batch` or none of them.
    async fn commit(&self, batch: WriteBatch) -> Result<(), PosError>;
}

/// Prior value of one document, restored when a write is rolled back.
enum Undo {
    Order(OrderId, Option<Order>),
    Table(TableId, Option<Table>),
    Counter(String, Option<u64>),
}

#[derive(Debug, Default)]
struct Documents {
    orders: HashMap<OrderId, Order>,
    tables: HashMap<TableId, Table>,
    counters: BTreeMap<String, u64>,
}

impl Documents {
    fn from_state(state: PersistedState) -> Self {
        Self {
            orders: state.orders.into_iter().map(|o| (o.id, o)).collect(),
            tables: state.tables.into_iter().map(|t| (t.id, t)).collect(),
            counters: state.counters,
        }
    }

    fn view(&self) -> StateView<'_> {
        let mut orders: Vec<&Order> = self.orders.values().collect();
        orders.sort_by_key(|o| o.order_number);
        let mut tables: Vec<&Table> = self.tables.values().collect();
        tables.sort_by_key(|t| t.number);
        StateView {
            orders,
            tables,
            counters: &self.counters,
        }
    }

    fn increment(&mut self, name: &str, undo: &mut Vec<Undo>) -> u64 {
        let previous = self.counters.get(name).copied();
        let next = previous.unwrap_or(0) + 1;
        self.counters.insert(name.to_string(), next);
        undo.push(Undo::Counter(name.to_string(), previous));
        next
    }

    /// Applies `op`, recording what it overwrote. Checks run before any change.
    fn apply(&mut self, op: WriteOp, undo: &mut Vec<Undo>) -> Result<(), PosError> {
        match op {
            WriteOp::PutOrder(order) => {
                let id = order.id;
                let previous = self.orders.insert(id, order);
                undo.push(Undo::Order(id, previous));
            }
            WriteOp::UpdateOrder { order, expected } => {
                let stored = self
                    .orders
                    .get(&order.id)
                    .ok_or_else(|| PosError::not_found(format!("order {}", order.id)))?;
                if stored.status != expected {
                    return Err(PosError::InvalidTransition {
                        from: stored.status,
                        to: order.status,
                    });
                }
                let id = order.id;
                let previous = self.orders.insert(id, order);
                undo.push(Undo::Order(id, previous));
            }
            WriteOp::PutTable(table) => {
                if let Some(other) = self
                    .tables
                    .values()
                    .find(|t| t.number == table.number && t.id != table.id)
                {
                    return Err(PosError::validation(format!(
                        "table number {} already used by {}",
                        table.number, other.id
                    )));
                }
                let id = table.id;
                let previous = self.tables.insert(id, table);
                undo.push(Undo::Table(id, previous));
            }
            WriteOp::OccupyTable { table_id, order_id } => {
                let table = self
                    .tables
                    .get_mut(&table_id)
                    .ok_or_else(|| PosError::not_found(format!("table {}", table_id)))?;
                if !table.is_available() {
                    return Err(PosError::TableUnavailable(table_id));
                }
                undo.push(Undo::Table(table_id, Some(table.clone())));
                table.status = TableStatus::Occupied;
                table.current_order_id = Some(order_id);
            }
            WriteOp::ReleaseTable { table_id, order_id } => match self.tables.get_mut(&table_id) {
                Some(table) if table.current_order_id == Some(order_id) => {
                    undo.push(Undo::Table(table_id, Some(table.clone())));
                    table.status = TableStatus::Available;
                    table.current_order_id = None;
                }
                Some(table) => {
                    debug!(
                        "table release skipped table_id={} order_id={} holder={:?}",
                        table_id, order_id, table.current_order_id
                    );
                }
                None => {
                    debug!("table release skipped table_id={} missing", table_id);
                }
            },
        }
        Ok(())
    }

    fn rollback(&mut self, undo: Vec<Undo>) {
        for entry in undo.into_iter().rev() {
            match entry {
                Undo::Order(id, Some(order)) => {
                    self.orders.insert(id, order);
                }
                Undo::Order(id, None) => {
                    self.orders.remove(&id);
                }
                Undo::Table(id, Some(table)) => {
                    self.tables.insert(id, table);
                }
                Undo::Table(id, None) => {
                    self.tables.remove(&id);
                }
                Undo::Counter(name, Some(value)) => {
                    self.counters.insert(name, value);
                }
                Undo::Counter(name, None) => {
                    self.counters.remove(&name);
                }
            }
        }
    }
}

/// In-process document store, optionally mirrored to a JSON file.
///
/// All reads and writes go through one mutex; no lock is held across an await.
#[derive(Clone)]
pub struct MemoryStore {
    docs: Arc<Mutex<Documents>>,
    file: Option<FilePersistence>,
}

impl MemoryStore {
    /// Volatile store.
    pub fn new() -> Self {
        Self {
            docs: Arc::new(Mutex::new(Documents::default())),
            file: None,
        }
    }

    /// Store backed by `file`, loading any state it already holds.
    pub fn with_file(file: FilePersistence) -> Result<Self, PosError> {
        let docs = match file.load()? {
            Some(state) => {
                info!(
                    "store loaded path={} orders={} tables={}",
                    file.path().display(),
                    state.orders.len(),
                    state.tables.len()
                );
                Documents::from_state(state)
            }
            None => Documents::default(),
        };
        Ok(Self {
            docs: Arc::new(Mutex::new(docs)),
            file: Some(file),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Documents>, PosError> {
        self.docs
            .lock()
            .map_err(|_| PosError::persistence("document store lock poisoned"))
    }

    /// Runs `f` against the live documents under the lock. If `f` fails or the
    /// file mirror rejects the result, the entries recorded in the undo log are restored.
    fn write<T>(
        &self,
        f: impl FnOnce(&mut Documents, &mut Vec<Undo>) -> Result<T, PosError>,
    ) -> Result<T, PosError> {
        let mut docs = self.lock()?;
        let mut undo = Vec::new();
        let out = match f(&mut *docs, &mut undo) {
            Ok(out) => out,
            Err(e) => {
                docs.rollback(undo);
                return Err(e);
            }
        };
        if let Some(file) = &self.file {
            let saved = file.save(&docs.view());
            if let Err(e) = saved {
                docs.rollback(undo);
                return Err(e);
            }
        }
        Ok(out)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn next_sequence(&self, name: &str) -> Result<u64, PosError> {
        self.write(|docs, undo| Ok(docs.increment(name, undo)))
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, PosError> {
        Ok(self.lock()?.orders.get(&id).cloned())
    }

    async fn list_orders(&self, limit: Option<usize>) -> Result<Vec<Order>, PosError> {
        let guard = self.lock()?;
        let mut orders: Vec<Order> = guard.orders.values().cloned().collect();
        drop(guard);
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.order_number.cmp(&a.order_number))
        });
        if let Some(limit) = limit {
            orders.truncate(limit);
        }
        Ok(orders)
    }

    async fn find_table(&self, id: TableId) -> Result<Option<Table>, PosError> {
        Ok(self.lock()?.tables.get(&id).cloned())
    }

    async fn list_tables(&self) -> Result<Vec<Table>, PosError> {
        let mut tables: Vec<Table> = self.lock()?.tables.values().cloned().collect();
        tables.sort_by_key(|t| t.number);
        Ok(tables)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), PosError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.write(|docs, undo| {
            for op in batch.ops {
                docs.apply(op, undo)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Attribution, OrderNumber, OrderType};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn order(number: u64) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(),
            order_number: OrderNumber(number),
            order_type: OrderType::DineIn,
            table_id: None,
            table_name: None,
            items: Vec::new(),
            status: OrderStatus::Preparing,
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total: Decimal::ZERO,
            payments: Vec::new(),
            paid_amount: Decimal::ZERO,
            remaining_amount: Decimal::ZERO,
            is_paid: true,
            attribution: Attribution::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn sequence_starts_at_one_and_increments() {
        let store = MemoryStore::new();
        assert_eq!(store.next_sequence("orderNumber").await.unwrap(), 1);
        assert_eq!(store.next_sequence("orderNumber").await.unwrap(), 2);
        assert_eq!(store.next_sequence("other").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn occupy_busy_table_rolls_back_whole_batch() {
        let store = MemoryStore::new();
        let table = Table::new(1, "Table 1", 4);
        let table_id = table.id;
        let first = order(1);
        store
            .commit(
                WriteBatch::new()
                    .put_table(table)
                    .put_order(first.clone())
                    .occupy_table(table_id, first.id),
            )
            .await
            .unwrap();

        let second = order(2);
        let err = store
            .commit(
                WriteBatch::new()
                    .put_order(second.clone())
                    .occupy_table(table_id, second.id),
            )
            .await
            .unwrap_err();
        assert_eq!(err, PosError::TableUnavailable(table_id));
        assert!(store.find_order(second.id).await.unwrap().is_none());
        let t = store.find_table(table_id).await.unwrap().unwrap();
        assert_eq!(t.current_order_id, Some(first.id));
    }

    #[tokio::test]
    async fn release_ignores_other_holder() {
        let store = MemoryStore::new();
        let table = Table::new(1, "Table 1", 4);
        let table_id = table.id;
        let holder = order(1);
        store
            .commit(
                WriteBatch::new()
                    .put_table(table)
                    .occupy_table(table_id, holder.id),
            )
            .await
            .unwrap();
        store
            .commit(WriteBatch::new().release_table(table_id, OrderId::new()))
            .await
            .unwrap();
        let t = store.find_table(table_id).await.unwrap().unwrap();
        assert_eq!(t.status, TableStatus::Occupied);

        store
            .commit(WriteBatch::new().release_table(table_id, holder.id))
            .await
            .unwrap();
        let t = store.find_table(table_id).await.unwrap().unwrap();
        assert_eq!(t.status, TableStatus::Available);
        assert_eq!(t.current_order_id, None);
    }

    #[tokio::test]
    async fn duplicate_table_number_rejected() {
        let store = MemoryStore::new();
        store
            .commit(WriteBatch::new().put_table(Table::new(5, "A", 2)))
            .await
            .unwrap();
        let err = store
            .commit(WriteBatch::new().put_table(Table::new(5, "B", 2)))
            .await
            .unwrap_err();
        assert!(matches!(err, PosError::Validation(_)));
        assert_eq!(store.list_tables().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_orders_most_recent_first_with_limit() {
        let store = MemoryStore::new();
        for n in 1..=3 {
            store.commit(WriteBatch::new().put_order(order(n))).await.unwrap();
        }
        let listed = store.list_orders(Some(2)).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].order_number, OrderNumber(3));
        assert_eq!(listed[1].order_number, OrderNumber(2));
    }

    #[tokio::test]
    async fn failed_batch_restores_earlier_writes_in_same_batch() {
        let store = MemoryStore::new();
        let kept = order(1);
        store.commit(WriteBatch::new().put_order(kept.clone())).await.unwrap();

        let mut edited = kept.clone();
        edited.attribution.notes = Some("edited".into());
        let fresh = order(2);
        let table = Table::new(7, "Patio", 2);
        let table_id = table.id;
        let err = store
            .commit(
                WriteBatch::new()
                    .put_order(edited)
                    .put_order(fresh.clone())
                    .put_table(table)
                    .occupy_table(TableId::new(), fresh.id),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PosError::NotFound(_)));
        assert_eq!(store.find_order(kept.id).await.unwrap(), Some(kept));
        assert!(store.find_order(fresh.id).await.unwrap().is_none());
        assert!(store.find_table(table_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_with_stale_status_is_refused() {
        let store = MemoryStore::new();
        let mut stored = order(1);
        stored.status = OrderStatus::Billed;
        store.commit(WriteBatch::new().put_order(stored.clone())).await.unwrap();

        let mut stale = stored.clone();
        stale.status = OrderStatus::Preparing;
        stale.attribution.notes = Some("late edit".into());
        let err = store
            .commit(WriteBatch::new().update_order(stale, OrderStatus::Preparing))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PosError::InvalidTransition {
                from: OrderStatus::Billed,
                to: OrderStatus::Preparing
            }
        );
        assert_eq!(store.find_order(stored.id).await.unwrap(), Some(stored.clone()));

        let mut current = stored.clone();
        current.attribution.notes = Some("receipt reprinted".into());
        store
            .commit(WriteBatch::new().update_order(current.clone(), OrderStatus::Billed))
            .await
            .unwrap();
        assert_eq!(store.find_order(stored.id).await.unwrap(), Some(current));
    }

    #[tokio::test]
    async fn failed_save_rolls_back_batch_and_counter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pos.json");
        let store = MemoryStore::with_file(FilePersistence::new(&path)).unwrap();
        let kept = order(1);
        store.commit(WriteBatch::new().put_order(kept.clone())).await.unwrap();

        std::fs::remove_dir_all(dir.path()).unwrap();
        let lost = order(2);
        let err = store
            .commit(WriteBatch::new().put_order(lost.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, PosError::Persistence(_)));
        assert!(matches!(
            store.next_sequence("orderNumber").await,
            Err(PosError::Persistence(_))
        ));
        assert!(store.find_order(lost.id).await.unwrap().is_none());
        assert_eq!(store.find_order(kept.id).await.unwrap(), Some(kept));

        std::fs::create_dir_all(dir.path()).unwrap();
        assert_eq!(store.next_sequence("orderNumber").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pos.json");
        let saved = order(1);
        {
            let store = MemoryStore::with_file(FilePersistence::new(&path)).unwrap();
            store.next_sequence("orderNumber").await.unwrap();
            store.commit(WriteBatch::new().put_order(saved.clone())).await.unwrap();
        }
        let reopened = MemoryStore::with_file(FilePersistence::new(&path)).unwrap();
        assert_eq!(reopened.find_order(saved.id).await.unwrap(), Some(saved));
        assert_eq!(reopened.next_sequence("orderNumber").await.unwrap(), 2);
    }
}
