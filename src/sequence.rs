//! Order numbering.
//!
//! Numbers come from a single named counter in the document store, bumped with
//! one atomic increment-and-fetch per call. Concurrent callers never see the same
//! value; a number consumed by a create that later fails is not reissued.

use std::sync::Arc;

use crate::error::PosError;
use crate::store::DocumentStore;
use crate::types::OrderNumber;

/// Counter key for order numbers.
pub const ORDER_NUMBER_COUNTER: &str = "orderNumber";

#[derive(Clone)]
pub struct OrderNumberSequence {
    store: Arc<dyn DocumentStore>,
}

impl OrderNumberSequence {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn next_order_number(&self) -> Result<OrderNumber, PosError> {
        self.store
            .next_sequence(ORDER_NUMBER_COUNTER)
            .await
            .map(OrderNumber)
    }
}
