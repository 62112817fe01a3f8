//! Structured audit trail for order actions.
//!
//! Events: order_create, order_status_change, order_update. Format: JSON with
//! timestamp, actor, action, resource, outcome. Sink: stdout or in-memory (tests).

use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

pub const ORDER_CREATE: &str = "order_create";
pub const ORDER_STATUS_CHANGE: &str = "order_status_change";
pub const ORDER_UPDATE: &str = "order_update";

/// Single audit record: one line of JSON per event.
#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    /// Unix timestamp (seconds since epoch).
    pub timestamp_secs: u64,
    /// Who performed the action (API key id or "anonymous").
    pub actor: String,
    pub action: String,
    /// Order id, order number, status change and similar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<serde_json::Value>,
    /// success, rejected, error.
    pub outcome: String,
}

impl AuditEvent {
    pub fn now(
        actor: impl Into<String>,
        action: impl Into<String>,
        resource: Option<serde_json::Value>,
        outcome: impl Into<String>,
    ) -> Self {
        let timestamp_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            timestamp_secs,
            actor: actor.into(),
            action: action.into(),
            resource,
            outcome: outcome.into(),
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: &AuditEvent);
}

/// Writes one JSON line per event to stdout.
pub struct StdoutAuditSink;

impl AuditSink for StdoutAuditSink {
    fn emit(&self, event: &AuditEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{}", line);
        }
    }
}

/// Keeps events in memory. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn actions(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.action).collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: &AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
