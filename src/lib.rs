//! # Café POS order core
//!
//! Order capture for a café till: cart totals, the order status lifecycle,
//! split-tender reconciliation, order numbering and table occupancy, served
//! over a small REST API.
//!
//! ## Entry point
//!
//! [`OrderLifecycle`] owns every order write: [`OrderLifecycle::create_order`],
//! [`OrderLifecycle::transition_status`] and [`OrderLifecycle::update_order`].
//! It talks to a [`DocumentStore`] handle built once at startup.
//!
//! ## Example
//!
//! ```rust
//! use cafe_pos::{compute_totals, reconcile, OrderLine, PaymentMethod, Tender};
//! use rust_decimal::Decimal;
//!
//! let lines = vec![
//!     OrderLine {
//!         product_id: "latte".into(),
//!         name: "Latte".into(),
//!         variant: None,
//!         quantity: 2,
//!         price: Decimal::from(100),
//!         note: None,
//!         is_taxable: true,
//!     },
//!     OrderLine {
//!         product_id: "water".into(),
//!         name: "Water".into(),
//!         variant: None,
//!         quantity: 1,
//!         price: Decimal::from(50),
//!         note: None,
//!         is_taxable: false,
//!     },
//! ];
//! let totals = compute_totals(&lines, Decimal::from(16)).unwrap();
//! assert_eq!(totals.total, Decimal::from(282));
//!
//! let cash = Tender { method: PaymentMethod::Cash, amount: Decimal::from(300), tip: Decimal::ZERO, reference: None };
//! let summary = reconcile(totals.total, &[cash]).unwrap();
//! assert!(summary.is_paid);
//! assert_eq!(summary.remaining_amount, Decimal::ZERO);
//! ```

pub mod api;
pub mod audit;
pub mod auth;
pub mod calculator;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod persistence;
pub mod reports;
pub mod sequence;
pub mod store;
pub mod tender;
pub mod types;

pub use auth::{AuthConfig, AuthUser, Role};
pub use calculator::{compute_totals, round_money, OrderTotals};
pub use config::{Config, StoreUrl};
pub use error::PosError;
pub use lifecycle::{OrderLifecycle, OrderPatch, TransitionPolicy};
pub use sequence::OrderNumberSequence;
pub use store::{DocumentStore, MemoryStore, WriteBatch};
pub use tender::{reconcile, PaymentSummary, TenderSheet};
pub use types::{
    Attribution, Order, OrderDraft, OrderId, OrderLine, OrderNumber, OrderStatus, OrderType,
    PaymentMethod, Table, TableId, TableStatus, Tender, TenderInput,
};
