//! Services Marketplace Engine
//!
//! The core of the services-marketplace backend: clients post orders, workers accept and fulfil
//! them, and payments run through pluggable gateway adapters, with notifications fanned out to
//! live connections. This library is transport-agnostic; the HTTP/WebSocket surface lives in the
//! server crate.
//!
//! The library is divided into four main sections:
//! 1. Storage ([`traits`] and the SQLite backend behind it). You should never need to touch the
//!    database directly; use the flow APIs. The exception is the data types in [`db_types`],
//!    which are public.
//! 2. The flow APIs ([`OrderFlowApi`], [`PaymentFlowApi`]): order creation and assignment, and
//!    the payment state machine. All status transitions happen here and nowhere else.
//! 3. Gateway adapters ([`gateway`]): the `PaymentGateway` seam plus the simulated processor.
//! 4. Events ([`events`]): the outbound notification queue the flow APIs write to, and the
//!    connection hub that fans events out to per-user and per-role groups.

pub mod authz;
pub mod db_types;
pub mod events;
pub mod gateway;
pub mod traits;

mod api;
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{
    errors::{OrderFlowError, PaymentFlowError},
    order_flow_api::OrderFlowApi,
    payment_flow_api::{InitiateResult, PaymentFlowApi, PaymentRequest, RefundResult},
};
pub use sqlite::{db::SqliteDatabase, db_url};
