//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `postgres` - sqlx-backed ledger, projections, purchases and claims
//! - `stripe` - Stripe subscription API client and a recording mock
//! - `memory` - In-memory ports for tests and local runs
//! - `http` - Axum webhook endpoint

pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;
