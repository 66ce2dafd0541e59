//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `billing` - Webhook verification, deduplication, projections and the
//!   installment and rollover rules

pub mod billing;
pub mod foundation;
