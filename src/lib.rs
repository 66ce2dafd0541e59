//! Billing Reconciler - Stripe webhook processing
//!
//! This crate receives Stripe webhook deliveries for the nonprofit
//! operations platform, deduplicates them through an event ledger and keeps
//! local subscription and purchase tables in step. It also counts
//! accelerator installments and rolls finished accelerators onto the
//! organization plan.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
