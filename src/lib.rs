//! Payflow - Provider-agnostic payment core
//!
//! Canonical payment model, gateway registry, webhook reconciliation, fee and
//! revenue split engine, coupon discounts and an append-only audit trail,
//! organised as domain / ports / application / adapters.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
