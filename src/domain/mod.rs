//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, errors, events)
//! - `purchase` - Entitlement records, plans and their lifecycle rules
//! - `gateway` - Provider webhook verification and event normalization

pub mod foundation;
pub mod gateway;
pub mod purchase;
