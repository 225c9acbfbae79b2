//! Entitlement Engine - purchase lifecycle and payment reconciliation
//!
//! Tracks what each user has bought, hands out the api or license keys that
//! prove it, and keeps those records in step with what Stripe and Razorpay
//! report over their webhooks.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
