//! Stripe adapter.
//!
//! Outbound API calls used during reconciliation. Webhook verification and
//! the event wire format live in `domain::gateway`.
//!
//! # Security
//!
//! The API key is held as `secrecy::SecretString` and only exposed when
//! building the Authorization header.

mod client;

pub use client::{StripeClient, StripeClientConfig, DEFAULT_API_BASE_URL};
