//! Razorpay adapter.
//!
//! Outbound API calls used during reconciliation. Authenticates with the
//! key id and key secret (HTTP basic auth).

mod client;

pub use client::{RazorpayClient, RazorpayClientConfig, DEFAULT_API_BASE_URL};
