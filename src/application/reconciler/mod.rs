//! Gateway Webhook Reconcilers.
//!
//! One `GatewayReconciler` per payment provider authenticates and
//! translates deliveries; `ReconciliationService` runs the shared pipeline
//! (delivery ledger, purchase resolution, renewal deduplication) and calls
//! the lifecycle manager.

mod outcome;
mod pipeline;
mod razorpay;
mod registry;
mod stripe;

pub use outcome::ReconcileOutcome;
pub use pipeline::ReconciliationService;
pub use razorpay::RazorpayReconciler;
pub use registry::{GatewayReconciler, ReconcilerRegistry};
pub use stripe::StripeReconciler;

/// Header names the provider reconcilers read.
pub mod headers {
    pub use super::razorpay::{
        EVENT_ID_HEADER as RAZORPAY_EVENT_ID, SIGNATURE_HEADER as RAZORPAY_SIGNATURE,
    };
    pub use super::stripe::SIGNATURE_HEADER as STRIPE_SIGNATURE;
}
