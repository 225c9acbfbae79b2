//! Payment gateway domain module.
//!
//! Provider-neutral model of inbound webhook deliveries plus the wire
//! formats and signature schemes of the supported providers.

mod errors;
mod event;
pub mod razorpay;
mod signature;
pub mod stripe;

pub use errors::WebhookError;
pub use event::{GatewayEvent, GatewayEventKind, WebhookRequest};
pub use signature::{
    sign_razorpay_payload, sign_stripe_payload, verify_razorpay_signature,
    verify_stripe_signature, StripeSignatureHeader, MAX_CLOCK_SKEW_SECS, MAX_EVENT_AGE_SECS,
};
