//! Webhook router. No user authentication; deliveries are verified by
//! signature in the reconciler.

use axum::{routing::post, Router};

use super::super::AppState;
use super::handlers::receive_webhook;

/// - `POST /webhooks/:gateway` - e.g. `/webhooks/stripe`, `/webhooks/razorpay`
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/webhooks/:gateway", post(receive_webhook))
}
