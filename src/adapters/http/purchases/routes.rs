//! Axum router configuration for purchase and entitlement endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::super::AppState;
use super::handlers::{
    activate_purchase, approve_switch, entitlement_by_credential, get_entitlement, get_purchase,
    initiate_purchase, purchase_history, record_failure, request_switch, terminate_purchase,
};

/// # Routes
///
/// ## Commands
/// - `POST /purchases` - start a purchase
/// - `POST /purchases/:id/activate` - confirm payment
/// - `POST /purchases/:id/failure` - record a failed payment
/// - `POST /purchases/:id/terminate` - cancel or expire
/// - `POST /purchases/:id/switch-request` - queue a manual plan switch
/// - `POST /purchases/:id/switch-approval` - approve the queued switch
///
/// ## Queries
/// - `GET /purchases/:id`
/// - `GET /users/:user_id/purchases`
/// - `GET /users/:user_id/entitlements/:feature_key`
/// - `GET /entitlements?credential=...`
pub fn purchase_routes() -> Router<AppState> {
    Router::new()
        .route("/purchases", post(initiate_purchase))
        .route("/purchases/:id", get(get_purchase))
        .route("/purchases/:id/activate", post(activate_purchase))
        .route("/purchases/:id/failure", post(record_failure))
        .route("/purchases/:id/terminate", post(terminate_purchase))
        .route("/purchases/:id/switch-request", post(request_switch))
        .route("/purchases/:id/switch-approval", post(approve_switch))
        .route("/users/:user_id/purchases", get(purchase_history))
        .route(
            "/users/:user_id/entitlements/:feature_key",
            get(get_entitlement),
        )
        .route("/entitlements", get(entitlement_by_credential))
}
