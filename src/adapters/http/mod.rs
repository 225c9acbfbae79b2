//! HTTP adapters - REST API implementations.
//!
//! - `webhooks` - signed provider callbacks
//! - `purchases` - lifecycle commands and entitlement reads

pub mod error;
pub mod purchases;
pub mod webhooks;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::application::lifecycle::LifecycleManager;
use crate::application::reconciler::ReconciliationService;

pub use error::{ApiError, ErrorResponse};
pub use purchases::purchase_routes;
pub use webhooks::{webhook_routes, WebhookAck};

/// Shared application state.
///
/// Cloned for each request; dependencies are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<LifecycleManager>,
    pub reconciliation: Arc<ReconciliationService>,
}

/// Builds the full API router.
///
/// # Example
///
/// ```ignore
/// let app = router(state, Duration::from_secs(30));
/// axum::serve(listener, app).await?;
/// ```
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    // Outermost first.
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .merge(webhook_routes())
        .nest("/api", purchase_routes())
        .layer(middleware)
        .route("/health", get(health))
        .with_state(state)
}

/// Liveness probe.
async fn health() -> &'static str {
    "ok"
}
