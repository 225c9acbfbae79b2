//! Inbound provider webhooks.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::application::reconciler::ReconcileOutcome;
use crate::domain::gateway::WebhookRequest;

use super::super::error::WebhookRejection;
use super::super::AppState;

/// Acknowledgement returned to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_id: Option<String>,
}

impl From<&ReconcileOutcome> for WebhookAck {
    fn from(outcome: &ReconcileOutcome) -> Self {
        Self {
            received: true,
            outcome: outcome.label().to_string(),
            purchase_id: outcome.purchase_id().map(|id| id.to_string()),
        }
    }
}

fn to_request(headers: &HeaderMap, body: Bytes) -> WebhookRequest {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .fold(WebhookRequest::new(body.to_vec()), |request, (name, value)| {
            request.with_header(name, value)
        })
}

/// POST /webhooks/:gateway
///
/// 200 for every verified delivery, whatever reconciling it produced.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, WebhookRejection> {
    let outcome = state
        .reconciliation
        .handle(&gateway, to_request(&headers, body))
        .await
        .map_err(WebhookRejection)?;
    Ok(Json(WebhookAck::from(&outcome)))
}
