//! HTTP handlers for purchase and entitlement endpoints.
//!
//! Thin wrappers over `LifecycleManager`: parse identifiers, build the
//! command, map the result.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use crate::application::lifecycle::{
    ActivatePurchaseCommand, ActivationResult, FailureResult, InitiatePurchaseCommand,
    RecordFailureCommand, TerminatePurchaseCommand, TerminationResult,
};
use crate::domain::foundation::{FeatureKey, GatewayId, PlanId, PurchaseId, Timestamp, UserId};
use crate::domain::purchase::PurchaseError;

use super::super::error::ApiError;
use super::super::AppState;
use super::dto::{
    ActivatePurchaseRequest, CommandResponse, CredentialQuery, EntitlementResponse,
    InitiatePurchaseRequest, PurchaseHistoryResponse, PurchaseResponse, RecordFailureRequest,
    SwitchRequest, TerminatePurchaseRequest,
};

fn purchase_id(raw: &str) -> Result<PurchaseId, ApiError> {
    raw.parse().map_err(|_| {
        PurchaseError::invalid_input("purchase_id", format!("'{}' is not a valid id", raw)).into()
    })
}

/// First address of `X-Forwarded-For`, if present.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ════════════════════════════════════════════════════════════════════════════════
// Commands
// ════════════════════════════════════════════════════════════════════════════════

/// POST /purchases
pub async fn initiate_purchase(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<InitiatePurchaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut cmd = InitiatePurchaseCommand::new(
        UserId::new(request.user_id).map_err(PurchaseError::from)?,
        PlanId::new(request.plan_id).map_err(PurchaseError::from)?,
        GatewayId::new(request.gateway_id).map_err(PurchaseError::from)?,
    )
    .with_payment(request.payment.into());

    if let Some(transaction_type) = request.transaction_type {
        cmd = cmd.with_type(transaction_type);
    }
    if let Some(parent) = request.parent_purchase_id {
        cmd = cmd.with_parent(purchase_id(&parent)?);
    }
    if let Some(reason) = request.failure_reason {
        cmd = cmd.with_failure_reason(reason);
    }
    if let Some(ip) = client_ip(&headers) {
        cmd = cmd.with_client_ip(ip);
    }

    let id = state.lifecycle.initiate_purchase(cmd).await?;
    let purchase = state.lifecycle.get_purchase(&id).await?;

    Ok((StatusCode::CREATED, Json(PurchaseResponse::from(&purchase))))
}

/// POST /purchases/:id/activate
pub async fn activate_purchase(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Option<Json<ActivatePurchaseRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let mut cmd =
        ActivatePurchaseCommand::new(purchase_id(&id)?).with_payment(request.payment.into());
    if request.force {
        cmd = cmd.forced();
    }

    let result = state.lifecycle.activate_purchase(cmd).await?;
    Ok(Json(CommandResponse {
        changed: matches!(result, ActivationResult::Activated(_)),
        purchase: PurchaseResponse::from(result.purchase()),
    }))
}

/// POST /purchases/:id/failure
pub async fn record_failure(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RecordFailureRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = RecordFailureCommand {
        purchase_id: purchase_id(&id)?,
        reason: request.reason,
        transaction_ref: request.transaction_ref,
    };

    let result = state.lifecycle.record_purchase_failure(cmd).await?;
    Ok(Json(CommandResponse {
        changed: matches!(result, FailureResult::Recorded(_)),
        purchase: PurchaseResponse::from(result.purchase()),
    }))
}

/// POST /purchases/:id/terminate
pub async fn terminate_purchase(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TerminatePurchaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = TerminatePurchaseCommand {
        purchase_id: purchase_id(&id)?,
        status: request.status,
        reason: request.reason,
    };

    let result = state.lifecycle.terminate_purchase(cmd).await?;
    Ok(Json(CommandResponse {
        changed: matches!(result, TerminationResult::Terminated(_)),
        purchase: PurchaseResponse::from(result.purchase()),
    }))
}

/// POST /purchases/:id/switch-request
pub async fn request_switch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SwitchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target = PlanId::new(request.target_plan_id).map_err(PurchaseError::from)?;
    let purchase = state
        .lifecycle
        .request_manual_switch(purchase_id(&id)?, target)
        .await?;
    Ok(Json(PurchaseResponse::from(&purchase)))
}

/// POST /purchases/:id/switch-approval
///
/// Returns the successor record.
pub async fn approve_switch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let successor = state.lifecycle.approve_manual_switch(purchase_id(&id)?).await?;
    Ok((StatusCode::CREATED, Json(PurchaseResponse::from(&successor))))
}

// ════════════════════════════════════════════════════════════════════════════════
// Queries
// ════════════════════════════════════════════════════════════════════════════════

/// GET /purchases/:id
pub async fn get_purchase(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let purchase = state.lifecycle.get_purchase(&purchase_id(&id)?).await?;
    Ok(Json(PurchaseResponse::from(&purchase)))
}

/// GET /users/:user_id/purchases
pub async fn purchase_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = UserId::new(user_id).map_err(PurchaseError::from)?;
    let purchases = state.lifecycle.purchase_history(&user_id).await?;
    Ok(Json(PurchaseHistoryResponse {
        purchases: purchases.iter().map(PurchaseResponse::from).collect(),
    }))
}

/// GET /users/:user_id/entitlements/:feature_key
pub async fn get_entitlement(
    State(state): State<AppState>,
    Path((user_id, feature_key)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = UserId::new(user_id).map_err(PurchaseError::from)?;
    let feature_key = FeatureKey::new(feature_key).map_err(PurchaseError::from)?;

    let current = state
        .lifecycle
        .current_entitlement(&user_id, &feature_key)
        .await?;
    Ok(Json(EntitlementResponse {
        entitled: current
            .as_ref()
            .is_some_and(|p| p.is_entitled(Timestamp::now())),
        purchase: current.as_ref().map(PurchaseResponse::from),
    }))
}

/// GET /entitlements?credential=...
pub async fn entitlement_by_credential(
    State(state): State<AppState>,
    Query(query): Query<CredentialQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let purchase = state
        .lifecycle
        .entitlement_by_credential(&query.credential)
        .await?
        .ok_or_else(|| PurchaseError::NotFound("no record holds this credential".to_string()))?;
    Ok(Json(EntitlementResponse {
        entitled: purchase.is_entitled(Timestamp::now()),
        purchase: Some(PurchaseResponse::from(&purchase)),
    }))
}
