use crate::error::ServiceError;
use crate::middleware::auth::AuthenticatedUser;
use crate::services::gateway::verify_signature;
use crate::services::payment::ReconciliationResult;
use crate::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;

pub const SIGNATURE_HEADER: &str = "X-Signature";

#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct GatewayCallback {
    #[serde(alias = "orderId", alias = "order_id")]
    pub reference: String,
    pub status: String,
    #[serde(default)]
    pub amount: Option<i64>,
}

pub async fn initiate_top_up(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Json<TopUpRequest>,
) -> Result<HttpResponse, ServiceError> {
    let session = state.payments.initiate(user.id, body.amount).await?;
    Ok(HttpResponse::Created().json(session))
}

pub async fn cancel_top_up(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    reference: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let outcome = state.payments.cancel_intent(user.id, &reference).await?;

    Ok(HttpResponse::Ok().json(json!({
        "reference": outcome.transaction.external_ref,
        "status": outcome.transaction.status,
        "already_cancelled": outcome.already_cancelled,
    })))
}

/// Gateway callback. Anything signed gets a 200 unless storage failed, so the
/// gateway stops retrying duplicates and unknown references.
pub async fn gateway_webhook(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if signature.is_empty()
        || !verify_signature(&state.config.gateway.webhook_secret, &body, signature)
    {
        warn!("Rejected gateway callback with missing or invalid signature");
        return HttpResponse::Unauthorized().json(json!({
            "error": "unauthorized",
            "message": "Invalid webhook signature"
        }));
    }

    let callback: GatewayCallback = match serde_json::from_slice(&body) {
        Ok(callback) => callback,
        Err(e) => {
            warn!("Signed gateway callback with unreadable body: {}", e);
            return HttpResponse::BadRequest().json(json!({
                "error": "invalid_payload",
                "message": "Callback body is not valid JSON"
            }));
        }
    };

    info!(
        "Gateway callback for {} with status {:?}",
        callback.reference, callback.status
    );

    match state
        .payments
        .confirm(&callback.reference, &callback.status, callback.amount)
        .await
    {
        Ok(reconciliation) => HttpResponse::Ok().json(json!({
            "result": reconciliation.result,
            "already_applied": reconciliation.already_applied,
        })),
        Err(ServiceError::UnknownReference(_)) => HttpResponse::Ok().json(json!({
            "result": ReconciliationResult::UnknownReference,
            "already_applied": false,
        })),
        Err(e) if e.is_retryable() => {
            error!("Failed to reconcile {}: {}", callback.reference, e);
            HttpResponse::InternalServerError().json(json!({
                "error": e.code(),
                "message": "Reconciliation failed, please retry"
            }))
        }
        Err(e) => {
            warn!("Callback for {} not applied: {}", callback.reference, e);
            HttpResponse::Ok().json(json!({
                "result": ReconciliationResult::Ignored,
                "already_applied": false,
            }))
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhooks").route("/gateway", web::post().to(gateway_webhook)));
}
