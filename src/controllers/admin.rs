use crate::error::ServiceError;
use crate::middleware::auth::{require_admin, require_super_admin, AuthenticatedUser};
use crate::models::{AccountRole, MealSettings, MealType};
use crate::services::ticket::Redemption;
use crate::AppState;
use actix_web::{web, HttpResponse};
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub payload: String,
}

#[derive(Debug, Deserialize)]
pub struct ManualCreditRequest {
    pub account_id: Uuid,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: AccountRole,
}

/// What the scanner screen shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RedemptionOutcome {
    Success {
        ticket_id: Uuid,
        meal_type: MealType,
        meal_date: NaiveDate,
    },
    AlreadyUsed,
    NotFound,
    ExpiredOrOutOfWindow {
        reason: &'static str,
    },
}

/// Folds a redemption result into the scanner vocabulary. Errors outside that
/// vocabulary (storage failures) are passed through.
pub fn classify_redemption(
    result: Result<Redemption, ServiceError>,
) -> Result<RedemptionOutcome, ServiceError> {
    match result {
        Ok(redemption) => Ok(RedemptionOutcome::Success {
            ticket_id: redemption.ticket_id,
            meal_type: redemption.meal_type,
            meal_date: redemption.meal_date,
        }),
        Err(ServiceError::AlreadyUsed) => Ok(RedemptionOutcome::AlreadyUsed),
        Err(ServiceError::TicketNotFound) | Err(ServiceError::MalformedPayload) => {
            Ok(RedemptionOutcome::NotFound)
        }
        Err(e @ ServiceError::Expired) | Err(e @ ServiceError::OutsideWindow) => {
            Ok(RedemptionOutcome::ExpiredOrOutOfWindow { reason: e.code() })
        }
        Err(e) => Err(e),
    }
}

pub async fn redeem_ticket(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Json<RedeemRequest>,
) -> Result<HttpResponse, ServiceError> {
    let admin = require_admin(&state, &user).await?;

    let outcome = classify_redemption(state.tickets.redeem(&body.payload, admin.id).await)?;
    info!("Scan by admin {}: {:?}", admin.id, outcome);

    Ok(HttpResponse::Ok().json(outcome))
}

pub async fn credit_wallet(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Json<ManualCreditRequest>,
) -> Result<HttpResponse, ServiceError> {
    let admin = require_admin(&state, &user).await?;

    let balance = state
        .wallet
        .manual_credit(
            &admin,
            body.account_id,
            body.amount,
            state.config.limits.max_manual_credit,
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "account_id": body.account_id,
        "balance": balance,
    })))
}

pub async fn set_account_role(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    account_id: web::Path<Uuid>,
    body: web::Json<SetRoleRequest>,
) -> Result<HttpResponse, ServiceError> {
    let actor = require_super_admin(&state, &user).await?;

    let account = state
        .accounts
        .set_role(&actor, *account_id, body.role, state.config.limits.max_admins)
        .await?;

    Ok(HttpResponse::Ok().json(account))
}

pub async fn update_settings(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Json<MealSettings>,
) -> Result<HttpResponse, ServiceError> {
    let actor = require_super_admin(&state, &user).await?;
    let settings = state.settings.update(&actor, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(settings))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/tickets/redeem", web::post().to(redeem_ticket))
            .route("/wallet/credit", web::post().to(credit_wallet))
            .route("/accounts/{account_id}/role", web::put().to(set_account_role))
            .route("/settings", web::put().to(update_settings)),
    );
}
