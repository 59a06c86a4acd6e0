use crate::error::ServiceError;
use crate::middleware::auth::{load_account, AuthenticatedUser};
use crate::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Signup hook: creates the caller's account if it doesn't exist yet.
pub async fn create_account(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ServiceError> {
    let account = state.accounts.create(user.id).await?;
    Ok(HttpResponse::Created().json(account))
}

pub async fn get_me(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ServiceError> {
    let account = load_account(&state, &user).await?;

    Ok(HttpResponse::Ok().json(json!({
        "id": account.id,
        "balance": account.balance,
        "role": account.role,
        "created_at": account.created_at,
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/accounts")
            .route("", web::post().to(create_account))
            .route("/me", web::get().to(get_me)),
    );
}
