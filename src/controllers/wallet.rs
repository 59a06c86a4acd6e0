use crate::controllers::payment::{cancel_top_up, initiate_top_up};
use crate::error::ServiceError;
use crate::middleware::auth::AuthenticatedUser;
use crate::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

pub async fn get_transactions(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, ServiceError> {
    let transactions = state
        .wallet
        .history(user.id, query.limit.unwrap_or(50))
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "transactions": transactions,
        "count": transactions.len(),
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/wallet")
            .route("/transactions", web::get().to(get_transactions))
            .route("/top-ups", web::post().to(initiate_top_up))
            .route("/top-ups/{reference}/cancel", web::post().to(cancel_top_up)),
    );
}
