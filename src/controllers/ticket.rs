use crate::error::ServiceError;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::MealType;
use crate::AppState;
use actix_web::{http::header, web, HttpResponse};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub meal_type: MealType,
    pub meal_date: NaiveDate,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

pub async fn purchase_tickets(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Json<PurchaseRequest>,
) -> Result<HttpResponse, ServiceError> {
    let receipt = state
        .tickets
        .purchase(user.id, body.meal_type, body.meal_date, body.quantity)
        .await?;

    Ok(HttpResponse::Created().json(receipt))
}

pub async fn get_my_tickets(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ServiceError> {
    let tickets = state.tickets.tickets_for_owner(user.id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "tickets": tickets,
        "count": tickets.len(),
    })))
}

pub async fn get_ticket_qr(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    ticket_id: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    let svg = state.tickets.qr_svg(*ticket_id, user.id).await?;

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "image/svg+xml"))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .body(svg))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tickets")
            .route("", web::get().to(get_my_tickets))
            .route("/purchase", web::post().to(purchase_tickets))
            .route("/{ticket_id}/qr", web::get().to(get_ticket_qr)),
    );
}
