use crate::error::ServiceError;
use crate::middleware::auth::AuthenticatedUser;
use crate::AppState;
use actix_web::{web, HttpResponse};

pub async fn get_settings(
    state: web::Data<AppState>,
    _user: AuthenticatedUser,
) -> Result<HttpResponse, ServiceError> {
    let settings = state.settings.current().await?;
    Ok(HttpResponse::Ok().json(settings))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/settings", web::get().to(get_settings));
}
