pub mod config;
pub mod controllers;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;

use actix_web::{HttpResponse, Responder};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    AccountService, AuthService, PaymentGateway, PaymentService, SettingsService, SettingsSource,
    TicketService, WalletLedger,
};

pub use controllers::configure_routes;

/// Everything handlers need, shared across workers as `web::Data<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub auth: AuthService,
    pub accounts: AccountService,
    pub wallet: WalletLedger,
    pub tickets: TicketService,
    pub payments: PaymentService,
    pub settings: SettingsService,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        gateway: Arc<dyn PaymentGateway>,
        settings: SettingsSource,
    ) -> Self {
        let limits = config.limits;

        Self {
            auth: AuthService::new(config.jwt_secret.clone()),
            accounts: AccountService::new(pool.clone()),
            wallet: WalletLedger::new(pool.clone()),
            tickets: TicketService::new(
                pool.clone(),
                settings.clone(),
                limits.max_tickets_per_purchase,
                config.institution_offset,
            ),
            payments: PaymentService::new(
                pool.clone(),
                gateway,
                limits.min_top_up,
                config.gateway.return_url.clone(),
            ),
            settings: SettingsService::new(pool.clone(), settings),
            config: Arc::new(config),
            pool,
        }
    }
}

pub async fn api_info() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": "Mealpass Campus Dining API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Wallet ledger, meal tickets and QR redemption for campus dining",
        "endpoints": {
            "health": "/health",
            "api_docs": "/api",
            "accounts": "/accounts/*",
            "wallet": "/wallet/*",
            "tickets": "/tickets/*",
            "settings": "/settings",
            "webhooks": "/webhooks/gateway",
            "admin": "/admin/*"
        }
    }))
}
