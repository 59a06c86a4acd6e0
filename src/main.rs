use actix_cors::Cors;
use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{
    middleware::{Compress, DefaultHeaders, Logger},
    web, App, HttpResponse, HttpServer, Responder,
};
use dotenv::dotenv;
use log::{error, info, warn};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

use mealpass::config::{validate_environment_variables, AppConfig};
use mealpass::services::{HttpGateway, SchedulerService, SettingsSource};
use mealpass::{api_info, configure_routes, AppState};

// Health check endpoint for load balancers and monitoring
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "mealpass-api",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn not_found() -> impl Responder {
    HttpResponse::NotFound().json(json!({
        "error": "Endpoint not found",
        "message": "The requested resource does not exist",
        "available_endpoints": "/api for API documentation"
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    info!("Starting Mealpass API v{}", env!("CARGO_PKG_VERSION"));

    if !validate_environment_variables() {
        std::process::exit(1);
    }

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("Connecting to database...");
    let db_pool = match PgPoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to create database pool: {}", e);
            std::process::exit(1);
        }
    };

    match sqlx::query("SELECT 1").fetch_one(&db_pool).await {
        Ok(_) => info!("Database connection successful"),
        Err(e) => {
            error!("Database connection failed: {}", e);
            std::process::exit(1);
        }
    }

    info!("Running database migrations...");
    match sqlx::migrate!("./migrations").run(&db_pool).await {
        Ok(_) => info!("Database migrations completed successfully"),
        Err(e) => {
            error!("Database migration failed: {}", e);
            std::process::exit(1);
        }
    }

    let gateway = match HttpGateway::new(&config.gateway) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            error!("Failed to build gateway client: {}", e);
            std::process::exit(1);
        }
    };
    if config.gateway.api_key.is_none() {
        warn!("GATEWAY_API_KEY not set, top-ups will fail until it is configured");
    }

    let state = AppState::new(db_pool, config, gateway, SettingsSource::Stored);

    if state.config.expiry_sweep_secs > 0 {
        SchedulerService::new(state.tickets.clone())
            .start_expiry_sweep(Duration::from_secs(state.config.expiry_sweep_secs));
    }

    // 100 requests per minute per IP, bursts of 20
    let governor_conf = match GovernorConfigBuilder::default()
        .requests_per_minute(100)
        .burst_size(20)
        .finish()
    {
        Some(conf) => conf,
        None => {
            error!("Invalid rate limiter configuration");
            std::process::exit(1);
        }
    };

    let server_host = state.config.server_host.clone();
    let server_port = state.config.server_port;
    let cors_origins = state.config.cors_allowed_origins.clone();

    info!("Starting HTTP server on {}:{}", server_host, server_port);
    info!("API documentation available at: http://{}:{}/api", server_host, server_port);

    let state = web::Data::new(state);

    HttpServer::new(move || {
        let cors_origins = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                cors_origins
                    .split(',')
                    .any(|allowed| allowed.trim() == origin.to_str().unwrap_or(""))
            })
            .allowed_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
            .allowed_headers(vec![
                "Content-Type",
                "Authorization",
                "Accept",
                "X-Requested-With",
                "Origin",
            ])
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .app_data(
                web::JsonConfig::default()
                    .limit(64 * 1024)
                    .error_handler(|err, _req| {
                        error!("JSON payload error: {}", err);
                        actix_web::error::InternalError::from_response(
                            err,
                            HttpResponse::BadRequest().json(json!({
                                "error": "invalid_payload",
                                "message": "Request body contains invalid JSON or exceeds size limit"
                            })),
                        )
                        .into()
                    }),
            )
            .wrap(cors)
            .wrap(Governor::new(&governor_conf))
            .wrap(Compress::default())
            .wrap(Logger::new(
                r#"%a "%r" %s %b "%{Referer}i" "%{User-Agent}i" %T"#,
            ))
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("Referrer-Policy", "strict-origin-when-cross-origin"))
                    .add((
                        "Strict-Transport-Security",
                        "max-age=31536000; includeSubDomains",
                    )),
            )
            .configure(configure_routes)
            .route("/health", web::get().to(health_check))
            .route("/api", web::get().to(api_info))
            .default_service(web::route().to(not_found))
    })
    .bind(format!("{}:{}", server_host, server_port))?
    .workers(num_cpus::get())
    .shutdown_timeout(30)
    .run()
    .await
}
