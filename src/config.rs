use anyhow::{anyhow, Context, Result};
use chrono::FixedOffset;
use log::{error, info, warn};
use std::env;
use std::str::FromStr;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub cors_allowed_origins: String,
    pub jwt_secret: String,
    pub gateway: GatewayConfig,
    pub limits: LedgerLimits,
    pub institution_offset: FixedOffset,
    pub expiry_sweep_secs: u64,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub return_url: String,
    pub webhook_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerLimits {
    pub min_top_up: i64,
    pub max_tickets_per_purchase: i32,
    pub max_manual_credit: i64,
    pub max_admins: i64,
}

impl Default for LedgerLimits {
    fn default() -> Self {
        Self {
            min_top_up: 500,
            max_tickets_per_purchase: 10,
            max_manual_credit: 50_000,
            max_admins: 5,
        }
    }
}

const REQUIRED_VARS: [&str; 3] = ["DATABASE_URL", "JWT_SECRET", "GATEWAY_WEBHOOK_SECRET"];

const OPTIONAL_VARS: [&str; 12] = [
    "SERVER_HOST",
    "SERVER_PORT",
    "CORS_ALLOWED_ORIGINS",
    "GATEWAY_BASE_URL",
    "GATEWAY_API_KEY",
    "GATEWAY_RETURN_URL",
    "MIN_TOP_UP",
    "MAX_TICKETS_PER_PURCHASE",
    "MAX_MANUAL_CREDIT",
    "MAX_ADMINS",
    "INSTITUTION_UTC_OFFSET_MINUTES",
    "TICKET_EXPIRY_SWEEP_SECS",
];

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests never touch process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{} must be set", key));
        let defaults = LedgerLimits::default();

        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            return Err(anyhow!(
                "JWT_SECRET must be at least 32 characters long for security"
            ));
        }

        let webhook_secret = required("GATEWAY_WEBHOOK_SECRET")?;
        if webhook_secret.trim().is_empty() {
            return Err(anyhow!("GATEWAY_WEBHOOK_SECRET cannot be empty"));
        }

        let offset_minutes: i32 = parse_or(&lookup, "INSTITUTION_UTC_OFFSET_MINUTES", 0)?;
        let institution_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                anyhow!("INSTITUTION_UTC_OFFSET_MINUTES out of range: {}", offset_minutes)
            })?;

        let limits = LedgerLimits {
            min_top_up: parse_or(&lookup, "MIN_TOP_UP", defaults.min_top_up)?,
            max_tickets_per_purchase: parse_or(
                &lookup,
                "MAX_TICKETS_PER_PURCHASE",
                defaults.max_tickets_per_purchase,
            )?,
            max_manual_credit: parse_or(&lookup, "MAX_MANUAL_CREDIT", defaults.max_manual_credit)?,
            max_admins: parse_or(&lookup, "MAX_ADMINS", defaults.max_admins)?,
        };

        if limits.min_top_up <= 0 || limits.max_manual_credit <= 0 {
            return Err(anyhow!("Monetary limits must be positive"));
        }
        if limits.max_tickets_per_purchase < 1 {
            return Err(anyhow!("MAX_TICKETS_PER_PURCHASE must be at least 1"));
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: parse_or(&lookup, "SERVER_PORT", 8080)?,
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|| "http://localhost:3000,http://localhost:5173".to_string()),
            jwt_secret,
            gateway: GatewayConfig {
                base_url: lookup("GATEWAY_BASE_URL")
                    .unwrap_or_else(|| "https://sandbox.gateway.local".to_string()),
                api_key: lookup("GATEWAY_API_KEY"),
                return_url: lookup("GATEWAY_RETURN_URL")
                    .unwrap_or_else(|| "mealpass://wallet/top-up".to_string()),
                webhook_secret,
            },
            limits,
            institution_offset,
            expiry_sweep_secs: parse_or(&lookup, "TICKET_EXPIRY_SWEEP_SECS", 0)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}

// Validate that all required environment variables are set
pub fn validate_environment_variables() -> bool {
    let missing_required: Vec<&str> = REQUIRED_VARS
        .iter()
        .filter(|var| env::var(var).is_err())
        .copied()
        .collect();

    if !missing_required.is_empty() {
        error!(
            "Missing required environment variables: {}",
            missing_required.join(", ")
        );
        error!("Please set these variables in your .env file or environment");
        return false;
    }

    let missing_optional: Vec<&str> = OPTIONAL_VARS
        .iter()
        .filter(|var| env::var(var).is_err())
        .copied()
        .collect();

    if !missing_optional.is_empty() {
        warn!(
            "Optional environment variables not set: {}",
            missing_optional.join(", ")
        );
        warn!("Defaults will be used for these settings");
    }

    info!("Environment validation completed successfully");
    true
}
