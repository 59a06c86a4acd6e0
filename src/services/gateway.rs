// Client for the hosted checkout gateway plus webhook signature checks.

use crate::config::GatewayConfig;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway api error status={status} body={body}")]
    Api { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("gateway not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    pub reference: String,
    pub amount: i64,
    pub account_id: Uuid,
    pub return_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    #[serde(alias = "paymentUrl", alias = "checkout_url")]
    pub checkout_url: String,
    #[serde(default)]
    pub id: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession, GatewayError>;
}

pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GatewayError::NotConfigured("GATEWAY_API_KEY is not set".to_string()))?;

        debug!("Requesting checkout for reference {}", request.reference);

        let resp = self
            .client
            .post(format!("{}/v1/checkouts", self.base_url))
            .header("X-Api-Key", api_key)
            .header("Idempotency-Key", &request.reference)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let session = serde_json::from_str::<CheckoutSession>(&body)
            .map_err(|e| GatewayError::InvalidResponse(format!("{e}; body={body}")))?;

        info!(
            "Checkout created for reference {} (gateway id {:?})",
            request.reference, session.id
        );
        Ok(session)
    }
}

/// Lowercase hex HMAC-SHA256 of `body`.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature against `body`.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Statuses the gateway uses for a captured payment.
pub fn is_success_status(status: &str) -> bool {
    matches!(
        status.trim().to_ascii_lowercase().as_str(),
        "success" | "succeeded" | "paid" | "completed"
    )
}

pub fn is_failure_status(status: &str) -> bool {
    matches!(
        status.trim().to_ascii_lowercase().as_str(),
        "failed" | "fail" | "cancelled" | "canceled" | "expired"
    )
}
