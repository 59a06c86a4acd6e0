use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use chrono::NaiveDate;
use log::error;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Quantity {requested} is out of range (1..={max})")]
    InvalidQuantity { requested: i32, max: i32 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Meal date {0} is in the past")]
    InvalidMealDate(NaiveDate),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Redemption payload is malformed")]
    MalformedPayload,

    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: i64, required: i64 },

    #[error("Account {0} not found")]
    AccountNotFound(Uuid),

    #[error("Ticket not found")]
    TicketNotFound,

    #[error("Ticket has already been used")]
    AlreadyUsed,

    #[error("Ticket has expired")]
    Expired,

    #[error("Ticket cannot be redeemed outside its meal window")]
    OutsideWindow,

    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Unknown payment reference {0}")]
    UnknownReference(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable machine-readable code returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::InvalidQuantity { .. } => "invalid_quantity",
            ServiceError::InvalidAmount(_) => "invalid_amount",
            ServiceError::InvalidMealDate(_) => "invalid_meal_date",
            ServiceError::InvalidSettings(_) => "invalid_settings",
            ServiceError::MalformedPayload => "malformed_payload",
            ServiceError::InsufficientFunds { .. } => "insufficient_funds",
            ServiceError::AccountNotFound(_) => "account_not_found",
            ServiceError::TicketNotFound => "not_found",
            ServiceError::AlreadyUsed => "already_used",
            ServiceError::Expired => "expired",
            ServiceError::OutsideWindow => "outside_window",
            ServiceError::LimitExceeded(_) => "limit_exceeded",
            ServiceError::UnknownReference(_) => "unknown_reference",
            ServiceError::InvalidState(_) => "invalid_state",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::Gateway(_) => "gateway_error",
            ServiceError::Database(_) | ServiceError::Internal(_) => "internal_error",
        }
    }

    /// Integrity failures are the only errors a caller may retry as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Database(_) | ServiceError::Internal(_))
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidQuantity { .. }
            | ServiceError::InvalidAmount(_)
            | ServiceError::InvalidMealDate(_)
            | ServiceError::InvalidSettings(_)
            | ServiceError::MalformedPayload => StatusCode::BAD_REQUEST,
            ServiceError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::AccountNotFound(_)
            | ServiceError::TicketNotFound
            | ServiceError::UnknownReference(_) => StatusCode::NOT_FOUND,
            ServiceError::AlreadyUsed | ServiceError::InvalidState(_) => StatusCode::CONFLICT,
            ServiceError::Expired
            | ServiceError::OutsideWindow
            | ServiceError::LimitExceeded(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Database(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        // storage details stay in the logs
        let message = if self.is_retryable() {
            error!("Request failed with integrity error: {}", self);
            "Something went wrong. Please try again.".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": self.code(),
            "message": message,
        }))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
