use crate::error::ServiceError;
use crate::models::Account;
use crate::AppState;
use actix_web::{dev::Payload, http, web, Error, FromRequest, HttpRequest};
use log::{debug, error, warn};
use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub id: Uuid,
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>> + 'static>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let req = req.clone();

        Box::pin(async move {
            debug!("Auth extractor called for: {}", req.path());

            let Some(auth_header) = req.headers().get(http::header::AUTHORIZATION) else {
                warn!("❌ Request without authorization header");
                return Err(ServiceError::Unauthorized("Authorization header required".into()).into());
            };

            let Ok(auth_str) = auth_header.to_str() else {
                warn!("Invalid authorization header format");
                return Err(
                    ServiceError::Unauthorized("Invalid authorization header format".into()).into(),
                );
            };

            let Some(token) = auth_str.strip_prefix("Bearer ") else {
                warn!("Authorization header without Bearer scheme");
                return Err(ServiceError::Unauthorized("Bearer token required".into()).into());
            };

            if token.trim().is_empty() {
                warn!("Empty token provided");
                return Err(ServiceError::Unauthorized("Token cannot be empty".into()).into());
            }

            let Some(state) = req.app_data::<web::Data<AppState>>() else {
                error!("App state not found in app data");
                return Err(ServiceError::Internal("app state missing".into()).into());
            };

            match state.auth.verify_token(token.trim()) {
                Ok(account_id) => {
                    debug!("🎉 Token verified for account: {}", account_id);
                    Ok(AuthenticatedUser { id: account_id })
                }
                Err(e) => {
                    warn!("Token verification failed: {}", e);
                    Err(ServiceError::Unauthorized("Invalid or expired token".into()).into())
                }
            }
        })
    }
}

/// Loads the caller's account; a valid token for an unregistered id is
/// treated as unauthenticated.
pub async fn load_account(state: &AppState, user: &AuthenticatedUser) -> Result<Account, ServiceError> {
    match state.accounts.get(user.id).await {
        Ok(account) => Ok(account),
        Err(ServiceError::AccountNotFound(_)) => {
            warn!("Token for unknown account {}", user.id);
            Err(ServiceError::Unauthorized(
                "No account exists for this token".to_string(),
            ))
        }
        Err(e) => Err(e),
    }
}

pub async fn require_admin(state: &AppState, user: &AuthenticatedUser) -> Result<Account, ServiceError> {
    let account = load_account(state, user).await?;

    if !account.role.is_staff() {
        warn!("Non-admin account {} attempted admin access", user.id);
        return Err(ServiceError::Forbidden("Admin access required".to_string()));
    }

    Ok(account)
}

pub async fn require_super_admin(
    state: &AppState,
    user: &AuthenticatedUser,
) -> Result<Account, ServiceError> {
    let account = load_account(state, user).await?;

    if !account.role.is_super_admin() {
        warn!("Account {} attempted super admin access", user.id);
        return Err(ServiceError::Forbidden(
            "Super admin access required".to_string(),
        ));
    }

    Ok(account)
}
