// bearer token verification; sign-in itself lives with the identity provider

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // account ID
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
        }
    }

    pub fn verify_token(&self, token: &str) -> Result<Uuid> {
        debug!("🔍 Verifying token: {}...", token_preview(token));

        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 60;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )?;

        let account_id = Uuid::parse_str(&token_data.claims.sub).map_err(|e| {
            warn!("❌ Token subject is not an account id: {}", e);
            anyhow!("Invalid token subject")
        })?;

        debug!(
            "✅ Token verified for account: {} (jti: {})",
            account_id, token_data.claims.jti
        );

        Ok(account_id)
    }

    /// Issues a token for `account_id`. Used by tooling and tests; production
    /// tokens come from the sign-in provider sharing the same secret.
    pub fn generate_token(&self, account_id: Uuid, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(ttl)
            .ok_or_else(|| anyhow!("Invalid timestamp calculation"))?
            .timestamp();

        let random_bytes: [u8; 16] = rand::rng().random();
        let claims = Claims {
            sub: account_id.to_string(),
            exp: expiration,
            iat: now.timestamp(),
            jti: format!("{}-{}", account_id.simple(), hex::encode(random_bytes)),
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?)
    }
}

fn token_preview(token: &str) -> String {
    token.chars().take(20).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies() {
        let auth = AuthService::new("test-secret");
        let id = Uuid::new_v4();
        let token = auth.generate_token(id, Duration::hours(1)).unwrap();
        assert_eq!(auth.verify_token(&token).unwrap(), id);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = AuthService::new("one")
            .generate_token(Uuid::new_v4(), Duration::hours(1))
            .unwrap();
        assert!(AuthService::new("two").verify_token(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = AuthService::new("test-secret");
        let token = auth
            .generate_token(Uuid::new_v4(), Duration::hours(-2))
            .unwrap();
        assert!(auth.verify_token(&token).is_err());
    }

    #[test]
    fn non_ascii_token_is_rejected_without_panicking() {
        let token = "ééééééééééééééééééééééé.payload.sig";
        assert_eq!(token_preview(token), "é".repeat(20));
        assert_eq!(token_preview("short"), "short");
        assert!(AuthService::new("test-secret").verify_token(token).is_err());
    }
}
