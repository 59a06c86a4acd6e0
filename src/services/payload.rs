// opaque QR payloads for meal tickets

use crate::error::ServiceError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::NaiveDate;
use qrcode::render::svg;
use qrcode::QrCode;
use rand::{distr::Alphanumeric, Rng};
use uuid::Uuid;

const NONCE_LEN: usize = 24;

/// What a scanner reads off a ticket. The random nonce makes the encoded form
/// unguessable from the ticket id, and the owner + date bind it to one meal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionPayload {
    pub ticket_id: Uuid,
    pub owner_id: Uuid,
    pub meal_date: NaiveDate,
    nonce: String,
}

impl RedemptionPayload {
    pub fn generate(ticket_id: Uuid, owner_id: Uuid, meal_date: NaiveDate) -> Self {
        let nonce: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect();

        Self {
            ticket_id,
            owner_id,
            meal_date,
            nonce,
        }
    }

    pub fn encode(&self) -> String {
        let raw = format!(
            "{}:{}:{}:{}",
            self.ticket_id.simple(),
            self.owner_id.simple(),
            self.meal_date.format("%Y-%m-%d"),
            self.nonce
        );
        URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(encoded: &str) -> Result<Self, ServiceError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|_| ServiceError::MalformedPayload)?;
        let raw = String::from_utf8(bytes).map_err(|_| ServiceError::MalformedPayload)?;

        let parts: Vec<&str> = raw.split(':').collect();
        let [ticket_id, owner_id, meal_date, nonce] = parts.as_slice() else {
            return Err(ServiceError::MalformedPayload);
        };

        if nonce.len() != NONCE_LEN || !nonce.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ServiceError::MalformedPayload);
        }

        Ok(Self {
            ticket_id: Uuid::parse_str(ticket_id).map_err(|_| ServiceError::MalformedPayload)?,
            owner_id: Uuid::parse_str(owner_id).map_err(|_| ServiceError::MalformedPayload)?,
            meal_date: NaiveDate::parse_from_str(meal_date, "%Y-%m-%d")
                .map_err(|_| ServiceError::MalformedPayload)?,
            nonce: nonce.to_string(),
        })
    }
}

/// Renders the payload as an SVG QR code for the wallet screen.
pub fn render_qr_svg(payload: &str) -> Result<String, ServiceError> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| ServiceError::Internal(format!("Failed to build QR code: {}", e)))?;

    Ok(code
        .render()
        .min_dimensions(200, 200)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RedemptionPayload {
        RedemptionPayload::generate(
            Uuid::new_v4(),
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        )
    }

    #[test]
    fn decode_recovers_bound_fields() {
        let payload = sample();
        let decoded = RedemptionPayload::decode(&payload.encode()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn same_ticket_gets_different_payloads() {
        let ticket_id = Uuid::new_v4();
        let owner_id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        let a = RedemptionPayload::generate(ticket_id, owner_id, date).encode();
        let b = RedemptionPayload::generate(ticket_id, owner_id, date).encode();
        assert_ne!(a, b);
        assert!(!a.contains(&ticket_id.to_string()));
    }

    #[test]
    fn garbage_is_malformed() {
        for input in ["", "not base64 !!", "Zm9vOmJhcg", "a:b:c:d"] {
            assert!(
                matches!(
                    RedemptionPayload::decode(input),
                    Err(ServiceError::MalformedPayload)
                ),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn tampered_date_is_malformed() {
        let payload = sample();
        let raw = format!(
            "{}:{}:2025-13-40:{}",
            payload.ticket_id.simple(),
            payload.owner_id.simple(),
            "a".repeat(NONCE_LEN)
        );
        let encoded = URL_SAFE_NO_PAD.encode(raw);
        assert!(RedemptionPayload::decode(&encoded).is_err());
    }

    #[test]
    fn short_nonce_is_malformed() {
        let payload = sample();
        let raw = format!(
            "{}:{}:2025-03-01:abc",
            payload.ticket_id.simple(),
            payload.owner_id.simple()
        );
        assert!(RedemptionPayload::decode(&URL_SAFE_NO_PAD.encode(raw)).is_err());
    }

    #[test]
    fn qr_svg_renders() {
        let svg = render_qr_svg(&sample().encode()).unwrap();
        assert!(svg.contains("<svg"));
    }
}
