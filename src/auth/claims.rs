// Access token claims decoding
// Reads the expiry out of the token's base64url JSON payload segment

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::DecodeError;

/// Claims needed to schedule renewal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claims {
    /// Expiry, seconds since the Unix epoch
    pub exp: i64,
}

impl Claims {
    /// Expiry as a timestamp, if representable
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Deserialize)]
struct RawClaims {
    exp: serde_json::Number,
}

/// Decode the payload segment of `token`.
///
/// The token is never verified, only inspected: the server remains the
/// authority on validity.
pub fn decode_claims(token: &str) -> Result<Claims, DecodeError> {
    let payload = token
        .split('.')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .ok_or(DecodeError::MissingPayload)?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| DecodeError::Base64(e.to_string()))?;

    let raw: RawClaims =
        serde_json::from_slice(&bytes).map_err(|e| DecodeError::Json(e.to_string()))?;

    // Some issuers emit fractional seconds
    let exp = raw
        .exp
        .as_i64()
        .or_else(|| raw.exp.as_f64().map(|f| f.floor() as i64))
        .ok_or_else(|| DecodeError::Json(format!("exp out of range: {}", raw.exp)))?;

    Ok(Claims { exp })
}

/// True if the token is expired or its claims cannot be read
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now())
}

/// True if the token expires within `threshold` or its claims cannot be read
pub fn is_expiring_soon(token: &str, threshold: Duration) -> bool {
    is_expiring_soon_at(token, threshold, Utc::now())
}

pub(crate) fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    match decode_claims(token) {
        Ok(claims) => claims.exp <= now.timestamp(),
        Err(e) => {
            tracing::debug!("Treating undecodable access token as expired: {}", e);
            true
        }
    }
}

pub(crate) fn is_expiring_soon_at(token: &str, threshold: Duration, now: DateTime<Utc>) -> bool {
    match decode_claims(token) {
        Ok(claims) => {
            let horizon_ms = now.timestamp_millis() + threshold.num_milliseconds();
            claims.exp.saturating_mul(1000) < horizon_ms
        }
        Err(e) => {
            tracing::debug!("Treating undecodable access token as expiring: {}", e);
            true
        }
    }
}

/// Build an unsigned token carrying `exp`
#[cfg(test)]
pub(crate) fn encode_test_token(exp: i64) -> String {
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"user-1","exp":{}}}"#, exp));
    format!("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.{}.c2lnbmF0dXJl", payload)
}
