// src/auth/token.rs
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

/// Tokens this close to expiry are treated as already expired.
pub const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    pub exp: Option<i64>,
}

/// Decode the (unverified) payload segment of a JWT.
/// We only read `exp` to decide when to refresh; the vendor verifies.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| debug!(error = %e, "jwt payload is not base64url"))
        .ok()?;
    serde_json::from_slice(&bytes)
        .map_err(|e| debug!(error = %e, "jwt payload is not json"))
        .ok()
}

/// True when the token carries an `exp` more than a minute in the future.
pub fn is_token_valid(token: &str, now_secs: i64) -> bool {
    decode_claims(token)
        .and_then(|c| c.exp)
        .is_some_and(|exp| exp > now_secs + EXPIRY_SKEW_SECS)
}

#[cfg(test)]
pub(crate) fn make_jwt(payload: &serde_json::Value) -> String {
    let enc = &base64::engine::general_purpose::URL_SAFE_NO_PAD;
    format!(
        "{}.{}.sig",
        enc.encode(br#"{"alg":"RS256","typ":"JWT"}"#),
        enc.encode(payload.to_string())
    )
}
