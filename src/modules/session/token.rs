use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::services::sync::types::SyncError;

#[derive(Debug, Deserialize)]
struct TokenPayload {
    exp: i64,
}

/// Read the expiry claim out of a JWT without verifying the signature.
/// The backend owns the signing key; the client only needs `exp` to know
/// when to refresh.
pub fn token_expiry(token: &str) -> Result<DateTime<Utc>, SyncError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| SyncError::Token("missing payload segment".into()))?;
    let raw = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| SyncError::Token(format!("payload is not base64url: {e}")))?;
    let claims: TokenPayload =
        serde_json::from_slice(&raw).map_err(|e| SyncError::Token(format!("bad claims: {e}")))?;
    Utc.timestamp_opt(claims.exp, 0)
        .single()
        .ok_or_else(|| SyncError::Token("expiry out of range".into()))
}

/// When the single-shot refresh should fire for a token expiring at
/// `expiry`. A token already inside the lead window refreshes immediately.
pub fn refresh_at(expiry: DateTime<Utc>, lead_secs: u64) -> DateTime<Utc> {
    expiry - chrono::Duration::seconds(lead_secs as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsigned_token(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"u-1","exp":{exp}}}"#));
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn test_expiry_decodes_from_payload_segment() {
        let exp = Utc::now().timestamp() + 600;
        let token = unsigned_token(exp);
        assert_eq!(token_expiry(&token).unwrap().timestamp(), exp);
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        assert!(matches!(token_expiry("not-a-jwt"), Err(SyncError::Token(_))));
        assert!(matches!(token_expiry("a.!!!.c"), Err(SyncError::Token(_))));
    }

    #[test]
    fn test_refresh_fires_lead_time_before_expiry() {
        let expiry = Utc.timestamp_opt(1_000_000, 0).single().unwrap();
        let at = refresh_at(expiry, 300);
        assert_eq!((expiry - at).num_seconds(), 300);
    }
}
