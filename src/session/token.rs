//! Access-token inspection. Only the payload segment is read; the signature is
//! the backend's business.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{SessionError, SessionResult};

#[derive(Debug, Deserialize)]
struct ExpClaim {
    exp: f64,
}

/// Decode the `exp` claim (seconds since epoch) of a JWT-shaped token.
pub fn expiry_of(token: &str) -> SessionResult<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_sig), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
        return Err(SessionError::token("expected three dot-separated segments"));
    };
    // some issuers pad, most don't
    let payload = payload.trim_end_matches('=');
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| SessionError::token(format!("payload is not base64url: {e}")))?;
    let claim: ExpClaim = serde_json::from_slice(&bytes)
        .map_err(|e| SessionError::token(format!("payload has no numeric exp: {e}")))?;
    if !claim.exp.is_finite() {
        return Err(SessionError::token("exp is not finite"));
    }
    DateTime::<Utc>::from_timestamp_millis((claim.exp * 1000.0) as i64)
        .ok_or_else(|| SessionError::token("exp out of range"))
}

/// Time left before `token` expires at `now`. Undecodable tokens count as
/// already expired.
pub fn time_left(token: &str, now: DateTime<Utc>) -> chrono::Duration {
    match expiry_of(token) {
        Ok(exp) => exp - now,
        Err(e) => {
            tracing::warn!(target: "monitor", error = %e, "access token unreadable; treating as expired");
            chrono::Duration::zero()
        }
    }
}

/// Build an unsigned token with the given `exp`, for fixtures.
pub fn unsigned_with_exp(exp: DateTime<Utc>) -> String {
    let enc = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let header = enc.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = enc.encode(serde_json::json!({ "exp": exp.timestamp() }).to_string());
    format!("{header}.{payload}.sig")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_exp_claim() {
        let exp = DateTime::<Utc>::from_timestamp(1_900_000_000, 0).unwrap();
        let tok = unsigned_with_exp(exp);
        assert_eq!(expiry_of(&tok).unwrap(), exp);
    }

    #[test]
    fn padded_payload_accepted() {
        let enc = base64::engine::general_purpose::URL_SAFE;
        let tok = format!("h.{}.s", enc.encode(r#"{"exp":1700000000,"sub":"u"}"#));
        assert_eq!(expiry_of(&tok).unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn malformed_tokens_are_errors() {
        for bad in ["", "abc", "a.b", "a.!!!.c", "a.b.c.d"] {
            assert!(matches!(expiry_of(bad), Err(SessionError::TokenDecode { .. })), "{bad}");
        }
        let enc = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let no_exp = format!("h.{}.s", enc.encode(r#"{"sub":"u"}"#));
        assert!(expiry_of(&no_exp).is_err());
    }

    #[test]
    fn undecodable_token_has_no_time_left() {
        let now = Utc::now();
        assert!(time_left("garbage", now) <= chrono::Duration::zero());
        let tok = unsigned_with_exp(now + chrono::Duration::seconds(30));
        let left = time_left(&tok, now);
        assert!(left > chrono::Duration::seconds(28) && left <= chrono::Duration::seconds(30));
    }
}
