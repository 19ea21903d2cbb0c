//! # Callback Signatures
//!
//! `X-Gateway-Signature: t=<unix seconds>,v1=<hex hmac>` where the HMAC-SHA256
//! is taken over `"<t>.<raw body>"` with the shared webhook secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use shop_core::{CheckoutError, CheckoutResult};

/// Header carrying the signature
pub const SIGNATURE_HEADER: &str = "X-Gateway-Signature";

/// Accepted clock skew, in seconds
pub const TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_signature_header(header: &str) -> CheckoutResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        CheckoutError::NotificationVerificationFailed("Missing timestamp in signature".to_string())
    })?;

    if signatures.is_empty() {
        return Err(CheckoutError::NotificationVerificationFailed(
            "No v1 signature found".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn compute_hmac_sha256(secret: &str, message: &[u8]) -> CheckoutResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CheckoutError::Configuration(format!("Invalid webhook secret: {}", e)))?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn signed_payload(timestamp: i64, payload: &[u8]) -> Vec<u8> {
    let mut message = format!("{}.", timestamp).into_bytes();
    message.extend_from_slice(payload);
    message
}

/// Build a header value for `payload` at `timestamp`
pub fn sign(secret: &str, payload: &[u8], timestamp: i64) -> CheckoutResult<String> {
    let signature = compute_hmac_sha256(secret, &signed_payload(timestamp, payload))?;
    Ok(format!("t={},v1={}", timestamp, signature))
}

/// Check a header value against `payload`, with `now` in unix seconds
pub fn verify(secret: &str, payload: &[u8], header: &str, now: i64) -> CheckoutResult<()> {
    let parsed = parse_signature_header(header)?;

    if now.abs_diff(parsed.timestamp) > TOLERANCE_SECS.unsigned_abs() {
        return Err(CheckoutError::NotificationVerificationFailed(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    let expected = compute_hmac_sha256(secret, &signed_payload(parsed.timestamp, payload))?;
    if parsed
        .signatures
        .iter()
        .any(|sig| constant_time_compare(sig, &expected))
    {
        Ok(())
    } else {
        Err(CheckoutError::NotificationVerificationFailed(
            "Signature mismatch".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "gw_secret";
    const BODY: &[u8] = br#"{"intentId":"intent_1","status":"succeeded"}"#;

    #[test]
    fn test_parse_signature_header() {
        let parsed = parse_signature_header("t=1234567890, v1=abc123,v1=def456").unwrap();
        assert_eq!(parsed.timestamp, 1234567890);
        assert_eq!(parsed.signatures, vec!["abc123", "def456"]);

        assert!(parse_signature_header("v1=abc").is_err());
        assert!(parse_signature_header("t=1").is_err());
    }

    #[test]
    fn test_sign_then_verify() {
        let header = sign(SECRET, BODY, 1_700_000_000).unwrap();
        assert!(verify(SECRET, BODY, &header, 1_700_000_100).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = sign(SECRET, BODY, 1_700_000_000).unwrap();
        let tampered = br#"{"intentId":"intent_1","status":"cancelled"}"#;
        assert!(matches!(
            verify(SECRET, tampered, &header, 1_700_000_000),
            Err(CheckoutError::NotificationVerificationFailed(_))
        ));
        assert!(verify("other", BODY, &header, 1_700_000_000).is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let header = sign(SECRET, BODY, 1_700_000_000).unwrap();
        assert!(verify(SECRET, BODY, &header, 1_700_000_000 + TOLERANCE_SECS + 1).is_err());
    }

    #[test]
    fn test_extreme_timestamps_rejected_without_overflow() {
        let header = format!("t={},v1=00", i64::MIN);
        assert!(matches!(
            verify(SECRET, BODY, &header, 1_700_000_000),
            Err(CheckoutError::NotificationVerificationFailed(_))
        ));

        let header = sign(SECRET, BODY, i64::MIN).unwrap();
        assert!(verify(SECRET, BODY, &header, i64::MAX).is_err());

        let header = sign(SECRET, BODY, i64::MAX).unwrap();
        assert!(verify(SECRET, BODY, &header, i64::MIN).is_err());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc123", "abc123"));
        assert!(!constant_time_compare("abc123", "abc124"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
