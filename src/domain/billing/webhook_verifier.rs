//! Stripe webhook signature verification.
//!
//! HMAC-SHA256 over `"{timestamp}.{payload}"` keyed with the endpoint's
//! signing secret, with a timestamp window against replays.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::stripe_event::StripeEvent;
use super::webhook_errors::WebhookError;

/// Maximum allowed age for webhook events (5 minutes).
const MAX_EVENT_AGE_SECS: i64 = 300;

/// Maximum allowed clock skew for future events (1 minute).
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Parsed components from the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix timestamp when the signature was generated.
    pub timestamp: i64,
    /// Every v1 signature on the header. Stripe sends more than one while
    /// a rolled secret is still valid.
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parses a Stripe-Signature header string.
    ///
    /// Format: `t=<timestamp>,v1=<signature>[,v1=<signature>][,v0=<legacy>]`
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| WebhookError::ParseError("invalid header format".to_string()))?;

            match key.trim() {
                "t" => {
                    timestamp = Some(value.trim().parse().map_err(|_| {
                        WebhookError::ParseError("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    v1_signatures.push(hex::decode(value.trim()).map_err(|_| {
                        WebhookError::ParseError("invalid v1 signature hex".to_string())
                    })?);
                }
                // v0 is Stripe's test-only scheme; never trusted.
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| WebhookError::ParseError("missing timestamp".to_string()))?;
        if v1_signatures.is_empty() {
            return Err(WebhookError::ParseError("missing v1 signature".to_string()));
        }

        Ok(SignatureHeader {
            timestamp,
            v1_signatures,
        })
    }
}

/// Verifier for Stripe webhook signatures.
pub struct StripeWebhookVerifier {
    secret: SecretString,
}

impl StripeWebhookVerifier {
    /// Creates a new verifier with the given webhook secret.
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Verifies the webhook signature and parses the event.
    ///
    /// # Errors
    ///
    /// - `InvalidSignature` - no v1 signature matches
    /// - `TimestampOutOfRange` - Event is older than 5 minutes
    /// - `InvalidTimestamp` - Event timestamp is in the future
    /// - `ParseError` - Failed to parse header or JSON payload
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent, WebhookError> {
        self.verify_at(payload, signature_header, chrono::Utc::now().timestamp())
    }

    fn verify_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> Result<StripeEvent, WebhookError> {
        let header = SignatureHeader::parse(signature_header)?;

        validate_timestamp(header.timestamp, now)?;

        let expected = self.compute_signature(header.timestamp, payload)?;
        let matched = header
            .v1_signatures
            .iter()
            .any(|candidate| constant_time_compare(&expected, candidate));
        if !matched {
            return Err(WebhookError::InvalidSignature);
        }

        serde_json::from_slice(payload).map_err(|e| WebhookError::ParseError(e.to_string()))
    }

    fn compute_signature(&self, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::InvalidSignature)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Validates that the timestamp is within acceptable bounds.
fn validate_timestamp(timestamp: i64, now: i64) -> Result<(), WebhookError> {
    // `t=` is caller-controlled; an unrepresentable age is out of range.
    let age = now
        .checked_sub(timestamp)
        .ok_or(WebhookError::TimestampOutOfRange)?;

    if age > MAX_EVENT_AGE_SECS {
        return Err(WebhookError::TimestampOutOfRange);
    }
    if age < -MAX_CLOCK_SKEW_SECS {
        return Err(WebhookError::InvalidTimestamp);
    }

    Ok(())
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Builds a valid `Stripe-Signature` header for `payload`.
///
/// Used by tests and local tooling that replays captured events.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &str) -> String {
    // HMAC-SHA256 accepts keys of any length.
    let signature = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map(|mut mac| {
            mac.update(format!("{}.{}", timestamp, payload).as_bytes());
            hex::encode(mac.finalize().into_bytes())
        })
        .unwrap_or_default();
    format!("t={},v1={}", timestamp, signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "whsec_test_secret_12345";

    fn verifier(secret: &str) -> StripeWebhookVerifier {
        StripeWebhookVerifier::new(SecretString::new(secret.to_string()))
    }

    // ══════════════════════════════════════════════════════════════
    // SignatureHeader Parsing Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn parse_header_with_v1_only() {
        let header_str = format!("t=1234567890,v1={}", "a".repeat(64));

        let header = SignatureHeader::parse(&header_str).unwrap();

        assert_eq!(header.timestamp, 1234567890);
        assert_eq!(header.v1_signatures.len(), 1);
        assert_eq!(header.v1_signatures[0].len(), 32);
    }

    #[test]
    fn parse_header_collects_every_v1() {
        let header_str = format!(
            "t=1234567890,v1={},v1={},v0={}",
            "a".repeat(64),
            "b".repeat(64),
            "c".repeat(64)
        );

        let header = SignatureHeader::parse(&header_str).unwrap();

        assert_eq!(header.v1_signatures.len(), 2);
    }

    #[test]
    fn parse_header_ignores_unknown_fields() {
        let header_str = format!("t=1234567890,v1={},v2=future,scheme=hmac", "a".repeat(64));

        let header = SignatureHeader::parse(&header_str).unwrap();

        assert_eq!(header.timestamp, 1234567890);
    }

    #[test]
    fn parse_header_missing_timestamp_fails() {
        let result = SignatureHeader::parse(&format!("v1={}", "a".repeat(64)));
        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }

    #[test]
    fn parse_header_missing_v1_fails() {
        let result = SignatureHeader::parse("t=1234567890");
        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }

    #[test]
    fn parse_header_only_v0_fails() {
        let result = SignatureHeader::parse(&format!("t=1,v0={}", "a".repeat(64)));
        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }

    #[test]
    fn parse_header_invalid_hex_fails() {
        let result = SignatureHeader::parse("t=1234567890,v1=not_valid_hex");
        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }

    #[test]
    fn parse_header_no_equals_fails() {
        let result = SignatureHeader::parse("t1234567890");
        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }

    // ══════════════════════════════════════════════════════════════
    // Signature Verification Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn verify_valid_signature() {
        let payload = r#"{"id":"evt_test123","type":"checkout.session.completed","created":1704067200,"data":{"object":{}},"livemode":false,"api_version":"2023-10-16"}"#;
        let timestamp = chrono::Utc::now().timestamp();
        let header = sign_payload(TEST_SECRET, timestamp, payload);

        let event = verifier(TEST_SECRET)
            .verify_and_parse(payload.as_bytes(), &header)
            .unwrap();

        assert_eq!(event.id, "evt_test123");
    }

    #[test]
    fn verify_accepts_any_matching_v1() {
        let payload = r#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#;
        let timestamp = chrono::Utc::now().timestamp();
        let good = sign_payload(TEST_SECRET, timestamp, payload);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", timestamp, "0".repeat(64), good_sig);

        assert!(verifier(TEST_SECRET)
            .verify_and_parse(payload.as_bytes(), &header)
            .is_ok());
    }

    #[test]
    fn verify_invalid_signature_fails() {
        let payload = r#"{"id":"evt_test"}"#;
        let header = format!("t={},v1={}", chrono::Utc::now().timestamp(), "a".repeat(64));

        let result = verifier(TEST_SECRET).verify_and_parse(payload.as_bytes(), &header);

        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn verify_wrong_secret_fails() {
        let payload = r#"{"id":"evt_test"}"#;
        let header = sign_payload(TEST_SECRET, chrono::Utc::now().timestamp(), payload);

        let result = verifier("wrong_secret").verify_and_parse(payload.as_bytes(), &header);

        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn verify_tampered_payload_fails() {
        let header = sign_payload(
            TEST_SECRET,
            chrono::Utc::now().timestamp(),
            r#"{"id":"evt_test"}"#,
        );

        let result =
            verifier(TEST_SECRET).verify_and_parse(br#"{"id":"evt_hacked"}"#, &header);

        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn verify_invalid_json_fails_after_signature_check() {
        let payload = "not valid json";
        let header = sign_payload(TEST_SECRET, chrono::Utc::now().timestamp(), payload);

        let result = verifier(TEST_SECRET).verify_and_parse(payload.as_bytes(), &header);

        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }

    // ══════════════════════════════════════════════════════════════
    // Timestamp Validation Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn timestamp_within_range_succeeds() {
        assert!(validate_timestamp(1_000 - 120, 1_000).is_ok());
    }

    #[test]
    fn timestamp_at_boundary_succeeds() {
        assert!(validate_timestamp(1_000 - 300, 1_000).is_ok());
    }

    #[test]
    fn timestamp_just_past_boundary_fails() {
        assert!(matches!(
            validate_timestamp(1_000 - 301, 1_000),
            Err(WebhookError::TimestampOutOfRange)
        ));
    }

    #[test]
    fn timestamp_from_future_with_skew_succeeds() {
        assert!(validate_timestamp(1_000 + 30, 1_000).is_ok());
    }

    #[test]
    fn timestamp_from_future_beyond_skew_fails() {
        assert!(matches!(
            validate_timestamp(1_000 + 120, 1_000),
            Err(WebhookError::InvalidTimestamp)
        ));
    }

    #[test]
    fn stale_delivery_rejected_even_with_valid_signature() {
        let payload = r#"{"id":"evt_old","type":"invoice.paid","data":{"object":{}}}"#;
        let header = sign_payload(TEST_SECRET, 1_000, payload);

        let result = verifier(TEST_SECRET).verify_at(payload.as_bytes(), &header, 2_000);

        assert!(matches!(result, Err(WebhookError::TimestampOutOfRange)));
    }

    #[test]
    fn extreme_timestamps_are_rejected_without_overflow() {
        assert!(matches!(
            validate_timestamp(i64::MIN, 1_000),
            Err(WebhookError::TimestampOutOfRange)
        ));
        assert!(matches!(
            validate_timestamp(i64::MAX, 1_000),
            Err(WebhookError::InvalidTimestamp)
        ));
        assert!(matches!(
            validate_timestamp(i64::MAX, -1_000),
            Err(WebhookError::InvalidTimestamp)
        ));
    }

    #[test]
    fn extreme_header_timestamps_are_rejected() {
        let v = verifier(TEST_SECRET);

        let oldest = format!("t={},v1=aa", i64::MIN);
        assert!(matches!(
            v.verify_and_parse(b"{}", &oldest),
            Err(WebhookError::TimestampOutOfRange)
        ));

        let newest = format!("t={},v1=aa", i64::MAX);
        assert!(matches!(
            v.verify_and_parse(b"{}", &newest),
            Err(WebhookError::InvalidTimestamp)
        ));
    }

    // ══════════════════════════════════════════════════════════════
    // Constant Time Comparison Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn constant_time_compare_behaviour() {
        assert!(constant_time_compare(&[1, 2, 3], &[1, 2, 3]));
        assert!(!constant_time_compare(&[1, 2, 3], &[1, 2, 4]));
        assert!(!constant_time_compare(&[1, 2, 3], &[1, 2, 3, 4]));
        assert!(constant_time_compare(&[], &[]));
    }
}
