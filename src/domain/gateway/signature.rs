//! Webhook signature verification.
//!
//! Both providers sign with HMAC-SHA256 and a shared webhook secret.
//! Stripe signs `"{timestamp}.{body}"` and sends the timestamp alongside
//! the signature; Razorpay signs the raw body.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::WebhookError;

/// Maximum allowed age for webhook events (5 minutes).
pub const MAX_EVENT_AGE_SECS: i64 = 300;

/// Maximum allowed clock skew for future events (1 minute).
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

type HmacSha256 = Hmac<Sha256>;

/// Parsed components from the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripeSignatureHeader {
    /// Unix timestamp when the signature was generated.
    pub timestamp: i64,
    /// v1 signatures (HMAC-SHA256); several are sent while a secret rolls.
    pub v1_signatures: Vec<Vec<u8>>,
}

impl StripeSignatureHeader {
    /// Parses a Stripe-Signature header string.
    ///
    /// Format: `t=<timestamp>,v1=<signature>[,v1=<signature>][,v0=<legacy>]`
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::ParseError` if the header format is invalid.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| WebhookError::ParseError("invalid header format".to_string()))?;

            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        WebhookError::ParseError("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    v1_signatures.push(hex::decode(value).map_err(|_| {
                        WebhookError::ParseError("invalid v1 signature hex".to_string())
                    })?);
                }
                // v0 and unknown schemes are ignored
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| WebhookError::ParseError("missing timestamp".to_string()))?;
        if v1_signatures.is_empty() {
            return Err(WebhookError::ParseError("missing v1 signature".to_string()));
        }

        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }
}

/// Verifies a Stripe delivery against `secret` at wall-clock time `now`.
///
/// # Errors
///
/// - `ParseError` - malformed header
/// - `TimestampOutOfRange` - older than five minutes
/// - `InvalidTimestamp` - too far in the future
/// - `InvalidSignature` - no v1 signature matches
pub fn verify_stripe_signature(
    secret: &[u8],
    payload: &[u8],
    header: &str,
    now: i64,
) -> Result<(), WebhookError> {
    let header = StripeSignatureHeader::parse(header)?;

    let age = now - header.timestamp;
    if age > MAX_EVENT_AGE_SECS {
        return Err(WebhookError::TimestampOutOfRange);
    }
    if age < -MAX_CLOCK_SKEW_SECS {
        return Err(WebhookError::InvalidTimestamp);
    }

    let expected = stripe_mac(secret, header.timestamp, payload)?;
    if header
        .v1_signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        Ok(())
    } else {
        Err(WebhookError::InvalidSignature)
    }
}

/// Verifies a Razorpay delivery: hex HMAC-SHA256 of the raw body.
pub fn verify_razorpay_signature(
    secret: &[u8],
    payload: &[u8],
    signature_hex: &str,
) -> Result<(), WebhookError> {
    let provided = hex::decode(signature_hex.trim()).map_err(|_| WebhookError::InvalidSignature)?;
    let expected = hmac_sha256(secret, payload)?;
    if constant_time_compare(&expected, &provided) {
        Ok(())
    } else {
        Err(WebhookError::InvalidSignature)
    }
}

/// Builds a Stripe-Signature header value for `payload`.
///
/// Used when replaying captured deliveries against a local instance.
pub fn sign_stripe_payload(
    secret: &[u8],
    timestamp: i64,
    payload: &[u8],
) -> Result<String, WebhookError> {
    let mac = stripe_mac(secret, timestamp, payload)?;
    Ok(format!("t={},v1={}", timestamp, hex::encode(mac)))
}

/// Builds an X-Razorpay-Signature header value for `payload`.
pub fn sign_razorpay_payload(secret: &[u8], payload: &[u8]) -> Result<String, WebhookError> {
    Ok(hex::encode(hmac_sha256(secret, payload)?))
}

fn stripe_mac(secret: &[u8], timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
    let mut signed = Vec::with_capacity(payload.len() + 16);
    signed.extend_from_slice(timestamp.to_string().as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(payload);
    hmac_sha256(secret, &signed)
}

fn hmac_sha256(secret: &[u8], message: &[u8]) -> Result<Vec<u8>, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Performs constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
