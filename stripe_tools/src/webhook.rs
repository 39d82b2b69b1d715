//! Verification of the `Stripe-Signature` header sent with every webhook request.
//!
//! The header looks like `t=1700000000,v1=5257a8...,v1=...`. Each `v1` entry is a hex-encoded HMAC-SHA256 of
//! `"{t}.{raw body}"` keyed with the endpoint's webhook secret. More than one `v1` entry is present while a secret is
//! being rolled, so a match against any of them is accepted.
use chrono::Utc;
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;

use crate::{StripeApiError, WebhookEvent};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

fn signing_mac(payload: &[u8], secret: &str, timestamp: i64) -> Result<HmacSha256, StripeApiError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| StripeApiError::InvalidSignatureHeader(format!("Unusable webhook secret. {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Produces the hex signature Stripe would send for `payload` at `timestamp`.
pub fn compute_signature(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, StripeApiError> {
    let mac = signing_mac(payload, secret, timestamp)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn parse_signature_header(header: &str) -> Result<SignatureHeader, StripeApiError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                let t = value
                    .parse::<i64>()
                    .map_err(|e| StripeApiError::InvalidSignatureHeader(format!("Invalid timestamp '{value}'. {e}")))?;
                timestamp = Some(t);
            },
            "v1" => signatures.push(value.to_string()),
            // v0 (test mode legacy) and unknown schemes are ignored
            _ => {},
        }
    }
    let timestamp =
        timestamp.ok_or_else(|| StripeApiError::InvalidSignatureHeader("No timestamp in header".to_string()))?;
    if signatures.is_empty() {
        return Err(StripeApiError::InvalidSignatureHeader("No v1 signature in header".to_string()));
    }
    Ok(SignatureHeader { timestamp, signatures })
}

/// Checks `header` against the raw request body.
///
/// `now` is a unix timestamp. Signatures older than `tolerance` seconds are refused even if they match.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance: u64,
    now: i64,
) -> Result<(), StripeApiError> {
    let header = parse_signature_header(header)?;
    let mac = signing_mac(payload, secret, header.timestamp)?;
    let matched = header
        .signatures
        .iter()
        .filter_map(|s| hex::decode(s).ok())
        .any(|sig| mac.clone().verify_slice(&sig).is_ok());
    if !matched {
        return Err(StripeApiError::SignatureMismatch);
    }
    let age = now - header.timestamp;
    if age > i64::try_from(tolerance).unwrap_or(i64::MAX) {
        return Err(StripeApiError::TimestampOutsideTolerance { age, tolerance });
    }
    Ok(())
}

/// Verifies the signature and deserializes the event.
pub fn construct_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance: u64,
) -> Result<WebhookEvent, StripeApiError> {
    verify_signature(payload, header, secret, tolerance, Utc::now().timestamp())?;
    let event = serde_json::from_slice::<WebhookEvent>(payload)
        .map_err(|e| StripeApiError::InvalidPayload(format!("Could not parse webhook event. {e}")))?;
    trace!("💳️ Verified webhook event {} ({})", event.id, event.event_type);
    Ok(event)
}
