//! Webhook signature verification.
//!
//! GitHub signs every delivery with HMAC-SHA256 over the exact raw request
//! bytes and sends the result in `X-Hub-Signature-256` as `sha256=<hex>`.
//! Verification must therefore run against the wire bytes, never a
//! re-serialized payload, and must compare in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Outcome of verifying one delivery.
///
/// `InsecureBypass` is deliberately distinct from `Verified`: running without
/// a configured secret accepts deliveries but must never be mistaken for
/// cryptographic verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureOutcome {
    /// Signature matched the shared secret.
    Verified,
    /// No secret configured; the delivery is accepted unverified.
    InsecureBypass,
    /// Signature missing, malformed, or mismatched.
    Rejected,
}

impl SignatureOutcome {
    /// Whether the delivery should be accepted.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Verify a webhook delivery signature.
///
/// # Arguments
///
/// * `secret` - The shared webhook secret; `None` or empty enables the
///   insecure development bypass
/// * `signature_header` - The `X-Hub-Signature-256` value (`sha256=<hex>`)
/// * `body` - The exact raw request bytes
pub fn verify_signature(
    secret: Option<&str>,
    signature_header: Option<&str>,
    body: &[u8],
) -> SignatureOutcome {
    let secret = match secret {
        Some(s) if !s.is_empty() => s,
        _ => {
            warn!("webhook secret not configured - accepting delivery WITHOUT verification");
            return SignatureOutcome::InsecureBypass;
        }
    };

    let header = match signature_header {
        Some(h) => h,
        None => {
            warn!("missing X-Hub-Signature-256 header");
            return SignatureOutcome::Rejected;
        }
    };

    if !header.starts_with(SIGNATURE_PREFIX) {
        warn!("invalid signature header format: missing 'sha256=' prefix");
        return SignatureOutcome::Rejected;
    }

    // Hex decoding is case-insensitive, which covers senders that emit
    // uppercase digests.
    let claimed = match hex::decode(&header[SIGNATURE_PREFIX.len()..]) {
        Ok(bytes) => bytes,
        Err(_) => {
            warn!("invalid signature header format: bad hex encoding");
            return SignatureOutcome::Rejected;
        }
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return SignatureOutcome::Rejected,
    };
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    // Length check is not secret-dependent; the digest comparison is the
    // part that must be constant time.
    if claimed.len() != expected.len() {
        return SignatureOutcome::Rejected;
    }

    if claimed.ct_eq(expected.as_slice()).into() {
        debug!("webhook signature verified");
        SignatureOutcome::Verified
    } else {
        warn!("webhook signature mismatch");
        SignatureOutcome::Rejected
    }
}

/// Compute the `sha256=<hex>` header value for a payload.
///
/// Used by tests and by outbound deliveries that sign their own payloads.
pub fn compute_signature_header(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
