use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Invalid webhook signature")]
    InvalidSignature,
    #[error("Webhook timestamp outside tolerance window: skew {0}s")]
    StaleTimestamp(i64),
    #[error("Malformed webhook header: {0}")]
    MalformedHeader(String),
}

/// Verify a provider lifecycle delivery.
///
/// The provider signs `"v0:{timestamp}:{raw_body}"` with HMAC-SHA256 and
/// sends the hex digest as `v0=<hex>`. Comparison runs through
/// `Mac::verify_slice`, which is constant-time. Deliveries older (or newer)
/// than `tolerance_secs` are rejected regardless of signature.
pub fn verify_signature(
    secret: &[u8],
    body: &[u8],
    signature_header: &str,
    timestamp_header: &str,
    now_epoch_secs: i64,
    tolerance_secs: i64,
) -> Result<(), WebhookError> {
    let timestamp: i64 = timestamp_header
        .trim()
        .parse()
        .map_err(|_| WebhookError::MalformedHeader(timestamp_header.to_string()))?;

    let skew = now_epoch_secs - timestamp;
    if skew.abs() > tolerance_secs {
        return Err(WebhookError::StaleTimestamp(skew));
    }

    let provided = signature_header
        .strip_prefix("v0=")
        .ok_or_else(|| WebhookError::MalformedHeader(signature_header.to_string()))?;
    let provided = hex::decode(provided).map_err(|_| WebhookError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(format!("v0:{timestamp}:").as_bytes());
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| WebhookError::InvalidSignature)
}

/// Sign a delivery the way the provider does. Used to build test fixtures
/// and by the URL-validation handshake below.
pub fn sign(secret: &[u8], timestamp: i64, body: &[u8]) -> String {
    match HmacSha256::new_from_slice(secret) {
        Ok(mut mac) => {
            mac.update(format!("v0:{timestamp}:").as_bytes());
            mac.update(body);
            hex::encode(mac.finalize().into_bytes())
        }
        // HMAC accepts keys of any length; unreachable in practice.
        Err(_) => String::new(),
    }
}

/// Answer to the one-time URL-ownership challenge: the hex digest of
/// `HMAC-SHA256(secret, plain_token)`. No timestamp or signature involved.
pub fn challenge_response(secret: &[u8], plain_token: &str) -> String {
    match HmacSha256::new_from_slice(secret) {
        Ok(mut mac) => {
            mac.update(plain_token.as_bytes());
            hex::encode(mac.finalize().into_bytes())
        }
        // HMAC accepts keys of any length; unreachable in practice.
        Err(_) => String::new(),
    }
}
