//! HMAC-SHA256 signing of delivery bodies.

use fieldops_core::{AppError, AppResult};
use fieldops_domain::WebhookSecret;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Returns the lowercase hex HMAC-SHA256 of `body` keyed by `secret`.
pub fn sign_webhook_payload(body: &[u8], secret: &WebhookSecret) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_bytes())
        .map_err(|error| AppError::Internal(format!("failed to initialize HMAC: {error}")))?;
    mac.update(body);

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a hex signature against `body` in constant time.
///
/// Malformed hex never verifies.
#[must_use]
pub fn verify_webhook_signature(body: &[u8], signature: &str, secret: &WebhookSecret) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.expose_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(expected.as_slice()).is_ok()
}
