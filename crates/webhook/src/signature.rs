//! Webhook authenticity checks.
//!
//! GitHub signs the raw body with HMAC-SHA256 and sends
//! `X-Hub-Signature-256: sha256=<hex>`. GitLab cannot sign, so it echoes the
//! shared secret in `X-Gitlab-Token` instead.
use {
    hmac::{Hmac, Mac},
    sha2::Sha256,
    tracing::debug,
};

/// Header carrying the GitHub signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Header carrying the GitLab secret token.
pub const GITLAB_TOKEN_HEADER: &str = "x-gitlab-token";

type HmacSha256 = Hmac<Sha256>;

/// Signature header value for `body` under `secret`.
pub fn sign(body: &[u8], secret: &str) -> String {
    format!("sha256={}", hex::encode(digest(body, secret)))
}

/// Check a `sha256=<hex>` header against `body`.
pub fn verify(body: &[u8], secret: &str, header: &str) -> bool {
    let Some(given) = header.trim().strip_prefix("sha256=") else {
        debug!("signature header is missing the sha256= prefix");
        return false;
    };
    let Ok(given) = hex::decode(given) else {
        debug!("signature header is not valid hex");
        return false;
    };
    constant_time_eq(&digest(body, secret), &given)
}

/// Check a plain shared token.
pub fn verify_token(secret: &str, token: &str) -> bool {
    constant_time_eq(secret.as_bytes(), token.as_bytes())
}

fn digest(body: &[u8], secret: &str) -> Vec<u8> {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() || a.is_empty() {
        return false;
    }
    a.iter().zip(b).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}
