use {
    base64::{Engine, engine::general_purpose::STANDARD},
    rand::RngCore,
};

/// Number of random bytes behind a generated route secret.
const SECRET_BYTES: usize = 32;

/// A fresh random endpoint token (UUID v4).
pub fn generate_endpoint() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A fresh random shared secret, base64 encoded.
pub fn generate_secret() -> String {
    let mut buf = [0u8; SECRET_BYTES];
    rand::rng().fill_bytes(&mut buf);
    STANDARD.encode(buf)
}
