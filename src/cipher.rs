//! Payload cipher for the EasyTouch GATT protocol.
//!
//! The key is derived deterministically from the device credentials, so
//! commands stay valid across process restarts without re-pairing. AES-GCM
//! authenticates the ciphertext: decryption with the wrong credentials or a
//! corrupted blob fails outright instead of yielding garbled JSON.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::DecodeError;
use crate::types::Credentials;

const NONCE_LEN: usize = 12;

/// Derive the 32-byte session key from `(email, password)`. Unset fields
/// contribute empty strings, so a password-less device still gets a fixed,
/// deterministic key.
pub fn derive_key(credentials: &Credentials) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(credentials.email.as_deref().unwrap_or("").as_bytes());
    hasher.update(b":");
    hasher.update(credentials.password.as_deref().unwrap_or("").as_bytes());
    hasher.finalize().into()
}

/// Encrypt a plaintext JSON payload. Output layout: 12-byte nonce followed
/// by the ciphertext and GCM tag.
pub fn encrypt(plaintext: &[u8], credentials: &Credentials) -> Vec<u8> {
    let key = derive_key(credentials);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .expect("AES-GCM encryption is infallible for in-memory payloads");

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    out
}

/// Decrypt a device payload. Fails with [`DecodeError::Malformed`] on a
/// truncated blob, a corrupted ciphertext, or a credential mismatch.
pub fn decrypt(payload: &[u8], credentials: &Credentials) -> Result<Vec<u8>, DecodeError> {
    if payload.len() <= NONCE_LEN {
        return Err(DecodeError::Malformed(format!(
            "ciphertext too short: {} bytes",
            payload.len()
        )));
    }
    let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);

    let key = derive_key(credentials);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| DecodeError::Malformed("authentication failed (wrong key or corrupted payload)".to_string()))
}
