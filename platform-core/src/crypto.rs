//! AEAD encryption of `ProxyRule.headerConfig.add` values
//!
//! Values are encrypted at rest with AES-256-GCM and stored in the wire
//! format `hex(iv12) ":" hex(tag16) ":" hex(ciphertext)`. The key comes from
//! the `ENCRYPTION_KEY` environment variable (base64-encoded 32 bytes).
//!
//! Any decryption failure is logged and the literal stored value is passed
//! through unchanged — this tolerates pre-existing plaintext dev data
//! rather than hard-failing header assembly.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use thiserror::Error;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("ENCRYPTION_KEY must decode to exactly 32 bytes, got {0}")]
    BadKeyLength(usize),

    #[error("invalid base64 in ENCRYPTION_KEY: {0}")]
    BadKeyEncoding(#[from] base64::DecodeError),

    #[error("malformed ciphertext envelope (expected iv:tag:ciphertext)")]
    MalformedEnvelope,

    #[error("invalid hex in ciphertext envelope")]
    BadHex,

    #[error("AEAD operation failed")]
    Aead,
}

/// A decoded AES-256-GCM key, ready to encrypt/decrypt header values.
#[derive(Clone)]
pub struct HeaderCipher {
    cipher: Aes256Gcm,
}

impl HeaderCipher {
    /// Decode `ENCRYPTION_KEY` (base64, 32 bytes) into a usable cipher.
    pub fn from_base64_key(encoded: &str) -> Result<Self, CryptoError> {
        let raw = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        if raw.len() != 32 {
            return Err(CryptoError::BadKeyLength(raw.len()));
        }
        let key = Key::<Aes256Gcm>::from_slice(&raw);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Encrypt `plaintext`, returning the `iv:tag:ciphertext` wire format.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Aead)?;

        let split_at = sealed.len().saturating_sub(TAG_LEN);
        let (ciphertext, tag) = sealed.split_at(split_at);

        Ok(format!(
            "{}:{}:{}",
            to_hex(&nonce),
            to_hex(tag),
            to_hex(ciphertext)
        ))
    }

    /// Decrypt a value previously produced by [`encrypt`](Self::encrypt).
    ///
    /// Callers that want to fall back to the literal stored value on
    /// `Err` rather than propagating the failure should use
    /// [`decrypt_or_passthrough`](Self::decrypt_or_passthrough) instead.
    pub fn decrypt(&self, envelope: &str) -> Result<String, CryptoError> {
        let mut parts = envelope.splitn(3, ':');
        let (iv_hex, tag_hex, ct_hex) = match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            _ => return Err(CryptoError::MalformedEnvelope),
        };

        let iv = from_hex(iv_hex).ok_or(CryptoError::BadHex)?;
        let tag = from_hex(tag_hex).ok_or(CryptoError::BadHex)?;
        let ciphertext = from_hex(ct_hex).ok_or(CryptoError::BadHex)?;

        if iv.len() != NONCE_LEN || tag.len() != TAG_LEN {
            return Err(CryptoError::MalformedEnvelope);
        }

        let mut sealed = ciphertext;
        sealed.extend_from_slice(&tag);

        let nonce = Nonce::from_slice(&iv);
        let plaintext = self
            .cipher
            .decrypt(nonce, sealed.as_slice())
            .map_err(|_| CryptoError::Aead)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::Aead)
    }

    /// Decrypt `envelope`, falling back to the literal value on any failure.
    pub fn decrypt_or_passthrough(&self, envelope: &str) -> String {
        match self.decrypt(envelope) {
            Ok(plaintext) => plaintext,
            Err(err) => {
                tracing::warn!(error = %err, "failed to decrypt header value, passing through stored literal");
                envelope.to_string()
            }
        }
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> HeaderCipher {
        let key = base64::engine::general_purpose::STANDARD.encode([7u8; 32]);
        HeaderCipher::from_base64_key(&key).unwrap()
    }

    #[test]
    fn round_trip_is_byte_for_byte() {
        let cipher = test_cipher();
        let envelope = cipher.encrypt("secret-header-value").unwrap();
        assert_eq!(cipher.decrypt(&envelope).unwrap(), "secret-header-value");
    }

    #[test]
    fn envelope_has_three_colon_separated_hex_parts() {
        let cipher = test_cipher();
        let envelope = cipher.encrypt("x").unwrap();
        let parts: Vec<&str> = envelope.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), NONCE_LEN * 2);
        assert_eq!(parts[1].len(), TAG_LEN * 2);
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        let short = base64::engine::general_purpose::STANDARD.encode([1u8; 16]);
        assert!(matches!(
            HeaderCipher::from_base64_key(&short),
            Err(CryptoError::BadKeyLength(16))
        ));
    }

    #[test]
    fn malformed_envelope_passes_through_the_literal_value() {
        let cipher = test_cipher();
        assert_eq!(cipher.decrypt_or_passthrough("not-encrypted"), "not-encrypted");
    }

    #[test]
    fn tampered_ciphertext_fails_decryption() {
        let cipher = test_cipher();
        let mut envelope = cipher.encrypt("secret").unwrap();
        envelope.push('0');
        assert!(cipher.decrypt(&envelope).is_err());
    }
}
