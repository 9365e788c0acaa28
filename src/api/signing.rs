//! RSA-PSS request signing
//!
//! Every authenticated call carries a signature over
//! `"{timestamp_ms}{METHOD}{path}"` where `path` has its query string
//! stripped. The signature uses PSS with MGF1(SHA-256), the maximum salt
//! length the key allows, and a SHA-256 message digest, base64 encoded.
//! PSS salts are random, so two signatures over the same message differ.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pkcs8::DecodePrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{Pss, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from loading key material or producing a signature
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Private key is encrypted but no password was supplied")]
    PasswordRequired,

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Signature failed: {0}")]
    Sign(#[from] rsa::Error),

    #[error("Invalid signature encoding: {0}")]
    Encoding(#[from] base64::DecodeError),
}

/// Build the exact byte string that gets signed
pub fn signing_message(timestamp_ms: i64, method: &str, path: &str) -> String {
    let path_no_query = path.split('?').next().unwrap_or_default();
    format!("{}{}{}", timestamp_ms, method.to_ascii_uppercase(), path_no_query)
}

/// Signs requests with an RSA private key
#[derive(Clone)]
pub struct RequestSigner {
    key: RsaPrivateKey,
    salt_len: usize,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("key_bits", &self.key.n().bits())
            .field("salt_len", &self.salt_len)
            .finish()
    }
}

impl RequestSigner {
    /// Wrap an already-parsed key
    pub fn new(key: RsaPrivateKey) -> Self {
        let salt_len = max_salt_len(&key);
        Self { key, salt_len }
    }

    /// Parse a PEM key: PKCS#1 (`RSA PRIVATE KEY`), PKCS#8 (`PRIVATE KEY`)
    /// or password-protected PKCS#8 (`ENCRYPTED PRIVATE KEY`)
    pub fn from_pem(pem: &str, password: Option<&str>) -> Result<Self, SigningError> {
        let pem = pem.trim();

        let key = if pem.contains("ENCRYPTED PRIVATE KEY") {
            let password = password.ok_or(SigningError::PasswordRequired)?;
            RsaPrivateKey::from_pkcs8_encrypted_pem(pem, password.as_bytes())
                .map_err(|e| SigningError::InvalidKey(e.to_string()))?
        } else if pem.contains("RSA PRIVATE KEY") {
            RsaPrivateKey::from_pkcs1_pem(pem).map_err(|e| SigningError::InvalidKey(e.to_string()))?
        } else {
            RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| SigningError::InvalidKey(e.to_string()))?
        };

        Ok(Self::new(key))
    }

    /// Salt length used for every signature
    pub fn salt_len(&self) -> usize {
        self.salt_len
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.key.to_public_key()
    }

    /// Sign a request and return the base64 signature
    pub fn sign(&self, timestamp_ms: i64, method: &str, path: &str) -> Result<String, SigningError> {
        let message = signing_message(timestamp_ms, method, path);
        let digest = Sha256::digest(message.as_bytes());

        let mut rng = rand::thread_rng();
        let signature = self.key.sign_with_rng(
            &mut rng,
            Pss::new_with_salt::<Sha256>(self.salt_len),
            &digest,
        )?;

        Ok(STANDARD.encode(signature))
    }

    /// Check a base64 signature against this key's public half
    pub fn verify(
        &self,
        timestamp_ms: i64,
        method: &str,
        path: &str,
        signature_b64: &str,
    ) -> Result<(), SigningError> {
        let signature = STANDARD.decode(signature_b64)?;
        let message = signing_message(timestamp_ms, method, path);
        let digest = Sha256::digest(message.as_bytes());

        self.public_key().verify(
            Pss::new_with_salt::<Sha256>(self.salt_len),
            &digest,
            &signature,
        )?;
        Ok(())
    }
}

/// Largest salt PSS permits for this key: emLen - hLen - 2
fn max_salt_len(key: &RsaPrivateKey) -> usize {
    let em_bits = key.n().bits().saturating_sub(1);
    let em_len = em_bits.div_ceil(8);
    em_len.saturating_sub(<Sha256 as Digest>::output_size() + 2)
}
