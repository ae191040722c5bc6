//! Encrypted data-exchange envelope codec
//!
//! Every Flow data-exchange request arrives sealed with a hybrid scheme:
//!
//! 1. The client picks a random AES key and IV.
//! 2. The AES key is wrapped with RSA-OAEP (SHA-256 for both the digest and
//!    MGF1) under the business's public key.
//! 3. The JSON payload is sealed with AES-GCM under that key and IV.
//!
//! ## Wire format
//!
//! ```text
//! {
//!   "encrypted_flow_data": base64(ciphertext || tag[16]),
//!   "encrypted_aes_key":   base64(RSA-OAEP(aes_key)),
//!   "initial_vector":      base64(iv[16])
//! }
//! ```
//!
//! The reply is `base64(ciphertext || tag[16])` sealed under the same AES
//! key with every bit of the request IV flipped.
//!
//! The platform sends 16-byte IVs; the standard 12-byte GCM nonce is
//! accepted as well. Any other IV length is rejected.
//!
//! Decrypting yields a [`SessionKey`] that is consumed by
//! [`encrypt_response`], so a session can seal exactly one reply.

use crate::error::{BridgeError, Result};
use aes_gcm::aead::consts::{U12, U16};
use aes_gcm::aead::generic_array::ArrayLength;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::{Aes128, Aes192, Aes256};
use aes_gcm::{AesGcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rsa::{Oaep, RsaPrivateKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Length of the IV the platform sends
pub const IV_LEN: usize = 16;

/// Length of the standard GCM nonce, also accepted as an IV
pub const SHORT_IV_LEN: usize = 12;

/// Length of the GCM authentication tag appended to every ciphertext
pub const TAG_LEN: usize = 16;

/// Inbound request body of the Flow endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    /// AES-GCM sealed JSON payload, tag appended
    pub encrypted_flow_data: String,
    /// RSA-OAEP wrapped AES key
    pub encrypted_aes_key: String,
    /// Raw IV
    pub initial_vector: String,
}

/// AES key and IV recovered from one envelope
///
/// Wiped from memory when dropped. Not `Clone`: the reply for a request is
/// sealed by moving its session into [`encrypt_response`].
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    aes_key: Vec<u8>,
    iv: Vec<u8>,
}

impl SessionKey {
    /// Builds a session from raw parts, validating their lengths.
    pub fn new(aes_key: Vec<u8>, iv: &[u8]) -> Result<Self> {
        let mut aes_key = Zeroizing::new(aes_key);
        if !matches!(aes_key.len(), 16 | 24 | 32) {
            return Err(BridgeError::DecryptionFailed(format!(
                "Unsupported AES key length: {} bytes",
                aes_key.len()
            )));
        }
        if !matches!(iv.len(), SHORT_IV_LEN | IV_LEN) {
            return Err(BridgeError::DecryptionFailed(format!(
                "Invalid IV length: expected {} or {} bytes, got {}",
                IV_LEN,
                SHORT_IV_LEN,
                iv.len()
            )));
        }

        Ok(Self {
            aes_key: std::mem::take(&mut *aes_key),
            iv: iv.to_vec(),
        })
    }

    /// The IV the client used for the request
    pub fn request_iv(&self) -> &[u8] {
        &self.iv
    }

    /// The IV used to seal the reply: the request IV with every bit flipped
    pub fn response_iv(&self) -> Vec<u8> {
        invert_iv(&self.iv)
    }

    /// AES key length in bytes
    pub fn key_len(&self) -> usize {
        self.aes_key.len()
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("key_len", &self.aes_key.len())
            .field("iv_len", &self.iv.len())
            .finish_non_exhaustive()
    }
}

/// Flips every bit of `iv`.
pub fn invert_iv(iv: &[u8]) -> Vec<u8> {
    iv.iter().map(|byte| byte ^ 0xFF).collect()
}

/// Decrypts envelopes with the process-wide RSA key
///
/// Cheap to clone; the key is shared read-only across requests.
#[derive(Clone)]
pub struct FlowCodec {
    private_key: Arc<RsaPrivateKey>,
}

impl FlowCodec {
    /// Creates a codec around a loaded private key
    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self {
            private_key: Arc::new(private_key),
        }
    }

    /// Opens an envelope, returning the parsed payload and its session.
    ///
    /// Every failure, including a payload that is not valid JSON or does not
    /// fit `T`, is reported as [`BridgeError::DecryptionFailed`].
    pub fn decrypt_request<T: DeserializeOwned>(
        &self,
        envelope: &EncryptedEnvelope,
    ) -> Result<(T, SessionKey)> {
        let sealed = decode_field("encrypted_flow_data", &envelope.encrypted_flow_data)?;
        let wrapped_key = decode_field("encrypted_aes_key", &envelope.encrypted_aes_key)?;
        let iv = decode_field("initial_vector", &envelope.initial_vector)?;

        let aes_key = self
            .private_key
            .decrypt_blinded(&mut OsRng, Oaep::new::<Sha256>(), &wrapped_key)
            .map_err(|e| BridgeError::DecryptionFailed(format!("RSA-OAEP unwrap failed: {}", e)))?;

        let session = SessionKey::new(aes_key, &iv)?;

        if sealed.len() < TAG_LEN {
            return Err(BridgeError::DecryptionFailed(format!(
                "Flow data too short: expected at least {} bytes, got {}",
                TAG_LEN,
                sealed.len()
            )));
        }

        let plaintext = Zeroizing::new(open(&session.aes_key, &session.iv, &sealed)?);
        debug!(
            key_len = session.key_len(),
            iv_len = session.iv.len(),
            plaintext_len = plaintext.len(),
            "Flow request decrypted"
        );

        let payload = serde_json::from_slice(&plaintext)
            .map_err(|e| BridgeError::DecryptionFailed(format!("Payload is not valid JSON: {}", e)))?;

        Ok((payload, session))
    }
}

/// Seals a reply for the request that produced `session`.
///
/// The response is serialized as compact JSON with field names untouched,
/// then sealed under the session key with the inverted IV. Returns the
/// base64 text the platform expects as the raw HTTP body.
pub fn encrypt_response<T: Serialize + ?Sized>(response: &T, session: SessionKey) -> Result<String> {
    let body = Zeroizing::new(serde_json::to_vec(response)?);
    let sealed = seal(&session.aes_key, &session.response_iv(), &body)?;
    debug!(sealed_len = sealed.len(), "Flow response encrypted");
    Ok(BASE64.encode(sealed))
}

/// AES-GCM seal. Output is `ciphertext || tag`.
pub(crate) fn seal(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let sealed = match iv.len() {
        SHORT_IV_LEN => seal_with_nonce::<U12>(key, iv, plaintext)?,
        IV_LEN => seal_with_nonce::<U16>(key, iv, plaintext)?,
        n => return Err(BridgeError::Encryption(format!("Invalid IV length: {} bytes", n))),
    };
    sealed.map_err(|_| BridgeError::Encryption("AES-GCM seal failed".to_string()))
}

/// AES-GCM open of `ciphertext || tag`. Nothing is released unless the tag
/// verifies.
pub(crate) fn open(key: &[u8], iv: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    let opened = match iv.len() {
        SHORT_IV_LEN => open_with_nonce::<U12>(key, iv, sealed)?,
        IV_LEN => open_with_nonce::<U16>(key, iv, sealed)?,
        n => return Err(BridgeError::DecryptionFailed(format!("Invalid IV length: {} bytes", n))),
    };
    opened.map_err(|_| {
        BridgeError::DecryptionFailed(
            "AES-GCM authentication failed (wrong key or tampered data)".to_string(),
        )
    })
}

fn seal_with_nonce<N: ArrayLength<u8>>(
    key: &[u8],
    iv: &[u8],
    plaintext: &[u8],
) -> Result<aes_gcm::aead::Result<Vec<u8>>> {
    let nonce = Nonce::<N>::from_slice(iv);
    Ok(match key.len() {
        16 => new_cipher::<AesGcm<Aes128, N>>(key)?.encrypt(nonce, plaintext),
        24 => new_cipher::<AesGcm<Aes192, N>>(key)?.encrypt(nonce, plaintext),
        32 => new_cipher::<AesGcm<Aes256, N>>(key)?.encrypt(nonce, plaintext),
        n => {
            return Err(BridgeError::Encryption(format!(
                "Unsupported AES key length: {} bytes",
                n
            )))
        }
    })
}

fn open_with_nonce<N: ArrayLength<u8>>(
    key: &[u8],
    iv: &[u8],
    sealed: &[u8],
) -> Result<aes_gcm::aead::Result<Vec<u8>>> {
    let nonce = Nonce::<N>::from_slice(iv);
    Ok(match key.len() {
        16 => new_cipher::<AesGcm<Aes128, N>>(key)?.decrypt(nonce, sealed),
        24 => new_cipher::<AesGcm<Aes192, N>>(key)?.decrypt(nonce, sealed),
        32 => new_cipher::<AesGcm<Aes256, N>>(key)?.decrypt(nonce, sealed),
        n => {
            return Err(BridgeError::DecryptionFailed(format!(
                "Unsupported AES key length: {} bytes",
                n
            )))
        }
    })
}

fn new_cipher<C: KeyInit>(key: &[u8]) -> Result<C> {
    C::new_from_slice(key).map_err(|e| BridgeError::DecryptionFailed(format!("Invalid AES key: {}", e)))
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value.trim())
        .map_err(|e| BridgeError::DecryptionFailed(format!("{} is not valid base64: {}", name, e)))
}
