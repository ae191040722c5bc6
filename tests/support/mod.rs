//! Shared helpers for integration tests
//!
//! `ClientSealer` plays the messaging platform's side of the exchange: it
//! wraps an AES key with the service's public key and seals payloads the way
//! the platform does.

#![allow(dead_code)]

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes128;
use aes_gcm::{AesGcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flow_bridge::keys::load_private_key;
use flow_bridge::EncryptedEnvelope;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

pub const PKCS1_PEM: &str = include_str!("../fixtures/flow_private_pkcs1.pem");
pub const PKCS8_PEM: &str = include_str!("../fixtures/flow_private_pkcs8.pem");
pub const OTHER_PKCS8_PEM: &str = include_str!("../fixtures/other_private_pkcs8.pem");
pub const PING_ENVELOPE: &str = include_str!("../fixtures/ping_envelope.json");
pub const PING_REPLY: &str = include_str!("../fixtures/ping_reply.b64");

type Aes128Gcm16 = AesGcm<Aes128, U16>;

pub fn private_key() -> RsaPrivateKey {
    load_private_key(PKCS8_PEM).expect("fixture key loads")
}

/// Client-side half of one exchange
pub struct ClientSealer {
    pub public_key: RsaPublicKey,
    pub aes_key: [u8; 16],
    pub iv: [u8; 16],
}

impl ClientSealer {
    /// Fresh random AES-128 key and IV
    pub fn random(public_key: RsaPublicKey) -> Self {
        let mut aes_key = [0u8; 16];
        let mut iv = [0u8; 16];
        OsRng.fill_bytes(&mut aes_key);
        OsRng.fill_bytes(&mut iv);
        Self { public_key, aes_key, iv }
    }

    pub fn for_key(private_key: &RsaPrivateKey) -> Self {
        Self::random(RsaPublicKey::from(private_key))
    }

    pub fn seal(&self, payload: &[u8]) -> EncryptedEnvelope {
        let wrapped = self
            .public_key
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &self.aes_key)
            .expect("RSA-OAEP wrap");
        let cipher = Aes128Gcm16::new_from_slice(&self.aes_key).expect("AES key");
        let sealed = cipher
            .encrypt(Nonce::<U16>::from_slice(&self.iv), payload)
            .expect("AES-GCM seal");

        EncryptedEnvelope {
            encrypted_flow_data: BASE64.encode(sealed),
            encrypted_aes_key: BASE64.encode(wrapped),
            initial_vector: BASE64.encode(self.iv),
        }
    }

    pub fn seal_json(&self, payload: &serde_json::Value) -> EncryptedEnvelope {
        self.seal(payload.to_string().as_bytes())
    }

    /// Opens a reply body with the bit-flipped IV
    pub fn open_reply(&self, reply: &str) -> Option<Vec<u8>> {
        let flipped: Vec<u8> = self.iv.iter().map(|b| b ^ 0xFF).collect();
        self.open_with_iv(reply, &flipped)
    }

    pub fn open_with_iv(&self, reply: &str, iv: &[u8]) -> Option<Vec<u8>> {
        let sealed = BASE64.decode(reply.trim()).ok()?;
        let cipher = Aes128Gcm16::new_from_slice(&self.aes_key).ok()?;
        cipher.decrypt(Nonce::<U16>::from_slice(iv), sealed.as_slice()).ok()
    }
}
