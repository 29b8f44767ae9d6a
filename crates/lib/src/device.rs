//! Device identity for network pairing: keypair generation, canonical payload, and signing.
//!
//! Payload format must match what the network bridge verifies: deviceId, nonce, signedAt,
//! newline-separated.

use anyhow::Result;
use base64::Engine;
use ed25519_dalek::Signer;
use serde::{Deserialize, Serialize};

/// Device keypair. Persisted inside the session store file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    pub device_id: String,
    pub public_key: String,
    pub private_key: String,
}

/// Build the canonical string signed during the pairing handshake.
pub fn pairing_payload(device_id: &str, nonce: &str, signed_at: u64) -> String {
    format!("{}\n{}\n{}", device_id, nonce, signed_at)
}

impl DeviceIdentity {
    /// Sign the payload string and return the signature as base64.
    pub fn sign(&self, payload: &str) -> Result<String> {
        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(self.private_key.as_bytes())
            .map_err(|e| anyhow::anyhow!("decode private key: {}", e))?;
        let key_arr: [u8; 32] = key_bytes
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("invalid private key length"))?;
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&key_arr);
        let sig = signing_key.sign(payload.as_bytes());
        Ok(base64::engine::general_purpose::STANDARD.encode(sig.to_bytes()))
    }

    /// Generate a new keypair. device_id is the first 16 chars of base64(public_key).
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; 32];
        getrandom::getrandom(&mut bytes).map_err(|e| anyhow::anyhow!("getrandom: {}", e))?;
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&bytes);
        let verifying_key = signing_key.verifying_key();
        let public_key = base64::engine::general_purpose::STANDARD.encode(verifying_key.as_bytes());
        let private_key = base64::engine::general_purpose::STANDARD.encode(signing_key.as_bytes());
        let device_id = public_key.chars().take(16).collect::<String>();
        Ok(Self {
            device_id,
            public_key,
            private_key,
        })
    }
}
