// Consent token encoding and signing
//
// A token is the base64 form of a small JSON document whose signature is
// HMAC-SHA256 over the tool name, the issue timestamp and a nonce.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Decoded consent token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentToken {
    /// Tool the token authorizes
    pub tool: String,
    /// RFC3339 issue time
    pub timestamp: String,
    /// Server-generated nonce, consumed on first use
    pub nonce: String,
    /// Hex-encoded HMAC-SHA256 signature
    pub signature: String,
}

impl ConsentToken {
    /// Build and sign a token
    pub fn sign(secret: &[u8], tool: &str, timestamp: &str, nonce: &str) -> Result<Self, InvalidLength> {
        let mac = compute_mac(secret, tool, timestamp, nonce)?;
        Ok(Self {
            tool: tool.to_string(),
            timestamp: timestamp.to_string(),
            nonce: nonce.to_string(),
            signature: hex::encode(mac.finalize().into_bytes()),
        })
    }

    /// Check the signature in constant time
    pub fn signature_matches(&self, secret: &[u8]) -> bool {
        let provided = match hex::decode(&self.signature) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        match compute_mac(secret, &self.tool, &self.timestamp, &self.nonce) {
            Ok(mac) => mac.verify_slice(&provided).is_ok(),
            Err(_) => false,
        }
    }

    /// Serialize to the opaque wire form
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        STANDARD.encode(json)
    }

    /// Parse the opaque wire form
    pub fn decode(token: &str) -> Option<Self> {
        let bytes = STANDARD.decode(token.trim().as_bytes()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

fn compute_mac(secret: &[u8], tool: &str, timestamp: &str, nonce: &str) -> Result<HmacSha256, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret)?;
    mac.update(tool.as_bytes());
    mac.update(timestamp.as_bytes());
    mac.update(nonce.as_bytes());
    Ok(mac)
}
