// Authentication module for the MCP server
//
// This module handles caller authentication with a single shared API key
// and per-caller request rate limiting.

pub mod rate_limit;

pub use rate_limit::{RateLimitCheckResult, RateLimiter};

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::AuthSettings;
use crate::errors::McpError;

type HmacSha256 = Hmac<Sha256>;

const KEY_CHECK_CONTEXT: &[u8] = b"wp-mcp api key";

/// Shared-secret API key check
pub struct ApiKeyAuth {
    enabled: bool,
    /// MAC of the configured key, compared against the MAC of presented keys
    expected_tag: Vec<u8>,
}

impl ApiKeyAuth {
    pub fn new(settings: &AuthSettings) -> Self {
        let enabled = settings.enabled && !settings.api_key.is_empty();
        let expected_tag = key_tag(&settings.api_key).unwrap_or_default();
        Self { enabled, expected_tag }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check the key presented by a caller.
    ///
    /// The comparison runs in constant time with respect to the key bytes.
    pub fn authenticate(&self, presented: Option<&str>) -> Result<(), McpError> {
        if !self.enabled {
            return Ok(());
        }

        let presented = presented.filter(|key| !key.is_empty()).ok_or(McpError::Unauthorized)?;
        let mut mac = HmacSha256::new_from_slice(presented.as_bytes()).map_err(|_| McpError::Unauthorized)?;
        mac.update(KEY_CHECK_CONTEXT);
        mac.verify_slice(&self.expected_tag).map_err(|_| McpError::Unauthorized)
    }
}

fn key_tag(key: &str) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).ok()?;
    mac.update(KEY_CHECK_CONTEXT);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Pull the API key out of `X-API-Key` or an `Authorization: Bearer` value
pub fn presented_key<'a>(api_key_header: Option<&'a str>, authorization: Option<&'a str>) -> Option<&'a str> {
    api_key_header.map(str::trim).or_else(|| {
        authorization
            .and_then(|value| value.trim().strip_prefix("Bearer "))
            .map(str::trim)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(enabled: bool, key: &str) -> ApiKeyAuth {
        ApiKeyAuth::new(&AuthSettings {
            enabled,
            api_key: key.to_string(),
        })
    }

    #[test]
    fn test_disabled_auth_allows_everyone() {
        assert!(auth(false, "secret").authenticate(None).is_ok());
        // An empty key cannot be matched, so it disables the check
        assert!(!auth(true, "").is_enabled());
    }

    #[test]
    fn test_key_must_match() {
        let auth = auth(true, "secret");
        assert!(auth.authenticate(Some("secret")).is_ok());
        assert!(matches!(auth.authenticate(Some("secreT")), Err(McpError::Unauthorized)));
        assert!(matches!(auth.authenticate(Some("")), Err(McpError::Unauthorized)));
        assert!(matches!(auth.authenticate(None), Err(McpError::Unauthorized)));
    }

    #[test]
    fn test_presented_key_sources() {
        assert_eq!(presented_key(Some("k1"), Some("Bearer k2")), Some("k1"));
        assert_eq!(presented_key(None, Some("Bearer k2")), Some("k2"));
        assert_eq!(presented_key(None, Some("Basic abc")), None);
        assert_eq!(presented_key(None, None), None);
    }
}
