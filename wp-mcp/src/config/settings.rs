// Settings module for configuration
//
// This module defines the settings structure and loading/saving functions
// for the MCP server configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;
use anyhow::Result;

/// Server settings for the MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
    /// Enable CORS
    pub cors_enabled: bool,
    /// CORS allowed origins
    pub cors_origins: Vec<String>,
    /// Request timeout in seconds
    pub request_timeout: u64,
    /// Requests allowed per caller per minute, 0 disables limiting
    pub rate_limit_per_minute: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: crate::defaults::SERVER_HOST.to_string(),
            port: crate::defaults::SERVER_PORT,
            workers: num_cpus::get(),
            cors_enabled: false,
            cors_origins: vec!["*".to_string()],
            request_timeout: crate::defaults::REQUEST_TIMEOUT_SECS,
            rate_limit_per_minute: crate::defaults::RATE_LIMIT_PER_MINUTE,
        }
    }
}

/// Authentication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Require an API key on `/mcp`
    pub enabled: bool,
    /// Shared API key, sent as `X-API-Key` or a bearer token
    pub api_key: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: generate_random_secret(),
        }
    }
}

/// Consent gating settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentSettings {
    /// When false no operation requires consent
    pub enabled: bool,
    /// HMAC key for consent tokens
    pub secret: String,
    /// Accepted token age in seconds, either side of now
    pub window_secs: i64,
    /// Reject a token nonce after its first successful use
    pub single_use: bool,
}

impl Default for ConsentSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            secret: generate_random_secret(),
            window_secs: crate::consent::DEFAULT_WINDOW_SECS,
            single_use: true,
        }
    }
}

/// Resource exposure settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSettings {
    /// URI scheme of resource URIs
    pub scheme: String,
    /// Content types exposed as resources, in listing order
    pub types: Vec<String>,
    /// Largest binary payload returned inline, in bytes
    pub inline_media_limit: u64,
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            scheme: crate::defaults::RESOURCE_SCHEME.to_string(),
            types: crate::defaults::RESOURCE_TYPES.iter().map(|t| t.to_string()).collect(),
            inline_media_limit: crate::defaults::INLINE_MEDIA_LIMIT,
        }
    }
}

/// Content store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSettings {
    /// Backend: `memory` or `rest`
    pub backend: String,
    /// Site URL for the rest backend
    pub base_url: Option<String>,
    pub username: Option<String>,
    /// WordPress application password
    pub application_password: Option<String>,
    /// Backend request timeout in seconds
    pub request_timeout: u64,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            base_url: None,
            username: None,
            application_password: None,
            request_timeout: crate::defaults::REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Option store settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// JSON file for persisted options; in-memory when unset
    pub path: Option<String>,
}

/// Complete settings for the MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Environment (development, staging, production)
    pub environment: String,
    /// Log level
    pub log_level: String,
    /// Server settings
    pub server: ServerSettings,
    /// Authentication settings
    pub auth: AuthSettings,
    /// Consent settings
    pub consent: ConsentSettings,
    /// Resource settings
    pub resources: ResourceSettings,
    /// Content store settings
    pub content: ContentSettings,
    /// Option store settings
    pub storage: StorageSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
            server: ServerSettings::default(),
            auth: AuthSettings::default(),
            consent: ConsentSettings::default(),
            resources: ResourceSettings::default(),
            content: ContentSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

/// Accepted values for `consent.window_secs`
pub const CONSENT_WINDOW_SECS: RangeInclusive<i64> = 1..=86_400;

impl Settings {
    /// Production mode hides internal error detail from callers
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !CONSENT_WINDOW_SECS.contains(&self.consent.window_secs) {
            return Err(format!(
                "consent.window_secs must be between {} and {}, got {}",
                CONSENT_WINDOW_SECS.start(),
                CONSENT_WINDOW_SECS.end(),
                self.consent.window_secs
            ));
        }
        Ok(())
    }
}

/// Load settings from a file
pub fn load(path: impl AsRef<Path>) -> Result<Settings> {
    let config_str = match fs::read_to_string(&path) {
        Ok(config_str) => config_str,
        Err(_) => {
            // If the file doesn't exist, create default settings
            let default_settings = Settings::default();
            save(&default_settings, path)?;
            return Ok(default_settings);
        }
    };

    let settings: Settings = toml::from_str(&config_str)?;
    Ok(settings)
}

/// Save settings to a file
pub fn save(settings: &Settings, path: impl AsRef<Path>) -> Result<()> {
    let config_str = toml::to_string_pretty(settings)?;

    // Create parent directories if they don't exist
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, config_str)?;
    Ok(())
}

/// Generate a random secret for API keys and consent tokens
fn generate_random_secret() -> String {
    use rand::{thread_rng, Rng};
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = thread_rng();
    (0..32)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
