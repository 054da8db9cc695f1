// Configuration module for the MCP server
//
// This module handles loading and managing configuration settings
// for the MCP server.

mod settings;

pub use settings::{
    AuthSettings, CONSENT_WINDOW_SECS, ConsentSettings, ContentSettings, ResourceSettings, ServerSettings, Settings, StorageSettings,
};

use std::sync::Arc;
use crate::errors::ServerError;

/// Load configuration from a file
pub fn load_config(path: Option<&str>) -> Result<Arc<Settings>, ServerError> {
    let config_path = path.unwrap_or(crate::defaults::CONFIG_PATH);
    let settings = settings::load(config_path)
        .map_err(|e| ServerError::Config(format!("Failed to load config: {}", e)))?;
    settings.validate().map_err(ServerError::Config)?;
    Ok(Arc::new(settings))
}
