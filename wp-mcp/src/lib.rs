// wp-mcp: Model Context Protocol Server for WordPress
//
// This library implements a Model Context Protocol (MCP) server which exposes
// a WordPress site's content to AI agents as tools, resources and prompts,
// with human consent required before content is changed.

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod consent;
pub mod content;
pub mod dispatcher;
pub mod errors;
pub mod events;
pub mod protocol;
pub mod resources;
pub mod store;
pub mod tools;

use std::sync::Arc;

use crate::auth::{ApiKeyAuth, RateLimiter};
use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::consent::{ConsentLog, ConsentManager};
use crate::content::ContentStore;
use crate::dispatcher::Dispatcher;
use crate::errors::ServerError;
use crate::events::{NotificationHook, NotificationLog, SubscriptionSet};
use crate::resources::ResourceCatalog;
use crate::store::OptionStore;

/// Version of the envelope protocol implemented by this server
pub const MCP_VERSION: &str = "0.1.0";

/// Default server configuration constants
pub mod defaults {
    /// Default port for the MCP server
    pub const SERVER_PORT: u16 = 3010;
    /// Default host address to bind to
    pub const SERVER_HOST: &str = "127.0.0.1";
    /// Default timeout for requests in seconds
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;
    /// Default requests per caller per minute
    pub const RATE_LIMIT_PER_MINUTE: u32 = 120;
    /// Default configuration file
    pub const CONFIG_PATH: &str = "config/default.toml";
    /// Default resource URI scheme
    pub const RESOURCE_SCHEME: &str = "wordpress";
    /// Content types exposed as resources by default
    pub const RESOURCE_TYPES: [&str; 7] = ["posts", "pages", "categories", "tags", "users", "media", "comments"];
    /// Largest media payload returned inline (1 MiB)
    pub const INLINE_MEDIA_LIMIT: u64 = 1024 * 1024;
}

/// Fully wired server state shared by the HTTP layer
pub struct McpServer {
    pub settings: Arc<Settings>,
    pub content: Arc<dyn ContentStore>,
    pub catalog: Arc<ResourceCatalog>,
    pub notifications: Arc<NotificationLog>,
    pub consent_log: Arc<ConsentLog>,
    pub auth: Arc<ApiKeyAuth>,
    pub dispatcher: Arc<Dispatcher>,
}

impl McpServer {
    /// Build the server from settings, creating the configured stores
    pub fn build(settings: Arc<Settings>) -> Result<Self, ServerError> {
        let content = content::create_content_store(&settings.content)?;
        let store = store::create_store(settings.storage.path.as_deref())?;
        Self::with_parts(settings, content, store, Arc::new(SystemClock))
    }

    /// Build the server around existing stores and clock
    pub fn with_parts(
        settings: Arc<Settings>,
        content: Arc<dyn ContentStore>,
        store: Arc<dyn OptionStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServerError> {
        settings.validate().map_err(ServerError::Config)?;
        let subscriptions = Arc::new(SubscriptionSet::new(store.clone()));
        let notifications = Arc::new(NotificationLog::new(store.clone(), subscriptions, clock.clone()));
        content.add_change_hook(Arc::new(NotificationHook::new(
            notifications.clone(),
            settings.resources.scheme.clone(),
        )));

        let catalog = Arc::new(ResourceCatalog::new(content.clone(), &settings.resources));
        let registry = tools::init_registry(content.clone(), catalog.clone(), notifications.clone())?;
        log::info!("Initialized tool registry with {} tools", registry.len());

        let consent = Arc::new(ConsentManager::new(&settings.consent, clock.clone()));
        if !consent.is_enabled() {
            log::warn!("Consent gating is disabled; mutating calls run without approval");
        }
        let consent_log = Arc::new(ConsentLog::new(store));

        let mut dispatcher = Dispatcher::new(registry, consent, consent_log.clone(), clock.clone())
            .with_production(settings.is_production());
        if settings.server.rate_limit_per_minute > 0 {
            dispatcher = dispatcher.with_rate_limiter(Arc::new(RateLimiter::new(
                settings.server.rate_limit_per_minute,
                clock,
            )));
        }

        Ok(Self {
            auth: Arc::new(ApiKeyAuth::new(&settings.auth)),
            settings,
            content,
            catalog,
            notifications,
            consent_log,
            dispatcher: Arc::new(dispatcher),
        })
    }
}
