//! # Application State
//!
//! Shared state handed to every handler through the `State` extractor.
//! The activation-key service does its own per-organization locking, so
//! the state itself is a set of `Arc`s and clones cheaply.

use std::sync::Arc;

use akm_catalog::Catalog;
use akm_monitoring::EndpointDirectory;
use akm_state::ActivationKeyService;

/// Runtime configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to listen on.
    pub port: u16,
    /// Bearer secret. `None` disables authentication.
    pub auth_token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// State shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Activation-key operations.
    pub keys: Arc<ActivationKeyService>,
    /// Monitoring endpoints of managed systems.
    pub endpoints: Arc<EndpointDirectory>,
    /// Configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Default configuration and an empty catalog.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// Given configuration and an empty catalog.
    pub fn with_config(config: AppConfig) -> Self {
        Self::from_parts(config, Catalog::new(), EndpointDirectory::new())
    }

    /// Given configuration, catalog and monitoring endpoints.
    pub fn from_parts(config: AppConfig, catalog: Catalog, endpoints: EndpointDirectory) -> Self {
        Self {
            keys: Arc::new(ActivationKeyService::new(Arc::new(catalog))),
            endpoints: Arc::new(endpoints),
            config,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
