use std::sync::Arc;

use tracing::{error, info};

use crate::config::StoreConfig;
use crate::error::{Result, SemprintError};

use super::http::HttpIndexClient;
use super::traits::IndexClient;

/// The single connection to the index service, created once at startup and
/// shared by reference with everything that talks to the store.
#[derive(Clone)]
pub struct StoreHandle {
    client: Arc<dyn IndexClient>,
}

impl StoreHandle {
    /// Build the HTTP client and confirm the service answers.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let unavailable = |reason: String| {
            error!(host = %config.host, port = config.port, %reason, "failed to initialize store client");
            SemprintError::StoreUnavailable { reason }
        };

        let client = HttpIndexClient::new(config).map_err(|e| unavailable(e.to_string()))?;
        client
            .server_status()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        info!(host = %config.host, port = config.port, "initialized store client");
        Ok(Self::from_client(Arc::new(client)))
    }

    /// Wrap an already constructed client.
    pub fn from_client(client: Arc<dyn IndexClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &dyn IndexClient {
        self.client.as_ref()
    }
}
