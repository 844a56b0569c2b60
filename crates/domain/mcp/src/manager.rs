use std::collections::HashMap;
use std::sync::Arc;

use systemprompt_config::McpCatalog;
use tokio::sync::RwLock;

use crate::client::McpClient;
use crate::error::{McpError, Result};

/// Shared manager owning one client per configured server name, created
/// lazily on first use and held for the process lifetime (§4.G). Guarded by
/// a read-write lock: lookups are frequent, insertions rare (§5 shared
/// resources, item c).
#[derive(Debug, Clone)]
pub struct McpManager {
    catalog: Arc<McpCatalog>,
    clients: Arc<RwLock<HashMap<String, Arc<McpClient>>>>,
}

impl McpManager {
    #[must_use]
    pub fn new(catalog: McpCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn client(&self, server: &str) -> Result<Arc<McpClient>> {
        if let Some(client) = self.clients.read().await.get(server) {
            return Ok(Arc::clone(client));
        }

        let config = self
            .catalog
            .get(server)
            .ok_or_else(|| McpError::UnknownServer(server.to_string()))?
            .clone();

        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(server) {
            return Ok(Arc::clone(client));
        }
        let client = Arc::new(McpClient::new(config));
        clients.insert(server.to_string(), Arc::clone(&client));
        Ok(client)
    }

    #[must_use]
    pub fn server_names(&self) -> Vec<&str> {
        self.catalog.server_names()
    }
}
