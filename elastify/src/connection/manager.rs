//! Named connection registry
//!
//! Connections are built on first use and cached per name. Construction
//! happens under the registry lock, so concurrent first use of a name
//! yields exactly one connection.

use super::Connection;
use crate::config::{ConnectionConfig, ElasticsearchConfig};
use crate::error::{Error, Result};
use crate::logging;
use crate::query::Query;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Custom factory for one connection name: `(config, name) -> Connection`
pub type ConnectionResolver =
    Arc<dyn Fn(&ConnectionConfig, &str) -> Result<Connection> + Send + Sync>;

pub struct ConnectionManager {
    config: ElasticsearchConfig,
    default: RwLock<String>,
    connections: Mutex<HashMap<String, Arc<Connection>>>,
    extensions: RwLock<HashMap<String, ConnectionResolver>>,
}

impl ConnectionManager {
    pub fn new(config: ElasticsearchConfig) -> Self {
        let default = config.default.clone();
        Self {
            config,
            default: RwLock::new(default),
            connections: Mutex::new(HashMap::new()),
            extensions: RwLock::new(HashMap::new()),
        }
    }

    /// Get (building if needed) the connection `name`, or the default one
    pub fn connection(&self, name: Option<&str>) -> Result<Arc<Connection>> {
        let name = match name {
            Some(name) => name.to_string(),
            None => self.default_connection(),
        };

        let mut connections = self.connections.lock();
        if let Some(connection) = connections.get(&name) {
            return Ok(Arc::clone(connection));
        }

        let connection = Arc::new(self.make_connection(&name)?);
        connections.insert(name, Arc::clone(&connection));
        Ok(connection)
    }

    fn make_connection(&self, name: &str) -> Result<Connection> {
        let config = self
            .config
            .connection(name)
            .ok_or_else(|| Error::ConnectionNotConfigured(name.to_string()))?;

        if logging::init(&config.logging)? {
            tracing::debug!(connection = name, "Installed Elasticsearch log subscriber");
        }

        let resolver = self.extensions.read().get(name).cloned();
        match resolver {
            Some(resolver) => resolver(config, name),
            None => Connection::from_config(name, config),
        }
    }

    /// Query builder on the default connection
    pub fn query(&self) -> Result<Query> {
        Ok(self.connection(None)?.query())
    }

    pub fn default_connection(&self) -> String {
        self.default.read().clone()
    }

    pub fn set_default_connection(&self, name: impl Into<String>) {
        *self.default.write() = name.into();
    }

    /// Register a custom factory for `name`; it runs instead of the HTTP one
    pub fn extend<F>(&self, name: impl Into<String>, resolver: F)
    where
        F: Fn(&ConnectionConfig, &str) -> Result<Connection> + Send + Sync + 'static,
    {
        self.extensions.write().insert(name.into(), Arc::new(resolver));
    }

    /// Names of the connections built so far
    pub fn connections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop a cached connection so the next use rebuilds it
    pub fn purge(&self, name: Option<&str>) {
        let name = match name {
            Some(name) => name.to_string(),
            None => self.default_connection(),
        };
        self.connections.lock().remove(&name);
    }

    pub fn config(&self) -> &ElasticsearchConfig {
        &self.config
    }
}
