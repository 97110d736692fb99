use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::connection::StorageOptions;
use super::error::Result;

/// An established link to one remote database.
///
/// Handles are shared by the factory and by every session opened over them.
/// Only the factory shuts them down.
#[async_trait]
pub trait StorageHandle: Send + Sync {
    /// Logical database name
    fn name(&self) -> &str;

    /// Url the handle was resolved from
    fn url(&self) -> &str;

    /// Check a user's credentials against this database
    async fn authenticate(&self, user: &str, password: &str) -> Result<()>;

    /// Tear down the transport state behind this handle
    async fn shutdown(&self) -> Result<()>;
}

/// Resolves database urls into storage handles
#[async_trait]
pub trait Engine: Send + Sync {
    async fn resolve(&self, url: &str, options: &StorageOptions)
        -> Result<Arc<dyn StorageHandle>>;

    async fn shutdown(&self) -> Result<()>;
}

/// A privileged connection to the administrative endpoint.
///
/// Used for exactly one operation, then closed.
#[async_trait]
pub trait AdminConnection: Send + Sync {
    async fn connect(&mut self, user: &str, password: &str) -> Result<()>;

    async fn create_database(
        &mut self,
        name: &str,
        options: Option<&StorageOptions>,
        storage_type: Option<&str>,
    ) -> Result<()>;

    async fn drop_database(&mut self, name: &str, options: Option<&StorageOptions>)
        -> Result<()>;

    async fn exists_database(&mut self, name: &str, options: Option<&StorageOptions>)
        -> Result<bool>;

    /// Database names mapped to server-side metadata
    async fn list_databases(&mut self) -> Result<HashMap<String, String>>;

    async fn close(&mut self) -> Result<()>;
}

/// Builds unconnected admin connections for a url
pub trait AdminClient: Send + Sync {
    fn connection(&self, url: &str) -> Result<Box<dyn AdminConnection>>;
}

/// The collaborators a factory needs to reach one kind of remote server
#[derive(Clone)]
pub struct Driver {
    pub engine: Arc<dyn Engine>,
    pub admin: Arc<dyn AdminClient>,
}

impl Driver {
    pub fn new(engine: Arc<dyn Engine>, admin: Arc<dyn AdminClient>) -> Self {
        Self { engine, admin }
    }
}
