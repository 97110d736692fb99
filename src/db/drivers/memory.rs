//! In-process server driver
//!
//! `MemoryServer` keeps a map of databases and a single root account, and
//! implements every collaborator the factory needs. Urls follow the remote
//! form `host/name`; the host part is ignored.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::db::connection::StorageOptions;
use crate::db::driver::{AdminClient, AdminConnection, Driver, Engine, StorageHandle};
use crate::db::error::{ConnectionError, Result};

/// Storage type used when the create request carries no token
const DEFAULT_STORAGE_TYPE: &str = "plocal";

#[derive(Default)]
struct ServerState {
    databases: HashMap<String, String>,
}

pub struct MemoryServer {
    user: String,
    password: String,
    state: Mutex<ServerState>,
    online: AtomicBool,
    resolves: AtomicUsize,
    engine_shutdowns: AtomicUsize,
    storage_shutdowns: AtomicUsize,
}

impl MemoryServer {
    pub fn new(user: &str, password: &str) -> Arc<Self> {
        Arc::new(Self {
            user: user.to_string(),
            password: password.to_string(),
            state: Mutex::new(ServerState::default()),
            online: AtomicBool::new(true),
            resolves: AtomicUsize::new(0),
            engine_shutdowns: AtomicUsize::new(0),
            storage_shutdowns: AtomicUsize::new(0),
        })
    }

    /// Driver whose engine and admin client both talk to this server
    pub fn driver(self: &Arc<Self>) -> Driver {
        Driver::new(
            Arc::new(MemoryEngine {
                server: self.clone(),
            }),
            Arc::new(MemoryAdminClient {
                server: self.clone(),
            }),
        )
    }

    /// Simulate an unreachable endpoint
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Storage type of an existing database
    pub fn storage_type(&self, name: &str) -> Option<String> {
        self.state.lock().unwrap().databases.get(name).cloned()
    }

    pub fn resolve_count(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }

    pub fn engine_shutdowns(&self) -> usize {
        self.engine_shutdowns.load(Ordering::SeqCst)
    }

    pub fn storage_shutdowns(&self) -> usize {
        self.storage_shutdowns.load(Ordering::SeqCst)
    }

    fn ensure_online(&self, url: &str) -> Result<()> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(ConnectionError::Failed(format!("connection refused: {}", url)));
        }
        Ok(())
    }

    fn check_credentials(&self, user: &str, password: &str) -> Result<()> {
        if user != self.user || password != self.password {
            return Err(ConnectionError::AuthFailed);
        }
        Ok(())
    }
}

fn split_url(url: &str) -> Result<&str> {
    url.rsplit_once('/')
        .map(|(_, name)| name)
        .ok_or_else(|| {
            ConnectionError::InvalidConnectionString(format!("expected host/name, got '{}'", url))
        })
}

pub struct MemoryEngine {
    server: Arc<MemoryServer>,
}

#[async_trait]
impl Engine for MemoryEngine {
    async fn resolve(
        &self,
        url: &str,
        _options: &StorageOptions,
    ) -> Result<Arc<dyn StorageHandle>> {
        self.server.ensure_online(url)?;
        let name = split_url(url)?;
        if self.server.storage_type(name).is_none() {
            return Err(ConnectionError::NotFound(name.to_string()));
        }

        self.server.resolves.fetch_add(1, Ordering::SeqCst);
        debug!(url = %url, "memory storage resolved");
        Ok(Arc::new(MemoryStorage {
            server: self.server.clone(),
            name: name.to_string(),
            url: url.to_string(),
            live: AtomicBool::new(true),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        self.server.engine_shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MemoryStorage {
    server: Arc<MemoryServer>,
    name: String,
    url: String,
    live: AtomicBool,
}

#[async_trait]
impl StorageHandle for MemoryStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn authenticate(&self, user: &str, password: &str) -> Result<()> {
        if !self.live.load(Ordering::SeqCst) {
            return Err(ConnectionError::Failed(format!("storage {} is shut down", self.name)));
        }
        self.server.check_credentials(user, password)
    }

    async fn shutdown(&self) -> Result<()> {
        if !self.live.swap(false, Ordering::SeqCst) {
            return Err(ConnectionError::Failed(format!(
                "storage {} already shut down",
                self.name
            )));
        }
        self.server.storage_shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MemoryAdminClient {
    server: Arc<MemoryServer>,
}

impl AdminClient for MemoryAdminClient {
    fn connection(&self, url: &str) -> Result<Box<dyn AdminConnection>> {
        Ok(Box::new(MemoryAdminConnection {
            server: self.server.clone(),
            url: url.to_string(),
            connected: false,
        }))
    }
}

pub struct MemoryAdminConnection {
    server: Arc<MemoryServer>,
    url: String,
    connected: bool,
}

impl MemoryAdminConnection {
    fn ensure_connected(&self) -> Result<()> {
        if !self.connected {
            return Err(ConnectionError::Failed("admin connection not open".into()));
        }
        self.server.ensure_online(&self.url)
    }
}

#[async_trait]
impl AdminConnection for MemoryAdminConnection {
    async fn connect(&mut self, user: &str, password: &str) -> Result<()> {
        self.server.ensure_online(&self.url)?;
        self.server.check_credentials(user, password)?;
        self.connected = true;
        Ok(())
    }

    async fn create_database(
        &mut self,
        name: &str,
        _options: Option<&StorageOptions>,
        storage_type: Option<&str>,
    ) -> Result<()> {
        self.ensure_connected()?;
        let mut state = self.server.state.lock().unwrap();
        if state.databases.contains_key(name) {
            return Err(ConnectionError::AlreadyExists(name.to_string()));
        }
        let storage_type = storage_type.unwrap_or(DEFAULT_STORAGE_TYPE);
        state
            .databases
            .insert(name.to_string(), storage_type.to_string());
        Ok(())
    }

    async fn drop_database(
        &mut self,
        name: &str,
        _options: Option<&StorageOptions>,
    ) -> Result<()> {
        self.ensure_connected()?;
        self.server
            .state
            .lock()
            .unwrap()
            .databases
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ConnectionError::NotFound(name.to_string()))
    }

    async fn exists_database(
        &mut self,
        name: &str,
        _options: Option<&StorageOptions>,
    ) -> Result<bool> {
        self.ensure_connected()?;
        Ok(self.server.state.lock().unwrap().databases.contains_key(name))
    }

    async fn list_databases(&mut self) -> Result<HashMap<String, String>> {
        self.ensure_connected()?;
        let state = self.server.state.lock().unwrap();
        Ok(state
            .databases
            .iter()
            .map(|(name, storage_type)| (name.clone(), format!("{}:{}", storage_type, name)))
            .collect())
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }
}
