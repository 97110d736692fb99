//! Recording and fault-injecting collaborators for unit tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::connection::StorageOptions;
use super::driver::{AdminClient, AdminConnection, Driver, Engine, StorageHandle};
use super::error::{ConnectionError, Result};

pub struct RecordingHandle {
    name: String,
    url: String,
    pub shutdowns: AtomicUsize,
    pub fail_shutdown: AtomicBool,
}

impl RecordingHandle {
    pub fn new(name: &str, url: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            url: url.to_string(),
            shutdowns: AtomicUsize::new(0),
            fail_shutdown: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl StorageHandle for RecordingHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn authenticate(&self, _user: &str, password: &str) -> Result<()> {
        if password == "wrong" {
            return Err(ConnectionError::AuthFailed);
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        if self.fail_shutdown.load(Ordering::SeqCst) {
            return Err(ConnectionError::Failed("storage refused to shut down".into()));
        }
        Ok(())
    }
}

/// Engine that records every resolve and hands out `RecordingHandle`s
#[derive(Default)]
pub struct RecordingEngine {
    pub resolved: Mutex<Vec<String>>,
    pub handles: Mutex<HashMap<String, Arc<RecordingHandle>>>,
    pub shutdowns: AtomicUsize,
    /// Names whose teardown should fail
    pub failing: Mutex<Vec<String>>,
    /// Widens the window between lookup and insert
    pub resolve_delay: Option<Duration>,
}

impl RecordingEngine {
    pub fn resolve_count(&self) -> usize {
        self.resolved.lock().unwrap().len()
    }

    pub fn handle(&self, name: &str) -> Arc<RecordingHandle> {
        self.handles.lock().unwrap()[name].clone()
    }
}

#[async_trait]
impl Engine for RecordingEngine {
    async fn resolve(
        &self,
        url: &str,
        options: &StorageOptions,
    ) -> Result<Arc<dyn StorageHandle>> {
        assert!(options.is_empty());
        if let Some(delay) = self.resolve_delay {
            tokio::time::sleep(delay).await;
        }
        self.resolved.lock().unwrap().push(url.to_string());

        let (_, name) = url
            .rsplit_once('/')
            .ok_or_else(|| ConnectionError::InvalidConnectionString(url.to_string()))?;
        if name == "unreachable" {
            return Err(ConnectionError::Failed(format!("cannot reach {}", url)));
        }
        let handle = RecordingHandle::new(name, url);
        if self.failing.lock().unwrap().iter().any(|n| n == name) {
            handle.fail_shutdown.store(true, Ordering::SeqCst);
        }
        self.handles
            .lock()
            .unwrap()
            .insert(name.to_string(), handle.clone());
        Ok(handle)
    }

    async fn shutdown(&self) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Where a `ScriptedAdmin` connection should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminFault {
    None,
    Construct,
    Connect,
    Execute,
    Close,
}

/// Admin client whose connections record calls and fail on demand
pub struct ScriptedAdmin {
    pub fault: Mutex<AdminFault>,
    pub urls: Mutex<Vec<String>>,
    pub connections: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
    pub created: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl ScriptedAdmin {
    pub fn new(fault: AdminFault) -> Arc<Self> {
        Arc::new(Self {
            fault: Mutex::new(fault),
            urls: Mutex::new(Vec::new()),
            connections: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
            created: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn set_fault(&self, fault: AdminFault) {
        *self.fault.lock().unwrap() = fault;
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl AdminClient for ScriptedAdmin {
    fn connection(&self, url: &str) -> Result<Box<dyn AdminConnection>> {
        let fault = *self.fault.lock().unwrap();
        if fault == AdminFault::Construct {
            return Err(ConnectionError::InvalidConnectionString(url.to_string()));
        }
        self.urls.lock().unwrap().push(url.to_string());
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedConnection {
            fault,
            closes: self.closes.clone(),
            created: self.created.clone(),
        }))
    }
}

struct ScriptedConnection {
    fault: AdminFault,
    closes: Arc<AtomicUsize>,
    created: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl ScriptedConnection {
    fn execute(&self) -> Result<()> {
        if self.fault == AdminFault::Execute {
            return Err(ConnectionError::Failed("broken pipe".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AdminConnection for ScriptedConnection {
    async fn connect(&mut self, _user: &str, _password: &str) -> Result<()> {
        if self.fault == AdminFault::Connect {
            return Err(ConnectionError::Failed("connection refused".into()));
        }
        Ok(())
    }

    async fn create_database(
        &mut self,
        name: &str,
        _options: Option<&StorageOptions>,
        storage_type: Option<&str>,
    ) -> Result<()> {
        self.execute()?;
        self.created
            .lock()
            .unwrap()
            .push((name.to_string(), storage_type.map(str::to_string)));
        Ok(())
    }

    async fn drop_database(
        &mut self,
        _name: &str,
        _options: Option<&StorageOptions>,
    ) -> Result<()> {
        self.execute()
    }

    async fn exists_database(
        &mut self,
        name: &str,
        _options: Option<&StorageOptions>,
    ) -> Result<bool> {
        self.execute()?;
        Ok(name == "sales")
    }

    async fn list_databases(&mut self) -> Result<HashMap<String, String>> {
        self.execute()?;
        Ok(HashMap::from([
            ("sales".to_string(), "plocal:sales".to_string()),
            ("hr".to_string(), "memory:hr".to_string()),
        ]))
    }

    async fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fault == AdminFault::Close {
            return Err(ConnectionError::Failed("socket already closed".into()));
        }
        Ok(())
    }
}

pub fn driver(engine: &Arc<RecordingEngine>, admin: &Arc<ScriptedAdmin>) -> Driver {
    Driver::new(engine.clone(), admin.clone())
}
