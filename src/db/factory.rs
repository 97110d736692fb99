//! Connection factory for a remote database server
//!
//! The factory owns one storage handle per database name and builds
//! sessions over them. Administrative operations run on their own
//! throwaway connections and never touch the handle table.
//!
//! ```text
//! open / pool_open ──lock──> HandleTable ──miss──> Engine::resolve
//!                                 │
//!                                 └──> DocumentSession::internal_open
//!
//! create / drop / exist / list ──> AdminSession::execute (no lock)
//!
//! close ──lock──> drain handles ──> shutdown each ──> Engine::shutdown (once)
//! ```

use futures::future::BoxFuture;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::admin::AdminSession;
use super::connection::{database_url, DatabaseType, StorageOptions};
use super::driver::{AdminClient, AdminConnection, Driver, Engine, StorageHandle};
use super::error::{ConnectionError, Result};
use super::handles::HandleTable;
use super::pool::SessionPool;
use super::session::{DocumentSession, PooledSession};
use crate::config::{FactorySettings, PoolSettings};

#[derive(Default)]
struct FactoryState {
    handles: HandleTable,
    closed: bool,
}

/// Opens sessions and runs administrative operations against one remote server
pub struct RemoteFactory {
    host: String,
    settings: FactorySettings,
    engine: Arc<dyn Engine>,
    admin: Arc<dyn AdminClient>,
    state: Mutex<FactoryState>,
    closed: AtomicBool,
    engine_shutdown: OnceCell<()>,
}

impl RemoteFactory {
    pub fn new(settings: FactorySettings, driver: Driver) -> Result<Arc<Self>> {
        let host = validate_hosts(&settings.hosts)?;
        if settings.hosts.len() > 1 {
            debug!(
                host = %host,
                ignored = settings.hosts.len() - 1,
                "only the first configured host is used"
            );
        }

        Ok(Arc::new(Self {
            host,
            settings,
            engine: driver.engine,
            admin: driver.admin,
            state: Mutex::new(FactoryState::default()),
            closed: AtomicBool::new(false),
            engine_shutdown: OnceCell::new(),
        }))
    }

    pub fn settings(&self) -> &FactorySettings {
        &self.settings
    }

    fn build_url(&self, name: &str) -> String {
        database_url(&self.host, name)
    }

    /// Open a session on `name`, resolving its storage handle on first use
    pub async fn open(&self, name: &str, user: &str, password: &str) -> Result<DocumentSession> {
        let mut state = self.state.lock().await;
        let handle = self.storage_handle(&mut state, name).await?;

        let mut session = DocumentSession::new(handle);
        session.internal_open(user, password).await?;
        Ok(session)
    }

    /// Open a session that returns itself to `pool` when closed
    pub async fn pool_open(
        &self,
        name: &str,
        user: &str,
        password: &str,
        pool: &Arc<SessionPool>,
    ) -> Result<PooledSession> {
        let mut state = self.state.lock().await;
        let handle = self.storage_handle(&mut state, name).await?;

        let mut session = DocumentSession::new(handle);
        session.internal_open(user, password).await?;
        Ok(PooledSession::new(pool.clone(), session))
    }

    async fn storage_handle(
        &self,
        state: &mut FactoryState,
        name: &str,
    ) -> Result<Arc<dyn StorageHandle>> {
        if state.closed {
            return Err(ConnectionError::Closed);
        }
        if let Some(handle) = state.handles.get(name) {
            debug!(database = name, "reusing storage handle");
            return Ok(handle);
        }

        let url = self.build_url(name);
        debug!(url = %url, "resolving storage handle");
        let handle = self.engine.resolve(&url, &StorageOptions::new()).await?;
        state.handles.insert(name, handle.clone());
        Ok(handle)
    }

    /// Whether `session` still runs over the handle this factory holds for it
    pub(crate) async fn is_current(&self, name: &str, session: &DocumentSession) -> bool {
        let state = self.state.lock().await;
        if state.closed {
            return false;
        }
        state.handles.get(name).is_some_and(|handle| {
            Arc::as_ptr(&handle).cast::<()>() == Arc::as_ptr(session.handle()).cast::<()>()
        })
    }

    pub async fn create(
        &self,
        name: &str,
        user: &str,
        password: &str,
        database_type: DatabaseType,
    ) -> Result<()> {
        let db = name.to_string();
        self.connect_and_execute("create", name, user, password, move |admin| {
            Box::pin(async move {
                admin
                    .create_database(&db, None, database_type.wire_token())
                    .await
            })
        })
        .await
    }

    pub async fn exist(&self, name: &str, user: &str, password: &str) -> Result<bool> {
        let db = name.to_string();
        self.connect_and_execute("exists", name, user, password, move |admin| {
            // TODO: memory databases may need storage options here; pass them once the
            // server documents what it expects for memory storage.
            Box::pin(async move { admin.exists_database(&db, None).await })
        })
        .await
    }

    pub async fn drop_database(&self, name: &str, user: &str, password: &str) -> Result<()> {
        let db = name.to_string();
        self.connect_and_execute("drop", name, user, password, move |admin| {
            // TODO: same memory storage options question as exist().
            Box::pin(async move { admin.drop_database(&db, None).await })
        })
        .await
    }

    /// Names of every database on the server
    pub async fn list_databases(&self, user: &str, password: &str) -> Result<BTreeSet<String>> {
        self.connect_and_execute("list", "", user, password, |admin| {
            Box::pin(async move {
                let databases = admin.list_databases().await?;
                Ok(databases.into_keys().collect())
            })
        })
        .await
    }

    async fn connect_and_execute<T, F>(
        &self,
        op: &'static str,
        name: &str,
        user: &str,
        password: &str,
        operation: F,
    ) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut dyn AdminConnection) -> BoxFuture<'a, Result<T>>,
    {
        let url = self.build_url(name);
        AdminSession::execute(
            self.admin.as_ref(),
            &url,
            op,
            name,
            user,
            password,
            operation,
        )
        .await
    }

    /// Create a pool whose sessions come from [`RemoteFactory::pool_open`].
    ///
    /// `settings` falls back to the factory's configured pool settings. A
    /// `max_size` of 0 is rejected with [`ConnectionError::InvalidSettings`].
    pub fn open_pool(
        self: &Arc<Self>,
        name: &str,
        user: &str,
        password: &str,
        settings: Option<PoolSettings>,
    ) -> Result<Arc<SessionPool>> {
        let settings = settings.unwrap_or_else(|| self.settings.pool.clone());
        SessionPool::new(self.clone(), name, user, password, settings)
    }

    /// Names of the databases that currently hold a storage handle
    pub async fn open_databases(&self) -> Vec<String> {
        self.state.lock().await.handles.names()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Shut down every storage handle, then the engine.
    ///
    /// Teardown failures are logged and skipped. Safe to call more than once:
    /// later calls find an empty table and the engine is only shut down once.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        self.closed.store(true, Ordering::SeqCst);

        for handle in state.handles.drain() {
            info!(storage = handle.name(), "shutting down storage");
            if let Err(e) = handle.shutdown().await {
                warn!(storage = handle.name(), error = %e, "error on storage shutdown");
            }
        }
        drop(state);

        self.engine_shutdown
            .get_or_init(|| async move {
                info!("shutting down remote engine");
                if let Err(e) = self.engine.shutdown().await {
                    warn!(error = %e, "error on engine shutdown");
                }
            })
            .await;
    }

    /// Close the factory when the process receives ctrl-c.
    ///
    /// Manual `close()` calls before or after the signal are harmless.
    pub fn close_on_shutdown_signal(self: &Arc<Self>) -> JoinHandle<()> {
        self.close_when(tokio::signal::ctrl_c())
    }

    /// Close the factory once `signal` resolves successfully
    pub fn close_when<F>(self: &Arc<Self>, signal: F) -> JoinHandle<()>
    where
        F: Future<Output = std::io::Result<()>> + Send + 'static,
    {
        let factory = self.clone();
        tokio::spawn(async move {
            match signal.await {
                Ok(()) => factory.close().await,
                Err(e) => warn!(error = %e, "unable to listen for shutdown signal"),
            }
        })
    }
}

impl Drop for RemoteFactory {
    /// A factory dropped without `close()` still shuts its storage and engine
    /// down, on the current tokio runtime.
    fn drop(&mut self) {
        if self.engine_shutdown.initialized() {
            return;
        }
        let handles = self.state.get_mut().handles.drain();

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(
                    handles = handles.len(),
                    "connection factory dropped without close outside a runtime"
                );
                return;
            }
        };

        let engine = self.engine.clone();
        runtime.spawn(async move {
            for handle in handles {
                info!(storage = handle.name(), "shutting down storage");
                if let Err(e) = handle.shutdown().await {
                    warn!(storage = handle.name(), error = %e, "error on storage shutdown");
                }
            }
            info!("shutting down remote engine");
            if let Err(e) = engine.shutdown().await {
                warn!(error = %e, "error on engine shutdown");
            }
        });
    }
}

/// Check the host list and return the host every url is built from
fn validate_hosts(hosts: &[String]) -> Result<String> {
    let first = hosts.first().ok_or_else(|| {
        ConnectionError::InvalidConnectionString("no remote host configured".into())
    })?;

    for host in hosts {
        let parsed = Url::parse(&format!("remote://{}", host))
            .map_err(|e| ConnectionError::InvalidConnectionString(format!("{}: {}", host, e)))?;
        if parsed.host_str().map_or(true, str::is_empty) || !parsed.path().is_empty() {
            return Err(ConnectionError::InvalidConnectionString(format!(
                "host must be host[:port], got '{}'",
                host
            )));
        }
    }
    Ok(first.clone())
}
