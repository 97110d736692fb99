//! Bounded pool of sessions on one database

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tracing::debug;

use super::error::{ConnectionError, Result};
use super::factory::RemoteFactory;
use super::session::{DocumentSession, PooledSession};
use crate::config::PoolSettings;

/// Sessions for one database and one set of credentials.
///
/// New sessions come from [`RemoteFactory::pool_open`]; sessions handed back
/// with [`PooledSession::close`] are kept idle and reused.
pub struct SessionPool {
    factory: Arc<RemoteFactory>,
    name: String,
    user: String,
    password: String,
    settings: PoolSettings,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<DocumentSession>>,
    closed: AtomicBool,
}

impl SessionPool {
    /// Build a pool. `max_size` must be at least 1 and is capped at
    /// [`Semaphore::MAX_PERMITS`].
    pub fn new(
        factory: Arc<RemoteFactory>,
        name: &str,
        user: &str,
        password: &str,
        mut settings: PoolSettings,
    ) -> Result<Arc<Self>> {
        settings.validate()?;
        settings.max_size = settings.max_size.min(Semaphore::MAX_PERMITS);

        Ok(Arc::new(Self {
            factory,
            name: name.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            permits: Arc::new(Semaphore::new(settings.max_size)),
            settings,
            idle: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }))
    }

    pub fn database_name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Sessions currently checked out
    pub fn in_use(&self) -> usize {
        self.settings.max_size - self.permits.available_permits()
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Take a session, waiting up to the acquire timeout for a free slot
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledSession> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }

        let timeout = self.settings.acquire_timeout();
        let permit = tokio::time::timeout(timeout, self.permits.clone().acquire_owned())
            .await
            .map_err(|_| ConnectionError::Timeout(timeout))?
            .map_err(|_| ConnectionError::Closed)?;

        while let Some(session) = self.take_idle() {
            if self.factory.is_current(&self.name, &session).await {
                debug!(
                    database = %self.name,
                    session = session.id(),
                    "reusing pooled session"
                );
                return Ok(PooledSession::new(self.clone(), session).with_permit(permit));
            }
        }

        let session = self
            .factory
            .pool_open(&self.name, &self.user, &self.password, self)
            .await?;
        Ok(session.with_permit(permit))
    }

    fn take_idle(&self) -> Option<DocumentSession> {
        self.idle.lock().unwrap().pop()
    }

    pub(crate) fn release(&self, mut session: DocumentSession) {
        if self.is_closed() || !session.is_open() {
            session.close();
            return;
        }
        self.idle.lock().unwrap().push(session);
    }

    /// Discard idle sessions and refuse further acquires
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.permits.close();
        let mut idle = self.idle.lock().unwrap();
        for session in idle.iter_mut() {
            session.close();
        }
        idle.clear();
        debug!(database = %self.name, "session pool closed");
    }
}

impl fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionPool")
            .field("database", &self.name)
            .field("user", &self.user)
            .field("settings", &self.settings)
            .field("closed", &self.is_closed())
            .finish()
    }
}
