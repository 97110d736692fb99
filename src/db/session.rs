//! Document sessions over shared storage handles

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::OwnedSemaphorePermit;
use uuid::Uuid;

use super::driver::StorageHandle;
use super::error::{ConnectionError, Result};
use super::pool::SessionPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Open,
    Closed,
}

/// A caller's session on one database.
///
/// Many sessions can share the same storage handle. Closing a session never
/// shuts the handle down; that is left to the factory.
pub struct DocumentSession {
    id: String,
    handle: Arc<dyn StorageHandle>,
    user: Option<String>,
    state: SessionState,
}

impl DocumentSession {
    pub fn new(handle: Arc<dyn StorageHandle>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            handle,
            user: None,
            state: SessionState::Created,
        }
    }

    /// Authenticate against the storage handle and mark the session open
    pub async fn internal_open(&mut self, user: &str, password: &str) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(ConnectionError::Closed);
        }
        self.handle.authenticate(user, password).await?;
        self.user = Some(user.to_string());
        self.state = SessionState::Open;
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn database_name(&self) -> &str {
        self.handle.name()
    }

    pub fn url(&self) -> &str {
        self.handle.url()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn handle(&self) -> &Arc<dyn StorageHandle> {
        &self.handle
    }

    /// True when both sessions run over the same storage handle
    pub fn shares_handle_with(&self, other: &DocumentSession) -> bool {
        Arc::as_ptr(&self.handle).cast::<()>() == Arc::as_ptr(&other.handle).cast::<()>()
    }

    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}

impl fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSession")
            .field("id", &self.id)
            .field("url", &self.handle.url())
            .field("user", &self.user)
            .field("state", &self.state)
            .finish()
    }
}

/// A session borrowed from a [`SessionPool`].
///
/// `close()` hands the session back to the pool. Dropping it instead frees
/// the pool slot and discards the session.
pub struct PooledSession {
    session: DocumentSession,
    pool: Arc<SessionPool>,
    permit: Option<OwnedSemaphorePermit>,
}

impl PooledSession {
    pub fn new(pool: Arc<SessionPool>, session: DocumentSession) -> Self {
        Self {
            session,
            pool,
            permit: None,
        }
    }

    pub(crate) fn with_permit(mut self, permit: OwnedSemaphorePermit) -> Self {
        self.permit = Some(permit);
        self
    }

    pub fn pool(&self) -> &Arc<SessionPool> {
        &self.pool
    }

    /// Return the session to its pool
    pub fn close(self) {
        let PooledSession {
            session,
            pool,
            permit,
        } = self;
        pool.release(session);
        // Release the slot only after the session is idle again.
        drop(permit);
    }
}

impl Deref for PooledSession {
    type Target = DocumentSession;

    fn deref(&self) -> &DocumentSession {
        &self.session
    }
}

impl DerefMut for PooledSession {
    fn deref_mut(&mut self) -> &mut DocumentSession {
        &mut self.session
    }
}

impl fmt::Debug for PooledSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledSession")
            .field("session", &self.session)
            .field("database", &self.pool.database_name())
            .finish()
    }
}
