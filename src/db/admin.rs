//! Single-use administrative connections
//!
//! Every privileged operation (create, drop, exists, list) goes through
//! [`AdminSession::execute`]: build a connection for the url, authenticate,
//! run the operation, close. The connection is closed on every path once it
//! exists, and failures come back as [`ConnectionError::Database`].

use futures::future::BoxFuture;
use tracing::{debug, warn};

use super::driver::{AdminClient, AdminConnection};
use super::error::{ConnectionError, Result};

/// One authenticated admin connection, alive for a single operation
pub struct AdminSession {
    url: String,
    conn: Box<dyn AdminConnection>,
}

impl AdminSession {
    /// Run `operation` against a fresh admin connection to `url`.
    ///
    /// `op` and `database` only label the error and the log lines.
    pub async fn execute<T, F>(
        client: &dyn AdminClient,
        url: &str,
        op: &'static str,
        database: &str,
        user: &str,
        password: &str,
        operation: F,
    ) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut dyn AdminConnection) -> BoxFuture<'a, Result<T>>,
    {
        let session = client
            .connection(url)
            .map(|conn| AdminSession {
                url: url.to_string(),
                conn,
            })
            .map_err(|e| ConnectionError::database(op, database, e))?;

        debug!(url = %url, op, "running admin operation");
        session
            .run(user, password, operation)
            .await
            .map_err(|e| ConnectionError::database(op, database, e))
    }

    async fn run<T, F>(mut self, user: &str, password: &str, operation: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut dyn AdminConnection) -> BoxFuture<'a, Result<T>>,
    {
        let outcome = match self.conn.connect(user, password).await {
            Ok(()) => operation(self.conn.as_mut()).await,
            Err(e) => Err(e),
        };

        if let Err(e) = self.conn.close().await {
            warn!(url = %self.url, error = %e, "failed to close admin connection");
        }
        outcome
    }
}
