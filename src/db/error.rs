use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during database operations
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Connection failed: {0}")]
    Failed(String),
    #[error("Authentication failed")]
    AuthFailed,
    #[error("Connection timeout after {0:?}")]
    Timeout(Duration),
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),
    #[error("Driver not available: {0} (not compiled)")]
    DriverNotAvailable(&'static str),
    #[error("Database not found: {0}")]
    NotFound(String),
    #[error("Database already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
    #[error("Connection factory is closed")]
    Closed,
    /// An administrative operation failed. The original error is kept as the source.
    #[error("Error executing {op} on remote database '{database}'")]
    Database {
        op: &'static str,
        database: String,
        #[source]
        source: Box<ConnectionError>,
    },
}

impl ConnectionError {
    pub fn database(op: &'static str, database: &str, cause: ConnectionError) -> Self {
        ConnectionError::Database {
            op,
            database: database.to_string(),
            source: Box::new(cause),
        }
    }

    pub fn is_database_error(&self) -> bool {
        matches!(self, ConnectionError::Database { .. })
    }
}

pub type Result<T> = std::result::Result<T, ConnectionError>;
