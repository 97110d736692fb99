use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Extra storage options forwarded to the engine or the admin endpoint
pub type StorageOptions = HashMap<String, serde_json::Value>;

/// Storage type requested when creating a database
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    Memory,
    Plocal,
    /// Engine-specific storage type with no fixed wire token
    Custom(String),
}

impl DatabaseType {
    pub fn name(&self) -> &str {
        match self {
            DatabaseType::Memory => "memory",
            DatabaseType::Plocal => "plocal",
            DatabaseType::Custom(name) => name,
        }
    }

    /// Token sent to the admin endpoint. `None` lets the server pick its default.
    pub fn wire_token(&self) -> Option<&'static str> {
        match self {
            DatabaseType::Memory => Some("memory"),
            DatabaseType::Plocal => Some("plocal"),
            DatabaseType::Custom(_) => None,
        }
    }
}

/// Builds the url of a database on a remote host
pub fn database_url(host: &str, name: &str) -> String {
    format!("{}/{}", host, name)
}
