pub mod admin;
pub mod connection;
pub mod driver;
pub mod drivers;
pub mod error;
pub mod factory;
pub mod handles;
pub mod pool;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use admin::AdminSession;
pub use connection::{DatabaseType, StorageOptions};
pub use driver::{AdminClient, AdminConnection, Driver, Engine, StorageHandle};
pub use error::{ConnectionError, Result};
pub use factory::RemoteFactory;
pub use handles::HandleTable;
pub use pool::SessionPool;
pub use session::{DocumentSession, PooledSession, SessionState};
