//! Client-side connection factory for remote document databases.
//!
//! [`RemoteFactory`] keeps one storage handle per database name, opens plain
//! and pooled sessions over those handles, runs create/drop/exists/list
//! through single-use admin connections, and tears everything down once on
//! close.

pub mod config;
pub mod db;

pub use crate::config::{FactorySettings, PoolSettings};
pub use db::{
    ConnectionError, DatabaseType, DocumentSession, Driver, PooledSession, RemoteFactory,
    SessionPool,
};
