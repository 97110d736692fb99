//! Database driver implementations
//! Each driver is conditionally compiled based on features

#[cfg(feature = "memory-driver")]
pub mod memory;
