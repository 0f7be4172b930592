//! Driven adapters implementing the domain ports.

pub mod gateway;
pub mod identity;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
