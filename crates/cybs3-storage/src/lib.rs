//! cybs3-storage: pluggable object-storage backends
//!
//! The orchestrator consumes storage through the narrow `StorageClient`
//! capability; the wire-level REST protocol lives behind OpenDAL.

pub mod client;
pub mod memory;
pub mod opendal_client;

pub use client::{ObjectMetadata, RemoteObject, StorageClient, StorageClientFactory};
pub use memory::MemoryStorageClient;
pub use opendal_client::{build_operator, OpendalFactory, OpendalStorageClient};
