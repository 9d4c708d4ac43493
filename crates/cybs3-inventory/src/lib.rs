//! cybs3-inventory: local/remote inventories and the sync plan
//!
//! Independent of the crypto pipeline except for the pure
//! `encrypted_size` arithmetic used when comparing a local plaintext
//! against its encrypted remote counterpart.

pub mod plan;
pub mod scan;
pub mod watch;

pub use plan::{create_sync_plan, SyncPlan};
pub use scan::{compute_file_hash, scan_folder, LocalFileRecord};
pub use watch::{FileWatcher, WatchEvent};
