//! The Durable Store (§4.1): an async trait contract plus an in-process
//! implementation. A SQL-backed implementation is a drop-in replacement —
//! nothing outside this crate depends on `MemoryStore` directly.

pub mod error;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use migrations::{Migrator, NoopMigrator};
pub use traits::Store;
