//! Schema evolution for a SQL-backed [`crate::Store`]. Migrations are
//! ordered and forward-only (§6); the in-process [`crate::MemoryStore`]
//! has no schema to migrate, so its [`Migrator`] impl is a no-op that
//! exists only so callers don't special-case the backend at startup.

use crate::StoreError;
use async_trait::async_trait;

#[async_trait]
pub trait Migrator: Send + Sync {
    /// Applies any migration under `crates/storage/migrations/` not yet
    /// recorded as applied, in filename order. Idempotent.
    async fn migrate(&self) -> Result<(), StoreError>;
}

pub struct NoopMigrator;

#[async_trait]
impl Migrator for NoopMigrator {
    async fn migrate(&self) -> Result<(), StoreError> {
        tracing::debug!("in-process store has no schema to migrate");
        Ok(())
    }
}
