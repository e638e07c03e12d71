//! Backend running entirely on this machine.
//!
//! Records live in a libSQL database, objects in a directory, and changes are
//! broadcast in-process. AI generation needs the hosted function and is
//! reported as unavailable.

mod auth;
mod connection;
mod hub;
mod migrations;
mod repository;
mod storage;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

pub use auth::LocalAuth;
pub use connection::Database;
pub use hub::ChangeHub;
pub use repository::LocalStore;
pub use storage::FsObjectStorage;

use super::{Backend, FunctionInvoker};
use crate::error::{Error, Result};
use crate::session::SessionContext;

/// Function invoker for backends without serverless functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFunctions;

#[async_trait]
impl FunctionInvoker for NoFunctions {
    async fn invoke(&self, name: &str, _body: serde_json::Value) -> Result<serde_json::Value> {
        Err(Error::Generation(format!(
            "function '{name}' is only available with a hosted backend"
        )))
    }
}

impl Backend {
    /// Open the local backend at `db_path`, storing objects under `storage_dir`.
    pub async fn open_local(
        db_path: impl AsRef<Path>,
        storage_dir: impl AsRef<Path>,
        bucket: impl Into<String>,
    ) -> Result<Self> {
        let db = Database::open(db_path.as_ref()).await?;
        tracing::info!("Running in local-only mode at {}", db_path.as_ref().display());
        Self::from_local_database(db, FsObjectStorage::new(storage_dir.as_ref())?, bucket)
    }

    /// Local backend over an in-memory database.
    pub async fn open_local_in_memory(
        storage_dir: impl AsRef<Path>,
        bucket: impl Into<String>,
    ) -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Self::from_local_database(db, FsObjectStorage::new(storage_dir.as_ref())?, bucket)
    }

    fn from_local_database(
        db: Database,
        storage: FsObjectStorage,
        bucket: impl Into<String>,
    ) -> Result<Self> {
        let db = Arc::new(Mutex::new(db));
        let hub = ChangeHub::new();
        Ok(Self {
            auth: Arc::new(LocalAuth::new(Arc::clone(&db))),
            store: Arc::new(LocalStore::new(db, hub.clone())),
            storage: Arc::new(storage),
            feed: Arc::new(hub),
            functions: Arc::new(NoFunctions),
            session: SessionContext::new(),
            bucket: bucket.into(),
        })
    }
}
