//! Backend collaborators.
//!
//! View-models reach the backend only through the traits re-exported here.

mod feed;
pub mod local;
mod storage;
mod store;
pub mod supabase;

use std::path::Path;
use std::sync::Arc;

pub use feed::{ChangeEvent, ChangeFeed, ChangeFilter, ChangeKind, Subscription, Table};
pub use storage::{FunctionInvoker, ObjectStorage};
pub use store::RecordStore;

use crate::auth::AuthProvider;
use crate::config::{BackendTarget, ClientConfig};
use crate::error::Result;
use crate::session::SessionContext;

/// Collaborators bound to one backend and one session.
#[derive(Clone)]
pub struct Backend {
    pub auth: Arc<dyn AuthProvider>,
    pub store: Arc<dyn RecordStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub feed: Arc<dyn ChangeFeed>,
    pub functions: Arc<dyn FunctionInvoker>,
    pub session: SessionContext,
    /// Bucket for gallery images and avatars
    pub bucket: String,
}

impl Backend {
    /// Connect to whichever backend `config` selects.
    pub async fn connect(config: &ClientConfig, data_dir: &Path) -> Result<Self> {
        let bucket = config.image_bucket().to_string();
        match config.target(data_dir)? {
            BackendTarget::Hosted { url, anon_key } => {
                tracing::info!("Using hosted backend at {url}");
                Self::supabase(&url, &anon_key, bucket)
            }
            BackendTarget::Local {
                db_path,
                storage_dir,
            } => Self::open_local(db_path, storage_dir, bucket).await,
        }
    }

    /// Same collaborators acting for another session. Hosted services keep
    /// the session they were built with, so this is for local stores only.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_session(&self, session: SessionContext) -> Self {
        Self {
            session,
            ..self.clone()
        }
    }
}
