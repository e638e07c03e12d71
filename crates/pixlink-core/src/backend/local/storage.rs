//! Filesystem object storage.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::backend::ObjectStorage;
use crate::error::{Error, Result};
use crate::util::is_http_url;

const FILE_SCHEME: &str = "file://";

/// Stores objects under `<root>/<bucket>/<path>` and serves `file://` URLs.
#[derive(Debug, Clone)]
pub struct FsObjectStorage {
    root: PathBuf,
    http: reqwest::Client,
}

impl FsObjectStorage {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            http: reqwest::Client::new(),
        })
    }

    fn object_path(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
        if path.trim().is_empty() || escapes || bucket.contains(['/', '\\']) || bucket.is_empty()
        {
            return Err(Error::Storage(format!("invalid object path '{bucket}/{path}'")));
        }
        Ok(self.root.join(bucket).join(relative))
    }
}

#[async_trait]
impl ObjectStorage for FsObjectStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let target = self.object_path(bucket, path)?;
        if tokio::fs::try_exists(&target).await? {
            return Err(Error::Storage(format!("object '{bucket}/{path}' already exists")));
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        tracing::debug!(bucket, path, content_type, "stored object");
        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        for path in paths {
            let target = self.object_path(bucket, path)?;
            match tokio::fs::remove_file(&target).await {
                Ok(()) => tracing::debug!(bucket, path = %path, "removed object"),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => return Err(error.into()),
            }
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{FILE_SCHEME}{}",
            self.root.join(bucket).join(path).to_string_lossy()
        )
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(path) = url.strip_prefix(FILE_SCHEME) {
            return Ok(tokio::fs::read(path).await?);
        }
        if is_http_url(url) {
            let response = self.http.get(url).send().await?.error_for_status()?;
            return Ok(response.bytes().await?.to_vec());
        }
        Err(Error::Storage(format!("unsupported object URL '{url}'")))
    }
}
