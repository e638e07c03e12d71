//! Object storage and generated-function collaborators.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<()>;

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()>;

    /// Public URL of an object. No network call.
    fn public_url(&self, bucket: &str, path: &str) -> String;

    /// Download the bytes behind a public URL.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Serverless function calls.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(&self, name: &str, body: serde_json::Value) -> Result<serde_json::Value>;
}
