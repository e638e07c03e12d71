//! Supabase storage API.

use async_trait::async_trait;

use super::{check, ApiContext};
use crate::backend::ObjectStorage;
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct SupabaseStorage {
    api: ApiContext,
}

impl SupabaseStorage {
    pub const fn new(api: ApiContext) -> Self {
        Self { api }
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        self.api.endpoint(&format!(
            "storage/v1/object/{bucket}/{}",
            path.trim_start_matches('/')
        ))
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let request = self
            .api
            .client()
            .post(self.object_url(bucket, path))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes);
        check(self.api.authorize(request).send().await?)
            .await
            .map_err(|error| Error::Storage(error.to_string()))?;
        tracing::debug!(bucket, path, "uploaded object");
        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        let request = self
            .api
            .client()
            .delete(self.api.endpoint(&format!("storage/v1/object/{bucket}")))
            .json(&serde_json::json!({ "prefixes": paths }));
        check(self.api.authorize(request).send().await?)
            .await
            .map_err(|error| Error::Storage(error.to_string()))?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.api.endpoint(&format!(
            "storage/v1/object/public/{bucket}/{}",
            path.trim_start_matches('/')
        ))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.api.client().get(url).send().await?;
        let response = check(response)
            .await
            .map_err(|error| Error::Storage(error.to_string()))?;
        Ok(response.bytes().await?.to_vec())
    }
}
