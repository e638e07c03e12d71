//! AI image generation and publishing.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::backend::Backend;
use crate::error::{Error, Result, ValidationError};
use crate::media::load_image_payload;
use crate::models::{generated_title, Image, NewImage};
use crate::util::unix_millis_now;

/// Serverless function that turns a prompt into an image
pub const GENERATE_FUNCTION: &str = "generate-ai-image";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct GenerateViewModel {
    backend: Backend,
    prompt: String,
    /// Data URL or http(s) URL of the last result
    generated: Option<String>,
}

impl GenerateViewModel {
    pub const fn new(backend: Backend) -> Self {
        Self {
            backend,
            prompt: String::new(),
            generated: None,
        }
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn generated(&self) -> Option<&str> {
        self.generated.as_deref()
    }

    /// Ask the generation function for an image of the current prompt.
    pub async fn generate(&mut self) -> Result<&str> {
        self.backend.session.require_user()?;
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(ValidationError::EmptyPrompt.into());
        }

        self.generated = None;
        let value = self
            .backend
            .functions
            .invoke(GENERATE_FUNCTION, serde_json::json!({ "prompt": prompt }))
            .await?;
        let response: GenerateResponse = serde_json::from_value(value)
            .map_err(|error| Error::Generation(format!("unexpected response: {error}")))?;

        if let Some(error) = response.error {
            return Err(Error::Generation(error));
        }
        let image_url = response
            .image_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| Error::Generation("no image was returned".to_string()))?;

        tracing::info!("Generated image for a {} character prompt", prompt.chars().count());
        Ok(self.generated.insert(image_url).as_str())
    }

    async fn generated_bytes(&self) -> Result<Vec<u8>> {
        let reference = self
            .generated
            .as_deref()
            .ok_or(ValidationError::NothingGenerated)?;
        load_image_payload(self.backend.storage.as_ref(), reference).await
    }

    /// Store the generated image and add it to the gallery.
    pub async fn publish(&self) -> Result<Image> {
        let user = self.backend.session.require_user()?;
        let bytes = self.generated_bytes().await?;

        let path = format!("{}/{}.png", user.id, unix_millis_now());
        let bucket = &self.backend.bucket;
        self.backend
            .storage
            .upload(bucket, &path, bytes, "image/png")
            .await?;

        let prompt = self.prompt.trim();
        let image = self
            .backend
            .store
            .insert_image(&NewImage {
                user_id: user.id,
                title: generated_title(prompt),
                description: Some(prompt.to_string()),
                image_url: self.backend.storage.public_url(bucket, &path),
                storage_path: Some(path),
            })
            .await?;
        tracing::info!("Published generated image {}", image.id);
        Ok(image)
    }

    /// Save the generated image into `dir` as `ai-image-<unix ms>.png`.
    pub async fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        let bytes = self.generated_bytes().await?;
        let target = dir.join(format!("ai-image-{}.png", unix_millis_now()));
        tokio::fs::write(&target, bytes).await?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::backend::FunctionInvoker;
    use crate::viewmodel::test_support::{local_backend, signed_in, signed_out};
    use pretty_assertions::assert_eq;

    struct Canned(Value);

    #[async_trait]
    impl FunctionInvoker for Canned {
        async fn invoke(&self, name: &str, body: Value) -> Result<Value> {
            assert_eq!(name, GENERATE_FUNCTION);
            assert!(body["prompt"].is_string());
            Ok(self.0.clone())
        }
    }

    fn with_response(backend: &Backend, response: Value) -> Backend {
        Backend {
            functions: Arc::new(Canned(response)),
            ..backend.clone()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn generate_then_publish() {
        let (backend, _dir) = local_backend().await;
        let ada = signed_in(&backend, "ada").await;
        let ada = with_response(&ada, json!({ "imageUrl": "data:image/png;base64,aGVsbG8=" }));

        let mut generate = GenerateViewModel::new(ada.clone());
        let prompt = format!("  {}  ", "a".repeat(120));
        generate.set_prompt(prompt.clone());
        generate.generate().await.unwrap();

        let image = generate.publish().await.unwrap();
        assert_eq!(image.title.chars().count(), 100);
        assert_eq!(image.description.as_deref(), Some(prompt.trim()));
        let stored = ada.storage.fetch(&image.image_url).await.unwrap();
        assert_eq!(stored, b"hello");

        let out = tempfile::TempDir::new().unwrap();
        let saved = generate.save_to(out.path()).await.unwrap();
        assert!(saved
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("ai-image-"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn function_errors_surface() {
        let (backend, _dir) = local_backend().await;
        let ada = signed_in(&backend, "ada").await;

        let mut failing = GenerateViewModel::new(with_response(&ada, json!({ "error": "quota" })));
        failing.set_prompt("cat");
        assert!(matches!(
            failing.generate().await,
            Err(Error::Generation(message)) if message == "quota"
        ));

        let mut empty = GenerateViewModel::new(with_response(&ada, json!({})));
        empty.set_prompt("cat");
        assert!(matches!(empty.generate().await, Err(Error::Generation(_))));
        assert!(matches!(
            empty.publish().await,
            Err(Error::Validation(ValidationError::NothingGenerated))
        ));

        let mut local = GenerateViewModel::new(ada);
        local.set_prompt("cat");
        assert!(matches!(local.generate().await, Err(Error::Generation(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn prompt_and_user_are_required() {
        let (backend, _dir) = local_backend().await;
        let ada = signed_in(&backend, "ada").await;

        let mut blank = GenerateViewModel::new(ada);
        blank.set_prompt("   ");
        assert!(matches!(
            blank.generate().await,
            Err(Error::Validation(ValidationError::EmptyPrompt))
        ));

        let mut anonymous = GenerateViewModel::new(signed_out(&backend));
        anonymous.set_prompt("cat");
        assert!(matches!(anonymous.generate().await, Err(Error::AuthRequired)));
    }
}
