//! Image upload form.

use crate::backend::Backend;
use crate::error::{Error, Result, ValidationError};
use crate::media::FileUpload;
use crate::models::{normalize_tag_name, Image, NewImage, TagInput};
use crate::util::unix_millis_now;

pub struct UploadViewModel {
    backend: Backend,
    file: Option<FileUpload>,
    tags: TagInput,
}

impl UploadViewModel {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            file: None,
            tags: TagInput::new(),
        }
    }

    pub fn select_file(&mut self, file: FileUpload) {
        self.file = Some(file);
    }

    pub const fn file(&self) -> Option<&FileUpload> {
        self.file.as_ref()
    }

    pub fn add_tag(&mut self, tag: &str) -> bool {
        self.tags.add(tag)
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.remove(tag);
    }

    pub fn set_tags(&mut self, tags: TagInput) {
        self.tags = tags;
    }

    pub fn tags(&self) -> &[String] {
        self.tags.as_slice()
    }

    /// Store the file, create the image row, then link each tag in order.
    ///
    /// Tag links are not transactional: a failure part way keeps the links
    /// already made and reports one generic error. The form is reset on
    /// success.
    pub async fn submit(&mut self) -> Result<Image> {
        let user = self.backend.session.require_user()?;
        let file = self.file.as_ref().ok_or(ValidationError::NoImageSelected)?;
        if !file.is_image() {
            return Err(ValidationError::NotAnImage.into());
        }
        if self.tags.is_empty() {
            return Err(ValidationError::NoTags.into());
        }

        let path = format!("{}-{}.{}", user.id, unix_millis_now(), file.extension());
        let bucket = &self.backend.bucket;
        self.backend
            .storage
            .upload(bucket, &path, file.bytes.clone(), &file.content_type)
            .await?;

        let image = self
            .backend
            .store
            .insert_image(&NewImage {
                user_id: user.id,
                title: file.title().to_string(),
                description: None,
                image_url: self.backend.storage.public_url(bucket, &path),
                storage_path: Some(path),
            })
            .await?;

        if let Err(error) = self.link_tags(&image).await {
            tracing::error!("Tagging image {} failed: {error}", image.id);
            return Err(Error::Backend("Upload failed while saving tags".to_string()));
        }

        tracing::info!("Uploaded image {} with {} tags", image.id, self.tags.as_slice().len());
        self.file = None;
        self.tags.clear();
        Ok(image)
    }

    async fn link_tags(&self, image: &Image) -> Result<()> {
        let store = &self.backend.store;
        for raw in self.tags.as_slice() {
            let name = normalize_tag_name(raw);
            let tag = match store.find_tag(&name).await? {
                Some(tag) => tag,
                None => match store.insert_tag(&name).await {
                    Ok(tag) => tag,
                    // Created by someone else since the lookup.
                    Err(Error::UniqueViolation(_)) => store
                        .find_tag(&name)
                        .await?
                        .ok_or_else(|| Error::NotFound(format!("tag {name}")))?,
                    Err(error) => return Err(error),
                },
            };
            store.link_tag(image.id, tag.id).await?;
        }
        Ok(())
    }
}
