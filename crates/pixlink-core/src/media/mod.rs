//! Picked files and image payloads.
//!
//! Content types are sniffed from the bytes first and fall back to the file
//! extension, so a renamed PNG is still accepted as an image.

use std::path::Path;

use base64::Engine;

use crate::backend::ObjectStorage;
use crate::error::{Error, Result, ValidationError};
use crate::util::{file_extension, file_stem, is_http_url};

/// Largest accepted avatar, in bytes
pub const AVATAR_MAX_BYTES: usize = 2 * 1024 * 1024;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// A file chosen by the user, held in memory until uploaded
#[derive(Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = sniff_content_type(&file_name, &bytes);
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(file_name, bytes))
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    /// Title given to an uploaded image: the file name without its extension.
    pub fn title(&self) -> &str {
        file_stem(&self.file_name)
    }

    /// Extension used for the stored object.
    pub fn extension(&self) -> String {
        file_extension(&self.file_name).map_or_else(
            || {
                mime_guess::get_mime_extensions_str(&self.content_type)
                    .and_then(|extensions| extensions.first())
                    .map_or_else(|| "bin".to_string(), |ext| (*ext).to_string())
            },
            str::to_ascii_lowercase,
        )
    }

    /// Avatar rules: an image no larger than 2 MiB.
    pub fn validate_avatar(&self) -> std::result::Result<(), ValidationError> {
        if !self.is_image() {
            return Err(ValidationError::NotAnImage);
        }
        if self.bytes.len() > AVATAR_MAX_BYTES {
            return Err(ValidationError::FileTooLarge);
        }
        Ok(())
    }
}

/// Content type from magic bytes, else from the extension.
pub fn sniff_content_type(file_name: &str, bytes: &[u8]) -> String {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type().to_string();
    }
    mime_guess::from_path(file_name)
        .first_raw()
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string()
}

/// Decode a generated image reference into bytes.
///
/// Accepts `data:<type>;base64,<payload>` URLs and fetches http(s) URLs
/// through `storage`.
pub async fn load_image_payload(storage: &dyn ObjectStorage, reference: &str) -> Result<Vec<u8>> {
    if let Some(rest) = reference.strip_prefix("data:") {
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| Error::Generation("malformed data URL".to_string()))?;
        if !header.ends_with(";base64") {
            return Err(Error::Generation(
                "data URL is not base64 encoded".to_string(),
            ));
        }
        return base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|error| Error::Generation(format!("invalid image data: {error}")));
    }
    if is_http_url(reference) {
        return storage.fetch(reference).await;
    }
    Err(Error::Generation(format!(
        "unsupported image reference '{}'",
        reference.chars().take(32).collect::<String>()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    struct NoStorage;

    #[async_trait]
    impl ObjectStorage for NoStorage {
        async fn upload(&self, _: &str, _: &str, _: Vec<u8>, _: &str) -> Result<()> {
            unreachable!()
        }
        async fn remove(&self, _: &str, _: &[String]) -> Result<()> {
            unreachable!()
        }
        fn public_url(&self, bucket: &str, path: &str) -> String {
            format!("mem://{bucket}/{path}")
        }
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            Ok(url.as_bytes().to_vec())
        }
    }

    #[test]
    fn sniffs_magic_bytes_before_extension() {
        let upload = FileUpload::new("photo.txt", PNG_MAGIC.to_vec());
        assert_eq!(upload.content_type, "image/png");
        assert!(upload.is_image());
    }

    #[test]
    fn falls_back_to_extension() {
        let upload = FileUpload::new("Sunset.JPG", b"not really".to_vec());
        assert_eq!(upload.content_type, "image/jpeg");
        assert_eq!(upload.title(), "Sunset");
        assert_eq!(upload.extension(), "jpg");

        let unknown = FileUpload::new("notes", b"plain".to_vec());
        assert_eq!(unknown.content_type, FALLBACK_CONTENT_TYPE);
        assert!(!unknown.is_image());
    }

    #[test]
    fn avatar_limits() {
        let small = FileUpload::new("a.png", PNG_MAGIC.to_vec());
        assert_eq!(small.validate_avatar(), Ok(()));

        let mut big = PNG_MAGIC.to_vec();
        big.resize(AVATAR_MAX_BYTES + 1, 0);
        assert_eq!(
            FileUpload::new("a.png", big).validate_avatar(),
            Err(ValidationError::FileTooLarge)
        );
        assert_eq!(
            FileUpload::new("a.pdf", b"%PDF".to_vec()).validate_avatar(),
            Err(ValidationError::NotAnImage)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn decodes_data_urls_and_fetches_http() {
        let decoded = load_image_payload(&NoStorage, "data:image/png;base64,aGVsbG8=")
            .await
            .unwrap();
        assert_eq!(decoded, b"hello");

        let fetched = load_image_payload(&NoStorage, "https://cdn.example.com/x.png")
            .await
            .unwrap();
        assert_eq!(fetched, b"https://cdn.example.com/x.png");

        assert!(load_image_payload(&NoStorage, "data:image/png,raw")
            .await
            .is_err());
    }
}
