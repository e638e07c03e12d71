//! Image model and gallery search

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ImageId, UserId};

/// Longest title given to a published AI image, in characters
pub const GENERATED_TITLE_MAX_CHARS: usize = 100;

/// A shared image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    /// Owner
    pub user_id: UserId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Public URL of the stored object
    pub image_url: String,
    /// Object path inside the images bucket, when the file is ours to delete
    #[serde(default)]
    pub storage_path: Option<String>,
    /// Server-maintained count of like rows
    #[serde(default)]
    pub likes_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Owner fields joined onto a gallery row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAuthor {
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Gallery row: image plus owner profile and tag names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryImage {
    #[serde(flatten)]
    pub image: Image,
    pub author: Option<ImageAuthor>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl GalleryImage {
    /// Author label, `Unknown` when the profile is missing
    pub fn author_name(&self) -> &str {
        self.author
            .as_ref()
            .map_or("Unknown", |author| author.username.as_str())
    }

    /// Whether this row passes an already-normalized gallery needle.
    pub fn matches(&self, needle: &str) -> bool {
        self.image.title.to_lowercase().contains(needle)
            || self
                .image
                .description
                .as_ref()
                .is_some_and(|description| description.to_lowercase().contains(needle))
            || self.tags.iter().any(|tag| tag.to_lowercase().contains(needle))
    }
}

/// Fields for a new image row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewImage {
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub image_url: String,
    pub storage_path: Option<String>,
}

/// Normalize a gallery search box value.
///
/// Returns `None` for a blank query (everything matches); otherwise the
/// lower-cased query with one leading `#` removed.
pub fn normalize_gallery_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    Some(lowered.strip_prefix('#').unwrap_or(&lowered).to_string())
}

/// Apply the gallery search box to a fetched list, keeping order.
pub fn filter_gallery<'a>(images: &'a [GalleryImage], query: &str) -> Vec<&'a GalleryImage> {
    match normalize_gallery_query(query) {
        None => images.iter().collect(),
        Some(needle) => images.iter().filter(|image| image.matches(&needle)).collect(),
    }
}

/// File name used when saving an image locally.
pub fn download_file_name(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "image.jpg".to_string()
    } else {
        format!("{cleaned}.jpg")
    }
}

/// Title for a published AI image: the prompt cut to 100 characters.
pub fn generated_title(prompt: &str) -> String {
    prompt.chars().take(GENERATED_TITLE_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn gallery_image(title: &str, description: Option<&str>, tags: &[&str]) -> GalleryImage {
        GalleryImage {
            image: Image {
                id: ImageId::new(),
                user_id: UserId::new(),
                title: title.to_string(),
                description: description.map(str::to_string),
                image_url: "https://cdn.example.com/a.png".to_string(),
                storage_path: None,
                likes_count: 0,
                created_at: Utc::now(),
            },
            author: None,
            tags: tags.iter().map(|tag| (*tag).to_string()).collect(),
        }
    }

    fn titles(images: &[&GalleryImage]) -> Vec<String> {
        images.iter().map(|image| image.image.title.clone()).collect()
    }

    #[test]
    fn hash_prefix_and_case_are_ignored() {
        let images = vec![
            gallery_image("Street Art", None, &[]),
            gallery_image("Sunset", Some("digital ART study"), &[]),
            gallery_image("Forest", None, &["nature"]),
        ];

        let with_hash = filter_gallery(&images, "#Art");
        let plain = filter_gallery(&images, "art");
        assert_eq!(titles(&with_hash), titles(&plain));
        assert_eq!(titles(&plain), vec!["Street Art", "Sunset"]);
    }

    #[test]
    fn tag_names_are_searchable() {
        let images = vec![
            gallery_image("Forest", None, &["nature"]),
            gallery_image("City", None, &["urban"]),
        ];
        assert_eq!(titles(&filter_gallery(&images, "#nature")), vec!["Forest"]);
    }

    #[test]
    fn blank_query_keeps_everything() {
        let images = vec![gallery_image("A", None, &[]), gallery_image("B", None, &[])];
        assert_eq!(filter_gallery(&images, "   ").len(), 2);
        assert_eq!(normalize_gallery_query(""), None);
    }

    #[test]
    fn only_one_leading_hash_is_stripped() {
        assert_eq!(normalize_gallery_query("##Tag").as_deref(), Some("#tag"));
        assert_eq!(normalize_gallery_query(" a#b ").as_deref(), Some("a#b"));
    }

    #[test]
    fn download_names_follow_title() {
        assert_eq!(download_file_name("Sunset"), "Sunset.jpg");
        assert_eq!(download_file_name("a/b"), "a_b.jpg");
        assert_eq!(download_file_name("  "), "image.jpg");
    }

    #[test]
    fn generated_title_is_capped() {
        let prompt = "x".repeat(150);
        assert_eq!(generated_title(&prompt).chars().count(), 100);
        assert_eq!(generated_title("short"), "short");
    }
}
