//! Tag model

use serde::{Deserialize, Serialize};

use super::TagId;

/// A tag shared by any number of images
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    /// Tag name (stored in lowercase)
    pub name: String,
}

/// Canonical stored form of a tag name.
pub fn normalize_tag_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Tag entry list for the upload form.
///
/// Entries are trimmed; blank and already-present entries are ignored.
/// Case is kept as typed; names are lower-cased when stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagInput {
    tags: Vec<String>,
}

impl TagInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one entry. Returns whether it was accepted.
    pub fn add(&mut self, raw: &str) -> bool {
        let tag = raw.trim();
        if tag.is_empty() || self.tags.iter().any(|existing| existing == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    pub fn remove(&mut self, tag: &str) {
        self.tags.retain(|existing| existing != tag);
    }

    pub fn as_slice(&self) -> &[String] {
        &self.tags
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn clear(&mut self) {
        self.tags.clear();
    }
}
