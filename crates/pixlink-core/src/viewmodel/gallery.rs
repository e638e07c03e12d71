//! Gallery list with search.

use crate::backend::{Backend, ChangeFilter, Subscription, Table};
use crate::error::Result;
use crate::models::{filter_gallery, GalleryImage};

/// Ranked image list, re-fetched whenever any image row changes.
pub struct GalleryViewModel {
    backend: Backend,
    images: Vec<GalleryImage>,
    query: String,
    last_error: Option<String>,
    changes: Option<Subscription>,
}

impl GalleryViewModel {
    pub const fn new(backend: Backend) -> Self {
        Self {
            backend,
            images: Vec::new(),
            query: String::new(),
            last_error: None,
            changes: None,
        }
    }

    /// Subscribe to image changes and load the list.
    pub async fn mount(&mut self) -> Result<()> {
        self.changes = Some(
            self.backend
                .feed
                .subscribe(ChangeFilter::table(Table::Images))
                .await?,
        );
        self.refresh().await;
        Ok(())
    }

    /// Re-fetch the ranked list. Failures are logged and leave the previous
    /// list in place.
    pub async fn refresh(&mut self) {
        match self.backend.store.list_gallery().await {
            Ok(images) => {
                tracing::debug!("Gallery loaded {} images", images.len());
                self.images = images;
                self.last_error = None;
            }
            Err(error) => {
                tracing::error!("Failed to load gallery: {error}");
                self.last_error = Some(error.to_string());
            }
        }
    }

    /// Wait for the next image change and re-fetch.
    ///
    /// Returns `false` once the feed has closed or was never opened.
    pub async fn next_change(&mut self) -> bool {
        let Some(changes) = self.changes.as_mut() else {
            return false;
        };
        if changes.recv().await.is_none() {
            self.changes = None;
            return false;
        }
        self.refresh().await;
        true
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Every fetched image, best ranked first
    pub fn images(&self) -> &[GalleryImage] {
        &self.images
    }

    /// Images passing the current search box
    pub fn visible(&self) -> Vec<&GalleryImage> {
        filter_gallery(&self.images, &self.query)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
