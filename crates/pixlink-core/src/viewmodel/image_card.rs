//! Per-image likes, comments and tags.

use std::path::{Path, PathBuf};

use crate::backend::{Backend, ChangeEvent, ChangeFilter, Subscription, Table};
use crate::error::{Error, Result, ValidationError};
use crate::models::{download_file_name, CommentId, CommentView, Image, NewComment};

/// State behind one gallery card.
///
/// Holds a comments feed and a likes feed scoped to the image; both are
/// dropped with the card or when it is re-targeted.
pub struct ImageCard {
    backend: Backend,
    image: Image,
    liked: bool,
    like_count: i64,
    tags: Vec<String>,
    comments: Vec<CommentView>,
    comments_open: bool,
    draft: String,
    comments_feed: Option<Subscription>,
    likes_feed: Option<Subscription>,
}

async fn next_event(feed: &mut Option<Subscription>) -> Option<ChangeEvent> {
    match feed {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

impl ImageCard {
    /// Subscribe to the image's feeds and load likes and tags.
    pub async fn open(backend: Backend, image: Image) -> Result<Self> {
        let mut card = Self {
            backend,
            like_count: image.likes_count,
            image,
            liked: false,
            tags: Vec::new(),
            comments: Vec::new(),
            comments_open: false,
            draft: String::new(),
            comments_feed: None,
            likes_feed: None,
        };
        card.attach().await?;
        Ok(card)
    }

    /// Point the card at another image, replacing both subscriptions.
    pub async fn retarget(&mut self, image: Image) -> Result<()> {
        self.comments_feed = None;
        self.likes_feed = None;
        self.like_count = image.likes_count;
        self.image = image;
        self.liked = false;
        self.tags.clear();
        self.comments.clear();
        self.draft.clear();
        self.attach().await
    }

    async fn attach(&mut self) -> Result<()> {
        let id = self.image.id;
        self.comments_feed = Some(
            self.backend
                .feed
                .subscribe(ChangeFilter::table(Table::Comments).eq("image_id", id))
                .await?,
        );
        self.likes_feed = Some(
            self.backend
                .feed
                .subscribe(ChangeFilter::table(Table::Likes).eq("image_id", id))
                .await?,
        );
        self.tags = self.backend.store.image_tags(id).await?;
        self.refresh_likes().await?;
        if self.comments_open {
            self.refresh_comments().await?;
        }
        Ok(())
    }

    pub const fn image(&self) -> &Image {
        &self.image
    }

    pub const fn liked(&self) -> bool {
        self.liked
    }

    pub const fn like_count(&self) -> i64 {
        self.like_count
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Comments, newest first
    pub fn comments(&self) -> &[CommentView] {
        &self.comments
    }

    pub const fn comments_open(&self) -> bool {
        self.comments_open
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.draft = draft.into();
    }

    pub fn is_owner(&self) -> bool {
        self.backend.session.user_id() == Some(self.image.user_id)
    }

    /// Open or close the comments panel, loading comments when opened.
    pub async fn toggle_comments(&mut self) -> Result<()> {
        self.comments_open = !self.comments_open;
        if self.comments_open {
            self.refresh_comments().await?;
        }
        Ok(())
    }

    /// Re-derive like count and whether the current user likes the image.
    pub async fn refresh_likes(&mut self) -> Result<()> {
        let id = self.image.id;
        self.like_count = self.backend.store.like_count(id).await?;
        self.liked = match self.backend.session.user_id() {
            Some(user) => self.backend.store.find_like(id, user).await?.is_some(),
            None => false,
        };
        Ok(())
    }

    pub async fn refresh_comments(&mut self) -> Result<()> {
        self.comments = self.backend.store.list_comments(self.image.id).await?;
        Ok(())
    }

    /// Add or remove the current user's like.
    ///
    /// State is not updated here; the likes feed delivers the change.
    pub async fn toggle_like(&mut self) -> Result<()> {
        let user = self.backend.session.require_user()?;
        let store = &self.backend.store;
        match store.find_like(self.image.id, user.id).await? {
            Some(like) => store.delete_like(like.id).await,
            None => store.insert_like(self.image.id, user.id).await.map(drop),
        }
    }

    /// Post the draft as a comment, then clear it and reload comments.
    pub async fn post_comment(&mut self) -> Result<()> {
        let user = self.backend.session.require_user()?;
        let content = self.draft.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyContent.into());
        }
        self.backend
            .store
            .insert_comment(&NewComment {
                image_id: self.image.id,
                user_id: user.id,
                content: content.to_string(),
            })
            .await?;
        self.draft.clear();
        self.refresh_comments().await
    }

    /// Delete one of the current user's own comments.
    pub async fn delete_comment(&mut self, id: CommentId) -> Result<()> {
        let user = self.backend.session.require_user()?;
        let comment = self
            .comments
            .iter()
            .find(|view| view.comment.id == id)
            .ok_or_else(|| Error::NotFound(format!("comment {id}")))?;
        if comment.comment.user_id != user.id {
            return Err(Error::Forbidden(
                "only the author can delete a comment".to_string(),
            ));
        }
        self.backend.store.delete_comment(id).await?;
        self.refresh_comments().await
    }

    /// Delete the image and, best effort, its stored file.
    ///
    /// Storage is only touched when the record names its own object path.
    ///
    /// Likes, comments and tag links go with the record. The caller refreshes
    /// the gallery.
    pub async fn delete_image(&self) -> Result<()> {
        let user = self.backend.session.require_user()?;
        if user.id != self.image.user_id {
            return Err(Error::Forbidden(
                "only the owner can delete an image".to_string(),
            ));
        }

        if let Some(path) = self.image.storage_path.clone() {
            if let Err(error) = self
                .backend
                .storage
                .remove(&self.backend.bucket, &[path.clone()])
                .await
            {
                tracing::warn!("Failed to remove stored image {path}: {error}");
            }
        }

        self.backend.store.delete_image(self.image.id).await?;
        tracing::info!("Deleted image {}", self.image.id);
        Ok(())
    }

    /// Save the image bytes into `dir` under a name derived from the title.
    pub async fn download(&self, dir: &Path) -> Result<PathBuf> {
        let bytes = self.backend.storage.fetch(&self.image.image_url).await?;
        let target = dir.join(download_file_name(&self.image.title));
        tokio::fs::write(&target, bytes).await?;
        Ok(target)
    }

    /// Wait for a change on either feed and reload what it affects.
    ///
    /// Comment changes only reload while the panel is open. Returns the
    /// table that changed, or `None` once both feeds have closed.
    pub async fn next_change(&mut self) -> Result<Option<Table>> {
        let event = tokio::select! {
            Some(event) = next_event(&mut self.comments_feed) => event,
            Some(event) = next_event(&mut self.likes_feed) => event,
            else => return Ok(None),
        };

        match event.table {
            Table::Comments if self.comments_open => self.refresh_comments().await?,
            Table::Likes => self.refresh_likes().await?,
            _ => {}
        }
        Ok(Some(event.table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FileUpload;
    use crate::models::{NewImage, TagInput};
    use crate::viewmodel::test_support::{local_backend, signed_in, signed_out, PNG_BYTES};
    use crate::viewmodel::UploadViewModel;
    use pretty_assertions::assert_eq;

    async fn upload(backend: &Backend, name: &str, tags: &[&str]) -> Image {
        let mut upload = UploadViewModel::new(backend.clone());
        upload.select_file(FileUpload::new(name, PNG_BYTES.to_vec()));
        let mut input = TagInput::new();
        for tag in tags {
            input.add(tag);
        }
        upload.set_tags(input);
        upload.submit().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn like_toggle_round_trips() {
        let (backend, _dir) = local_backend().await;
        let ada = signed_in(&backend, "ada").await;
        let image = upload(&ada, "sunset.png", &["sky"]).await;

        let mut card = ImageCard::open(ada, image).await.unwrap();
        assert_eq!((card.liked(), card.like_count()), (false, 0));
        assert_eq!(card.tags(), ["sky"]);

        card.toggle_like().await.unwrap();
        assert_eq!(card.next_change().await.unwrap(), Some(Table::Likes));
        assert_eq!((card.liked(), card.like_count()), (true, 1));

        card.toggle_like().await.unwrap();
        assert_eq!(card.next_change().await.unwrap(), Some(Table::Likes));
        assert_eq!((card.liked(), card.like_count()), (false, 0));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn signed_out_comment_is_rejected_locally() {
        let (backend, _dir) = local_backend().await;
        let ada = signed_in(&backend, "ada").await;
        let image = upload(&ada, "sunset.png", &["sky"]).await;

        let mut card = ImageCard::open(signed_out(&backend), image).await.unwrap();
        card.set_draft("nice");
        let error = card.post_comment().await.unwrap_err();
        assert!(matches!(error, Error::AuthRequired));
        assert!(error.is_validation());
        assert_eq!(card.draft(), "nice");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn comments_post_and_delete_by_author_only() {
        let (backend, _dir) = local_backend().await;
        let ada = signed_in(&backend, "ada").await;
        let bob = signed_in(&backend, "bob").await;
        let image = upload(&ada, "sunset.png", &["sky"]).await;

        let mut ada_card = ImageCard::open(ada, image.clone()).await.unwrap();
        ada_card.toggle_comments().await.unwrap();
        ada_card.set_draft("   ");
        assert!(matches!(
            ada_card.post_comment().await,
            Err(Error::Validation(ValidationError::EmptyContent))
        ));

        ada_card.set_draft("  first  ");
        ada_card.post_comment().await.unwrap();
        ada_card.set_draft("second");
        ada_card.post_comment().await.unwrap();
        assert_eq!(ada_card.draft(), "");
        let contents: Vec<&str> = ada_card
            .comments()
            .iter()
            .map(|view| view.comment.content.as_str())
            .collect();
        assert_eq!(contents, vec!["second", "first"]);
        assert_eq!(ada_card.comments()[0].author_name(), "ada");

        let mut bob_card = ImageCard::open(bob, image).await.unwrap();
        bob_card.toggle_comments().await.unwrap();
        let target = bob_card.comments()[0].comment.id;
        assert!(matches!(
            bob_card.delete_comment(target).await,
            Err(Error::Forbidden(_))
        ));

        ada_card.delete_comment(target).await.unwrap();
        assert_eq!(ada_card.comments().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn closed_panel_ignores_comment_changes() {
        let (backend, _dir) = local_backend().await;
        let ada = signed_in(&backend, "ada").await;
        let bob = signed_in(&backend, "bob").await;
        let image = upload(&ada, "sunset.png", &["sky"]).await;

        let mut watcher = ImageCard::open(ada, image.clone()).await.unwrap();
        let mut commenter = ImageCard::open(bob, image).await.unwrap();
        commenter.set_draft("hello");
        commenter.post_comment().await.unwrap();

        assert_eq!(watcher.next_change().await.unwrap(), Some(Table::Comments));
        assert!(watcher.comments().is_empty());

        watcher.toggle_comments().await.unwrap();
        assert_eq!(watcher.comments().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deleting_an_image_cascades() {
        let (backend, dir) = local_backend().await;
        let ada = signed_in(&backend, "ada").await;
        let bob = signed_in(&backend, "bob").await;
        let image = upload(&ada, "sunset.png", &["sky", "warm"]).await;
        let stored = dir
            .path()
            .join("objects")
            .join("images")
            .join(image.storage_path.clone().unwrap());
        assert!(stored.exists());

        let mut bob_card = ImageCard::open(bob.clone(), image.clone()).await.unwrap();
        assert!(!bob_card.is_owner());
        bob_card.toggle_like().await.unwrap();
        bob_card.set_draft("love it");
        bob_card.post_comment().await.unwrap();
        assert!(matches!(
            bob_card.delete_image().await,
            Err(Error::Forbidden(_))
        ));

        let card = ImageCard::open(ada, image.clone()).await.unwrap();
        card.delete_image().await.unwrap();

        let store = &backend.store;
        assert_eq!(store.get_image(image.id).await.unwrap(), None);
        assert!(store.list_comments(image.id).await.unwrap().is_empty());
        assert!(store.image_tags(image.id).await.unwrap().is_empty());
        let bob_id = bob.session.user_id().unwrap();
        assert_eq!(store.find_like(image.id, bob_id).await.unwrap(), None);
        assert!(!stored.exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn record_without_storage_path_leaves_shared_file() {
        let (backend, dir) = local_backend().await;
        let ada = signed_in(&backend, "ada").await;
        let original = upload(&ada, "sunset.png", &["sky"]).await;
        let stored = dir
            .path()
            .join("objects")
            .join("images")
            .join(original.storage_path.clone().unwrap());

        let repost = backend
            .store
            .insert_image(&NewImage {
                user_id: original.user_id,
                title: "repost".to_string(),
                description: None,
                image_url: original.image_url.clone(),
                storage_path: None,
            })
            .await
            .unwrap();

        let card = ImageCard::open(ada, repost.clone()).await.unwrap();
        assert!(card.is_owner());
        card.delete_image().await.unwrap();

        assert_eq!(backend.store.get_image(repost.id).await.unwrap(), None);
        assert!(backend.store.get_image(original.id).await.unwrap().is_some());
        assert!(stored.exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn download_uses_title() {
        let (backend, _dir) = local_backend().await;
        let ada = signed_in(&backend, "ada").await;
        let image = upload(&ada, "Sunset.png", &["sky"]).await;
        let target = tempfile::TempDir::new().unwrap();

        let card = ImageCard::open(ada, image).await.unwrap();
        let path = card.download(target.path()).await.unwrap();
        assert_eq!(path, target.path().join("Sunset.jpg"));
        assert_eq!(std::fs::read(path).unwrap(), PNG_BYTES);
    }
}
