//! Relational record access.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    Chat, ChatId, Comment, CommentId, CommentView, GalleryImage, Image, ImageId, Like, LikeId,
    Message, MessagePreview, NewComment, NewImage, NewMessage, NewProfile, ParticipantPair,
    Profile, ProfileUpdate, Tag, TagId, UserId,
};

/// Typed reads and writes over the backend's tables.
///
/// Row-level policy belongs to the backend; callers check ownership only to
/// fail early.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>>;

    /// Profiles for every id that has one, in no particular order.
    async fn get_profiles(&self, ids: &[UserId]) -> Result<Vec<Profile>>;

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile>;

    async fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> Result<Profile>;

    async fn set_avatar_url(&self, id: UserId, avatar_url: &str) -> Result<()>;

    /// All images with author and tag names, most liked first, then newest.
    async fn list_gallery(&self) -> Result<Vec<GalleryImage>>;

    async fn get_image(&self, id: ImageId) -> Result<Option<Image>>;

    async fn insert_image(&self, image: &NewImage) -> Result<Image>;

    async fn like_count(&self, id: ImageId) -> Result<i64>;

    /// Delete an image together with its likes, comments and tag links.
    async fn delete_image(&self, id: ImageId) -> Result<()>;

    /// Case-insensitive lookup by name.
    async fn find_tag(&self, name: &str) -> Result<Option<Tag>>;

    async fn insert_tag(&self, name: &str) -> Result<Tag>;

    async fn link_tag(&self, image: ImageId, tag: TagId) -> Result<()>;

    async fn image_tags(&self, image: ImageId) -> Result<Vec<String>>;

    async fn find_like(&self, image: ImageId, user: UserId) -> Result<Option<Like>>;

    async fn insert_like(&self, image: ImageId, user: UserId) -> Result<Like>;

    async fn delete_like(&self, id: LikeId) -> Result<()>;

    /// Comments on an image, newest first, with author usernames.
    async fn list_comments(&self, image: ImageId) -> Result<Vec<CommentView>>;

    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment>;

    async fn delete_comment(&self, id: CommentId) -> Result<()>;

    /// Chats `user` takes part in, in membership order.
    async fn chat_ids_for_user(&self, user: UserId) -> Result<Vec<ChatId>>;

    async fn is_participant(&self, chat: ChatId, user: UserId) -> Result<bool>;

    /// Create a chat for `pair`. Fails with a uniqueness violation when the
    /// pair already has one.
    async fn insert_chat(&self, pair: &ParticipantPair) -> Result<Chat>;

    async fn insert_participants(&self, chat: ChatId, users: &[UserId]) -> Result<()>;

    /// Members of `chat` other than `user`.
    async fn other_participants(&self, chat: ChatId, user: UserId) -> Result<Vec<UserId>>;

    async fn latest_message(&self, chat: ChatId) -> Result<Option<MessagePreview>>;

    /// Messages of a chat, oldest first.
    async fn list_messages(&self, chat: ChatId) -> Result<Vec<Message>>;

    async fn insert_message(&self, message: &NewMessage) -> Result<Message>;
}
