//! Data models for Pixlink

mod chat;
mod ids;
mod image;
mod language;
mod profile;
mod social;
mod tag;

pub use chat::{
    Chat, ChatPartner, ConversationPreview, Message, MessagePreview, NewMessage, ParticipantPair,
    ThreadMessage,
};
pub use ids::{ChatId, CommentId, ImageId, LikeId, MessageId, TagId, UserId};
pub use image::{
    download_file_name, filter_gallery, generated_title, normalize_gallery_query, GalleryImage,
    Image, ImageAuthor, NewImage, GENERATED_TITLE_MAX_CHARS,
};
pub use language::Language;
pub use profile::{
    default_username, validate_username, NewProfile, Profile, ProfileUpdate, USERNAME_MAX_LEN,
    USERNAME_MIN_LEN,
};
pub use social::{Comment, CommentView, Like, NewComment};
pub use tag::{normalize_tag_name, Tag, TagInput};
