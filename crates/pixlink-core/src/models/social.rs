//! Likes and comments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CommentId, ImageId, LikeId, UserId};

/// One user's like on one image; at most one per pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    pub id: LikeId,
    pub image_id: ImageId,
    pub user_id: UserId,
}

/// A comment on an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub image_id: ImageId,
    /// Author
    pub user_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Comment with its author's username resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Option<String>,
}

impl CommentView {
    pub fn author_name(&self) -> &str {
        self.author.as_deref().unwrap_or("Unknown")
    }
}

/// Fields for a new comment row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewComment {
    pub image_id: ImageId,
    pub user_id: UserId,
    pub content: String,
}
