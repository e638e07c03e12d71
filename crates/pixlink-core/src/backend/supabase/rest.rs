//! PostgREST record store.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{check, ApiContext};
use crate::backend::RecordStore;
use crate::error::{Error, Result};
use crate::models::{
    Chat, ChatId, Comment, CommentId, CommentView, GalleryImage, Image, ImageAuthor, ImageId,
    Like, LikeId, Message, MessagePreview, NewComment, NewImage, NewMessage, NewProfile,
    ParticipantPair, Profile, ProfileUpdate, Tag, TagId, UserId,
};

const GALLERY_SELECT: &str = "*,author:user_id(username,full_name),image_tags(tags(name))";
const COMMENT_SELECT: &str = "*,author:user_id(username)";

type Query = Vec<(&'static str, String)>;

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

#[derive(Clone)]
pub struct PostgrestStore {
    api: ApiContext,
}

impl PostgrestStore {
    pub const fn new(api: ApiContext) -> Self {
        Self { api }
    }

    fn table_url(&self, table: &str) -> String {
        self.api.endpoint(&format!("rest/v1/{table}"))
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&'static str, String)],
    ) -> Result<Vec<T>> {
        let request = self.api.client().get(self.table_url(table)).query(query);
        let response = check(self.api.authorize(request).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        mut query: Query,
    ) -> Result<Option<T>> {
        query.push(("limit", "1".to_string()));
        Ok(self.select(table, &query).await?.into_iter().next())
    }

    async fn insert<T: DeserializeOwned>(&self, table: &str, body: &impl Serialize) -> Result<T> {
        let request = self
            .api
            .client()
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(body);
        let response = check(self.api.authorize(request).send().await?).await?;
        let mut rows: Vec<T> = response.json().await?;
        if rows.is_empty() {
            return Err(Error::Backend(format!("insert into {table} returned no row")));
        }
        Ok(rows.swap_remove(0))
    }

    async fn insert_minimal(&self, table: &str, body: &impl Serialize) -> Result<()> {
        let request = self
            .api
            .client()
            .post(self.table_url(table))
            .header("Prefer", "return=minimal")
            .json(body);
        check(self.api.authorize(request).send().await?).await?;
        Ok(())
    }

    async fn update<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&'static str, String)],
        body: &impl Serialize,
    ) -> Result<Vec<T>> {
        let request = self
            .api
            .client()
            .patch(self.table_url(table))
            .query(query)
            .header("Prefer", "return=representation")
            .json(body);
        let response = check(self.api.authorize(request).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, table: &str, query: &[(&'static str, String)]) -> Result<()> {
        let request = self.api.client().delete(self.table_url(table)).query(query);
        check(self.api.authorize(request).send().await?).await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct TagName {
    name: String,
}

#[derive(Deserialize)]
struct TagLink {
    tags: Option<TagName>,
}

#[derive(Deserialize)]
struct GalleryRow {
    #[serde(flatten)]
    image: Image,
    author: Option<ImageAuthor>,
    #[serde(default)]
    image_tags: Vec<TagLink>,
}

impl From<GalleryRow> for GalleryImage {
    fn from(row: GalleryRow) -> Self {
        Self {
            image: row.image,
            author: row.author,
            tags: row
                .image_tags
                .into_iter()
                .filter_map(|link| link.tags.map(|tag| tag.name))
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct CommentAuthor {
    username: String,
}

#[derive(Deserialize)]
struct CommentRow {
    #[serde(flatten)]
    comment: Comment,
    author: Option<CommentAuthor>,
}

#[derive(Deserialize)]
struct LikesCount {
    likes_count: i64,
}

#[derive(Deserialize)]
struct ChatRef {
    chat_id: ChatId,
}

#[derive(Deserialize)]
struct UserRef {
    user_id: UserId,
}

#[derive(Serialize)]
struct ParticipantInsert {
    chat_id: ChatId,
    user_id: UserId,
}

#[async_trait]
impl RecordStore for PostgrestStore {
    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>> {
        self.select_one("profiles", vec![("select", "*".into()), ("id", eq(id))])
            .await
    }

    async fn get_profiles(&self, ids: &[UserId]) -> Result<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let list = ids
            .iter()
            .map(UserId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        self.select(
            "profiles",
            &[("select", "*".into()), ("id", format!("in.({list})"))],
        )
        .await
    }

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile> {
        self.insert("profiles", profile).await
    }

    async fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> Result<Profile> {
        self.update("profiles", &[("id", eq(id))], update)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("profile {id}")))
    }

    async fn set_avatar_url(&self, id: UserId, avatar_url: &str) -> Result<()> {
        let _: Vec<Profile> = self
            .update(
                "profiles",
                &[("id", eq(id))],
                &serde_json::json!({ "avatar_url": avatar_url }),
            )
            .await?;
        Ok(())
    }

    async fn list_gallery(&self) -> Result<Vec<GalleryImage>> {
        let rows: Vec<GalleryRow> = self
            .select(
                "images",
                &[
                    ("select", GALLERY_SELECT.into()),
                    ("order", "likes_count.desc,created_at.desc".into()),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(GalleryImage::from).collect())
    }

    async fn get_image(&self, id: ImageId) -> Result<Option<Image>> {
        self.select_one("images", vec![("select", "*".into()), ("id", eq(id))])
            .await
    }

    async fn insert_image(&self, image: &NewImage) -> Result<Image> {
        self.insert("images", image).await
    }

    async fn like_count(&self, id: ImageId) -> Result<i64> {
        self.select_one::<LikesCount>(
            "images",
            vec![("select", "likes_count".into()), ("id", eq(id))],
        )
        .await?
        .map(|row| row.likes_count)
        .ok_or_else(|| Error::NotFound(format!("image {id}")))
    }

    async fn delete_image(&self, id: ImageId) -> Result<()> {
        self.delete("images", &[("id", eq(id))]).await
    }

    async fn find_tag(&self, name: &str) -> Result<Option<Tag>> {
        // Tag names are stored lower-cased.
        self.select_one(
            "tags",
            vec![
                ("select", "id,name".into()),
                ("name", eq(name.trim().to_lowercase())),
            ],
        )
        .await
    }

    async fn insert_tag(&self, name: &str) -> Result<Tag> {
        self.insert("tags", &serde_json::json!({ "name": name.trim() }))
            .await
    }

    async fn link_tag(&self, image: ImageId, tag: TagId) -> Result<()> {
        self.insert_minimal(
            "image_tags",
            &serde_json::json!({ "image_id": image, "tag_id": tag }),
        )
        .await
    }

    async fn image_tags(&self, image: ImageId) -> Result<Vec<String>> {
        let links: Vec<TagLink> = self
            .select(
                "image_tags",
                &[("select", "tags(name)".into()), ("image_id", eq(image))],
            )
            .await?;
        Ok(links
            .into_iter()
            .filter_map(|link| link.tags.map(|tag| tag.name))
            .filter(|name| !name.is_empty())
            .collect())
    }

    async fn find_like(&self, image: ImageId, user: UserId) -> Result<Option<Like>> {
        self.select_one(
            "likes",
            vec![
                ("select", "id,image_id,user_id".into()),
                ("image_id", eq(image)),
                ("user_id", eq(user)),
            ],
        )
        .await
    }

    async fn insert_like(&self, image: ImageId, user: UserId) -> Result<Like> {
        self.insert(
            "likes",
            &serde_json::json!({ "image_id": image, "user_id": user }),
        )
        .await
    }

    async fn delete_like(&self, id: LikeId) -> Result<()> {
        self.delete("likes", &[("id", eq(id))]).await
    }

    async fn list_comments(&self, image: ImageId) -> Result<Vec<CommentView>> {
        let rows: Vec<CommentRow> = self
            .select(
                "comments",
                &[
                    ("select", COMMENT_SELECT.into()),
                    ("image_id", eq(image)),
                    ("order", "created_at.desc".into()),
                ],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| CommentView {
                comment: row.comment,
                author: row.author.map(|author| author.username),
            })
            .collect())
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment> {
        self.insert("comments", comment).await
    }

    async fn delete_comment(&self, id: CommentId) -> Result<()> {
        self.delete("comments", &[("id", eq(id))]).await
    }

    async fn chat_ids_for_user(&self, user: UserId) -> Result<Vec<ChatId>> {
        let rows: Vec<ChatRef> = self
            .select(
                "chat_participants",
                &[("select", "chat_id".into()), ("user_id", eq(user))],
            )
            .await?;
        Ok(rows.into_iter().map(|row| row.chat_id).collect())
    }

    async fn is_participant(&self, chat: ChatId, user: UserId) -> Result<bool> {
        let row: Option<UserRef> = self
            .select_one(
                "chat_participants",
                vec![
                    ("select", "user_id".into()),
                    ("chat_id", eq(chat)),
                    ("user_id", eq(user)),
                ],
            )
            .await?;
        Ok(row.is_some())
    }

    async fn insert_chat(&self, pair: &ParticipantPair) -> Result<Chat> {
        self.insert("chats", &serde_json::json!({ "pair_key": pair.key() }))
            .await
    }

    async fn insert_participants(&self, chat: ChatId, users: &[UserId]) -> Result<()> {
        let rows: Vec<ParticipantInsert> = users
            .iter()
            .map(|user| ParticipantInsert {
                chat_id: chat,
                user_id: *user,
            })
            .collect();
        self.insert_minimal("chat_participants", &rows).await
    }

    async fn other_participants(&self, chat: ChatId, user: UserId) -> Result<Vec<UserId>> {
        let rows: Vec<UserRef> = self
            .select(
                "chat_participants",
                &[
                    ("select", "user_id".into()),
                    ("chat_id", eq(chat)),
                    ("user_id", format!("neq.{user}")),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(|row| row.user_id).collect())
    }

    async fn latest_message(&self, chat: ChatId) -> Result<Option<MessagePreview>> {
        self.select_one(
            "messages",
            vec![
                ("select", "content,created_at".into()),
                ("chat_id", eq(chat)),
                ("order", "created_at.desc".into()),
            ],
        )
        .await
    }

    async fn list_messages(&self, chat: ChatId) -> Result<Vec<Message>> {
        self.select(
            "messages",
            &[
                ("select", "*".into()),
                ("chat_id", eq(chat)),
                ("order", "created_at.asc".into()),
            ],
        )
        .await
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message> {
        self.insert("messages", message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn gallery_row_flattens_author_and_tags() {
        let id = ImageId::new();
        let owner = UserId::new();
        let payload = format!(
            r#"{{
                "id": "{id}",
                "user_id": "{owner}",
                "title": "Forest",
                "description": null,
                "image_url": "https://cdn/forest.png",
                "storage_path": "forest.png",
                "likes_count": 3,
                "created_at": "2024-05-01T10:00:00+00:00",
                "author": {{"username": "painter", "full_name": null}},
                "image_tags": [{{"tags": {{"name": "nature"}}}}, {{"tags": null}}]
            }}"#
        );
        let row: GalleryRow = serde_json::from_str(&payload).unwrap();
        let image = GalleryImage::from(row);
        assert_eq!(image.image.likes_count, 3);
        assert_eq!(image.author_name(), "painter");
        assert_eq!(image.tags, vec!["nature".to_string()]);
    }

    #[test]
    fn comment_row_reads_embedded_author() {
        let payload = format!(
            r#"{{
                "id": "{}",
                "image_id": "{}",
                "user_id": "{}",
                "content": "lovely",
                "created_at": "2024-05-01T10:00:00Z",
                "author": null
            }}"#,
            CommentId::new(),
            ImageId::new(),
            UserId::new()
        );
        let row: CommentRow = serde_json::from_str(&payload).unwrap();
        assert_eq!(row.comment.content, "lovely");
        assert!(row.author.is_none());
    }
}
