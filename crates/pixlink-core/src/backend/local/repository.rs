//! libSQL implementation of `RecordStore`

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::params::Params;
use libsql::{params, Connection, Row, Rows, Value};
use serde::Serialize;
use tokio::sync::Mutex;

use super::connection::Database;
use super::hub::ChangeHub;
use crate::backend::{ChangeKind, RecordStore, Table};
use crate::error::{Error, Result};
use crate::models::{
    Chat, ChatId, Comment, CommentId, CommentView, GalleryImage, Image, ImageAuthor, ImageId,
    Like, LikeId, Message, MessageId, MessagePreview, NewComment, NewImage, NewMessage, NewProfile,
    ParticipantPair, Profile, ProfileUpdate, Tag, TagId, UserId,
};

const IMAGE_COLUMNS: &str = "images.id, images.user_id, images.title, images.description, \
     images.image_url, images.storage_path, images.likes_count, images.created_at";

/// Record store over a local libSQL database.
///
/// Every successful write is published on the change hub.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    hub: ChangeHub,
}

impl LocalStore {
    pub const fn new(db: Arc<Mutex<Database>>, hub: ChangeHub) -> Self {
        Self { db, hub }
    }

    fn publish(&self, table: Table, kind: ChangeKind, record: &impl Serialize) {
        match serde_json::to_value(record) {
            Ok(record) => self.hub.publish(table, kind, record),
            Err(error) => tracing::warn!("Failed to encode {table} change: {error}"),
        }
    }
}

fn timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

fn parse_id<T: FromStr>(raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::Database(format!("invalid row id '{raw}'")))
}

/// Map constraint failures on writes to `UniqueViolation`.
fn write_error(error: libsql::Error) -> Error {
    let message = error.to_string();
    if message.contains("UNIQUE constraint failed") {
        Error::UniqueViolation(message)
    } else {
        Error::LibSql(error)
    }
}

async fn collect<T>(mut rows: Rows, parse: impl Fn(&Row) -> Result<T>) -> Result<Vec<T>> {
    let mut items = Vec::new();
    while let Some(row) = rows.next().await? {
        items.push(parse(&row)?);
    }
    Ok(items)
}

async fn first<T>(mut rows: Rows, parse: impl Fn(&Row) -> Result<T>) -> Result<Option<T>> {
    match rows.next().await? {
        Some(row) => parse(&row).map(Some),
        None => Ok(None),
    }
}

fn text_params(values: impl IntoIterator<Item = String>) -> Params {
    Params::Positional(values.into_iter().map(Value::Text).collect())
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn parse_profile(row: &Row) -> Result<Profile> {
    Ok(Profile {
        id: parse_id(&row.get::<String>(0)?)?,
        username: row.get(1)?,
        full_name: row.get::<Option<String>>(2)?,
        avatar_url: row.get::<Option<String>>(3)?,
        created_at: Some(timestamp(row.get(4)?)),
    })
}

fn parse_image(row: &Row) -> Result<Image> {
    Ok(Image {
        id: parse_id(&row.get::<String>(0)?)?,
        user_id: parse_id(&row.get::<String>(1)?)?,
        title: row.get(2)?,
        description: row.get::<Option<String>>(3)?,
        image_url: row.get(4)?,
        storage_path: row.get::<Option<String>>(5)?,
        likes_count: row.get(6)?,
        created_at: timestamp(row.get(7)?),
    })
}

fn parse_like(row: &Row) -> Result<Like> {
    Ok(Like {
        id: parse_id(&row.get::<String>(0)?)?,
        image_id: parse_id(&row.get::<String>(1)?)?,
        user_id: parse_id(&row.get::<String>(2)?)?,
    })
}

fn parse_comment(row: &Row) -> Result<Comment> {
    Ok(Comment {
        id: parse_id(&row.get::<String>(0)?)?,
        image_id: parse_id(&row.get::<String>(1)?)?,
        user_id: parse_id(&row.get::<String>(2)?)?,
        content: row.get(3)?,
        created_at: timestamp(row.get(4)?),
    })
}

fn parse_message(row: &Row) -> Result<Message> {
    Ok(Message {
        id: parse_id(&row.get::<String>(0)?)?,
        chat_id: parse_id(&row.get::<String>(1)?)?,
        user_id: parse_id(&row.get::<String>(2)?)?,
        content: row.get(3)?,
        created_at: timestamp(row.get(4)?),
    })
}

#[derive(Serialize)]
struct ImageTagRow {
    image_id: ImageId,
    tag_id: TagId,
}

#[derive(Serialize)]
struct ParticipantRow {
    chat_id: ChatId,
    user_id: UserId,
}

async fn select_image(conn: &Connection, id: ImageId) -> Result<Option<Image>> {
    let rows = conn
        .query(
            &format!("SELECT {IMAGE_COLUMNS} FROM images WHERE images.id = ?"),
            [id.as_str()],
        )
        .await?;
    first(rows, parse_image).await
}

async fn select_profile(conn: &Connection, id: UserId) -> Result<Option<Profile>> {
    let rows = conn
        .query(
            "SELECT id, username, full_name, avatar_url, created_at FROM profiles WHERE id = ?",
            [id.as_str()],
        )
        .await?;
    first(rows, parse_profile).await
}

#[async_trait]
impl RecordStore for LocalStore {
    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>> {
        let db = self.db.lock().await;
        select_profile(db.connection(), id).await
    }

    async fn get_profiles(&self, ids: &[UserId]) -> Result<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let db = self.db.lock().await;
        let sql = format!(
            "SELECT id, username, full_name, avatar_url, created_at FROM profiles WHERE id IN ({})",
            placeholders(ids.len())
        );
        let rows = db
            .connection()
            .query(&sql, text_params(ids.iter().map(UserId::as_str)))
            .await?;
        collect(rows, parse_profile).await
    }

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile> {
        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute(
            "INSERT INTO profiles (id, username, full_name, avatar_url, created_at)
             VALUES (?, ?, ?, NULL, ?)",
            params![
                profile.id.as_str(),
                profile.username.as_str(),
                profile.full_name.as_deref(),
                Utc::now().timestamp_millis()
            ],
        )
        .await
        .map_err(write_error)?;

        let created = select_profile(conn, profile.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("profile {}", profile.id)))?;
        self.publish(Table::Profiles, ChangeKind::Insert, &created);
        Ok(created)
    }

    async fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> Result<Profile> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let changed = conn
            .execute(
                "UPDATE profiles SET username = ?, full_name = ? WHERE id = ?",
                params![
                    update.username.as_str(),
                    update.full_name.as_deref(),
                    id.as_str()
                ],
            )
            .await
            .map_err(write_error)?;
        if changed == 0 {
            return Err(Error::NotFound(format!("profile {id}")));
        }

        let updated = select_profile(conn, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("profile {id}")))?;
        self.publish(Table::Profiles, ChangeKind::Update, &updated);
        Ok(updated)
    }

    async fn set_avatar_url(&self, id: UserId, avatar_url: &str) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let changed = conn
            .execute(
                "UPDATE profiles SET avatar_url = ? WHERE id = ?",
                params![avatar_url, id.as_str()],
            )
            .await?;
        if changed == 0 {
            return Err(Error::NotFound(format!("profile {id}")));
        }
        if let Some(updated) = select_profile(conn, id).await? {
            self.publish(Table::Profiles, ChangeKind::Update, &updated);
        }
        Ok(())
    }

    async fn list_gallery(&self) -> Result<Vec<GalleryImage>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let rows = conn
            .query(
                "SELECT image_tags.image_id, tags.name
                 FROM image_tags JOIN tags ON tags.id = image_tags.tag_id
                 ORDER BY tags.name",
                (),
            )
            .await?;
        let mut tags: HashMap<String, Vec<String>> = HashMap::new();
        let links = collect(rows, |row| Ok((row.get::<String>(0)?, row.get::<String>(1)?))).await?;
        for (image_id, name) in links {
            tags.entry(image_id).or_default().push(name);
        }

        let rows = conn
            .query(
                &format!(
                    "SELECT {IMAGE_COLUMNS}, profiles.username, profiles.full_name
                     FROM images LEFT JOIN profiles ON profiles.id = images.user_id
                     ORDER BY images.likes_count DESC, images.created_at DESC, images.rowid DESC"
                ),
                (),
            )
            .await?;

        collect(rows, |row| {
            let image = parse_image(row)?;
            let author = row
                .get::<Option<String>>(8)?
                .map(|username| -> Result<ImageAuthor> {
                    Ok(ImageAuthor {
                        username,
                        full_name: row.get::<Option<String>>(9)?,
                    })
                })
                .transpose()?;
            let tags = tags.get(&image.id.as_str()).cloned().unwrap_or_default();
            Ok(GalleryImage {
                image,
                author,
                tags,
            })
        })
        .await
    }

    async fn get_image(&self, id: ImageId) -> Result<Option<Image>> {
        let db = self.db.lock().await;
        select_image(db.connection(), id).await
    }

    async fn insert_image(&self, image: &NewImage) -> Result<Image> {
        let id = ImageId::new();
        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute(
            "INSERT INTO images (id, user_id, title, description, image_url, storage_path, likes_count, created_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, ?)",
            params![
                id.as_str(),
                image.user_id.as_str(),
                image.title.as_str(),
                image.description.as_deref(),
                image.image_url.as_str(),
                image.storage_path.as_deref(),
                Utc::now().timestamp_millis()
            ],
        )
        .await
        .map_err(write_error)?;

        let created = select_image(conn, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("image {id}")))?;
        self.publish(Table::Images, ChangeKind::Insert, &created);
        Ok(created)
    }

    async fn like_count(&self, id: ImageId) -> Result<i64> {
        let db = self.db.lock().await;
        let rows = db
            .connection()
            .query("SELECT likes_count FROM images WHERE id = ?", [id.as_str()])
            .await?;
        first(rows, |row| Ok(row.get::<i64>(0)?))
            .await?
            .ok_or_else(|| Error::NotFound(format!("image {id}")))
    }

    async fn delete_image(&self, id: ImageId) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let Some(image) = select_image(conn, id).await? else {
            return Ok(());
        };

        let likes = collect(
            conn.query(
                "SELECT id, image_id, user_id FROM likes WHERE image_id = ?",
                [id.as_str()],
            )
            .await?,
            parse_like,
        )
        .await?;
        let comments = collect(
            conn.query(
                "SELECT id, image_id, user_id, content, created_at FROM comments WHERE image_id = ?",
                [id.as_str()],
            )
            .await?,
            parse_comment,
        )
        .await?;
        let links = collect(
            conn.query(
                "SELECT image_id, tag_id FROM image_tags WHERE image_id = ?",
                [id.as_str()],
            )
            .await?,
            |row| {
                Ok(ImageTagRow {
                    image_id: parse_id(&row.get::<String>(0)?)?,
                    tag_id: parse_id(&row.get::<String>(1)?)?,
                })
            },
        )
        .await?;

        // Likes, comments and tag links go with the image through ON DELETE CASCADE.
        conn.execute("DELETE FROM images WHERE id = ?", [id.as_str()])
            .await?;

        for like in &likes {
            self.publish(Table::Likes, ChangeKind::Delete, like);
        }
        for comment in &comments {
            self.publish(Table::Comments, ChangeKind::Delete, comment);
        }
        for link in &links {
            self.publish(Table::ImageTags, ChangeKind::Delete, link);
        }
        self.publish(Table::Images, ChangeKind::Delete, &image);
        Ok(())
    }

    async fn find_tag(&self, name: &str) -> Result<Option<Tag>> {
        let db = self.db.lock().await;
        let rows = db
            .connection()
            .query(
                "SELECT id, name FROM tags WHERE name = ? COLLATE NOCASE",
                [name.trim()],
            )
            .await?;
        first(rows, |row| {
            Ok(Tag {
                id: parse_id(&row.get::<String>(0)?)?,
                name: row.get(1)?,
            })
        })
        .await
    }

    async fn insert_tag(&self, name: &str) -> Result<Tag> {
        let tag = Tag {
            id: TagId::new(),
            name: name.trim().to_string(),
        };
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "INSERT INTO tags (id, name, created_at) VALUES (?, ?, ?)",
                params![
                    tag.id.as_str(),
                    tag.name.as_str(),
                    Utc::now().timestamp_millis()
                ],
            )
            .await
            .map_err(write_error)?;
        self.publish(Table::Tags, ChangeKind::Insert, &tag);
        Ok(tag)
    }

    async fn link_tag(&self, image: ImageId, tag: TagId) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "INSERT INTO image_tags (image_id, tag_id) VALUES (?, ?)",
                [image.as_str(), tag.as_str()],
            )
            .await
            .map_err(write_error)?;
        self.publish(
            Table::ImageTags,
            ChangeKind::Insert,
            &ImageTagRow {
                image_id: image,
                tag_id: tag,
            },
        );
        Ok(())
    }

    async fn image_tags(&self, image: ImageId) -> Result<Vec<String>> {
        let db = self.db.lock().await;
        let rows = db
            .connection()
            .query(
                "SELECT tags.name FROM image_tags JOIN tags ON tags.id = image_tags.tag_id
                 WHERE image_tags.image_id = ?
                 ORDER BY image_tags.rowid",
                [image.as_str()],
            )
            .await?;
        collect(rows, |row| Ok(row.get::<String>(0)?)).await
    }

    async fn find_like(&self, image: ImageId, user: UserId) -> Result<Option<Like>> {
        let db = self.db.lock().await;
        let rows = db
            .connection()
            .query(
                "SELECT id, image_id, user_id FROM likes WHERE image_id = ? AND user_id = ?",
                [image.as_str(), user.as_str()],
            )
            .await?;
        first(rows, parse_like).await
    }

    async fn insert_like(&self, image: ImageId, user: UserId) -> Result<Like> {
        let like = Like {
            id: LikeId::new(),
            image_id: image,
            user_id: user,
        };
        let db = self.db.lock().await;
        let conn = db.connection();
        conn.execute(
            "INSERT INTO likes (id, image_id, user_id, created_at) VALUES (?, ?, ?, ?)",
            params![
                like.id.as_str(),
                image.as_str(),
                user.as_str(),
                Utc::now().timestamp_millis()
            ],
        )
        .await
        .map_err(write_error)?;

        self.publish(Table::Likes, ChangeKind::Insert, &like);
        if let Some(updated) = select_image(conn, image).await? {
            self.publish(Table::Images, ChangeKind::Update, &updated);
        }
        Ok(like)
    }

    async fn delete_like(&self, id: LikeId) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let existing = first(
            conn.query(
                "SELECT id, image_id, user_id FROM likes WHERE id = ?",
                [id.as_str()],
            )
            .await?,
            parse_like,
        )
        .await?;
        let Some(like) = existing else {
            return Ok(());
        };

        conn.execute("DELETE FROM likes WHERE id = ?", [id.as_str()])
            .await?;
        self.publish(Table::Likes, ChangeKind::Delete, &like);
        if let Some(updated) = select_image(conn, like.image_id).await? {
            self.publish(Table::Images, ChangeKind::Update, &updated);
        }
        Ok(())
    }

    async fn list_comments(&self, image: ImageId) -> Result<Vec<CommentView>> {
        let db = self.db.lock().await;
        let rows = db
            .connection()
            .query(
                "SELECT comments.id, comments.image_id, comments.user_id, comments.content,
                        comments.created_at, profiles.username
                 FROM comments LEFT JOIN profiles ON profiles.id = comments.user_id
                 WHERE comments.image_id = ?
                 ORDER BY comments.created_at DESC, comments.rowid DESC",
                [image.as_str()],
            )
            .await?;
        collect(rows, |row| {
            Ok(CommentView {
                comment: parse_comment(row)?,
                author: row.get::<Option<String>>(5)?,
            })
        })
        .await
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<Comment> {
        let created = Comment {
            id: CommentId::new(),
            image_id: comment.image_id,
            user_id: comment.user_id,
            content: comment.content.clone(),
            created_at: Utc::now(),
        };
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "INSERT INTO comments (id, image_id, user_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
                params![
                    created.id.as_str(),
                    created.image_id.as_str(),
                    created.user_id.as_str(),
                    created.content.as_str(),
                    created.created_at.timestamp_millis()
                ],
            )
            .await
            .map_err(write_error)?;
        self.publish(Table::Comments, ChangeKind::Insert, &created);
        Ok(created)
    }

    async fn delete_comment(&self, id: CommentId) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let existing = first(
            conn.query(
                "SELECT id, image_id, user_id, content, created_at FROM comments WHERE id = ?",
                [id.as_str()],
            )
            .await?,
            parse_comment,
        )
        .await?;
        let Some(comment) = existing else {
            return Ok(());
        };

        conn.execute("DELETE FROM comments WHERE id = ?", [id.as_str()])
            .await?;
        self.publish(Table::Comments, ChangeKind::Delete, &comment);
        Ok(())
    }

    async fn chat_ids_for_user(&self, user: UserId) -> Result<Vec<ChatId>> {
        let db = self.db.lock().await;
        let rows = db
            .connection()
            .query(
                "SELECT chat_id FROM chat_participants WHERE user_id = ? ORDER BY joined_at, rowid",
                [user.as_str()],
            )
            .await?;
        collect(rows, |row| parse_id(&row.get::<String>(0)?)).await
    }

    async fn is_participant(&self, chat: ChatId, user: UserId) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db
            .connection()
            .query(
                "SELECT 1 FROM chat_participants WHERE chat_id = ? AND user_id = ?",
                [chat.as_str(), user.as_str()],
            )
            .await?;
        Ok(first(rows, |_| Ok(())).await?.is_some())
    }

    async fn insert_chat(&self, pair: &ParticipantPair) -> Result<Chat> {
        let chat = Chat {
            id: ChatId::new(),
            pair_key: Some(pair.key()),
            created_at: Utc::now(),
        };
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "INSERT INTO chats (id, pair_key, created_at) VALUES (?, ?, ?)",
                params![
                    chat.id.as_str(),
                    chat.pair_key.as_deref(),
                    chat.created_at.timestamp_millis()
                ],
            )
            .await
            .map_err(write_error)?;
        self.publish(Table::Chats, ChangeKind::Insert, &chat);
        Ok(chat)
    }

    async fn insert_participants(&self, chat: ChatId, users: &[UserId]) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let now = Utc::now().timestamp_millis();

        conn.execute("BEGIN TRANSACTION", ()).await?;
        for user in users {
            if let Err(error) = conn
                .execute(
                    "INSERT INTO chat_participants (chat_id, user_id, joined_at) VALUES (?, ?, ?)",
                    params![chat.as_str(), user.as_str(), now],
                )
                .await
            {
                conn.execute("ROLLBACK", ()).await.ok();
                return Err(write_error(error));
            }
        }
        if let Err(error) = conn.execute("COMMIT", ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(error.into());
        }

        for user in users {
            self.publish(
                Table::ChatParticipants,
                ChangeKind::Insert,
                &ParticipantRow {
                    chat_id: chat,
                    user_id: *user,
                },
            );
        }
        Ok(())
    }

    async fn other_participants(&self, chat: ChatId, user: UserId) -> Result<Vec<UserId>> {
        let db = self.db.lock().await;
        let rows = db
            .connection()
            .query(
                "SELECT user_id FROM chat_participants WHERE chat_id = ? AND user_id != ?
                 ORDER BY joined_at, rowid",
                [chat.as_str(), user.as_str()],
            )
            .await?;
        collect(rows, |row| parse_id(&row.get::<String>(0)?)).await
    }

    async fn latest_message(&self, chat: ChatId) -> Result<Option<MessagePreview>> {
        let db = self.db.lock().await;
        let rows = db
            .connection()
            .query(
                "SELECT content, created_at FROM messages WHERE chat_id = ?
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                [chat.as_str()],
            )
            .await?;
        first(rows, |row| {
            Ok(MessagePreview {
                content: row.get(0)?,
                created_at: timestamp(row.get(1)?),
            })
        })
        .await
    }

    async fn list_messages(&self, chat: ChatId) -> Result<Vec<Message>> {
        let db = self.db.lock().await;
        let rows = db
            .connection()
            .query(
                "SELECT id, chat_id, user_id, content, created_at FROM messages
                 WHERE chat_id = ? ORDER BY created_at, rowid",
                [chat.as_str()],
            )
            .await?;
        collect(rows, parse_message).await
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message> {
        let created = Message {
            id: MessageId::new(),
            chat_id: message.chat_id,
            user_id: message.user_id,
            content: message.content.clone(),
            created_at: Utc::now(),
        };
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "INSERT INTO messages (id, chat_id, user_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
                params![
                    created.id.as_str(),
                    created.chat_id.as_str(),
                    created.user_id.as_str(),
                    created.content.as_str(),
                    created.created_at.timestamp_millis()
                ],
            )
            .await
            .map_err(write_error)?;
        self.publish(Table::Messages, ChangeKind::Insert, &created);
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn setup() -> LocalStore {
        let db = Database::open_in_memory().await.unwrap();
        LocalStore::new(Arc::new(Mutex::new(db)), ChangeHub::new())
    }

    async fn profile(store: &LocalStore, username: &str) -> UserId {
        let id = UserId::new();
        store
            .insert_profile(&NewProfile {
                id,
                username: username.to_string(),
                full_name: None,
            })
            .await
            .unwrap();
        id
    }

    async fn image(store: &LocalStore, owner: UserId, title: &str) -> Image {
        store
            .insert_image(&NewImage {
                user_id: owner,
                title: title.to_string(),
                description: None,
                image_url: format!("file:///tmp/{title}.png"),
                storage_path: Some(format!("{title}.png")),
            })
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn duplicate_username_is_a_unique_violation() {
        let store = setup().await;
        profile(&store, "ada").await;
        let result = store
            .insert_profile(&NewProfile {
                id: UserId::new(),
                username: "ada".to_string(),
                full_name: None,
            })
            .await;
        assert!(matches!(result, Err(Error::UniqueViolation(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn like_triggers_keep_count() {
        let store = setup().await;
        let owner = profile(&store, "owner").await;
        let fan = profile(&store, "fan").await;
        let picture = image(&store, owner, "sunset").await;

        let like = store.insert_like(picture.id, fan).await.unwrap();
        assert_eq!(store.like_count(picture.id).await.unwrap(), 1);
        assert!(matches!(
            store.insert_like(picture.id, fan).await,
            Err(Error::UniqueViolation(_))
        ));

        store.delete_like(like.id).await.unwrap();
        assert_eq!(store.like_count(picture.id).await.unwrap(), 0);
        assert!(store.find_like(picture.id, fan).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn gallery_is_ranked_by_likes_then_recency() {
        let store = setup().await;
        let owner = profile(&store, "owner").await;
        let older = image(&store, owner, "older").await;
        let newer = image(&store, owner, "newer").await;
        let liked = image(&store, owner, "liked").await;
        store.insert_like(liked.id, owner).await.unwrap();

        let titles: Vec<String> = store
            .list_gallery()
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.image.title)
            .collect();
        assert_eq!(titles, vec!["liked", "newer", "older"]);
        assert_ne!(older.id, newer.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn gallery_includes_author_and_tags() {
        let store = setup().await;
        let owner = profile(&store, "painter").await;
        let picture = image(&store, owner, "forest").await;
        let tag = store.insert_tag("nature").await.unwrap();
        store.link_tag(picture.id, tag.id).await.unwrap();

        let gallery = store.list_gallery().await.unwrap();
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery[0].author_name(), "painter");
        assert_eq!(gallery[0].tags, vec!["nature".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tags_are_found_case_insensitively() {
        let store = setup().await;
        store.insert_tag("nature").await.unwrap();
        let found = store.find_tag("NATURE").await.unwrap().unwrap();
        assert_eq!(found.name, "nature");
        assert!(matches!(
            store.insert_tag("Nature").await,
            Err(Error::UniqueViolation(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deleting_image_cascades() {
        let store = setup().await;
        let owner = profile(&store, "owner").await;
        let picture = image(&store, owner, "doomed").await;
        let tag = store.insert_tag("gone").await.unwrap();
        store.link_tag(picture.id, tag.id).await.unwrap();
        store.insert_like(picture.id, owner).await.unwrap();
        store
            .insert_comment(&NewComment {
                image_id: picture.id,
                user_id: owner,
                content: "bye".to_string(),
            })
            .await
            .unwrap();

        store.delete_image(picture.id).await.unwrap();

        assert!(store.get_image(picture.id).await.unwrap().is_none());
        assert!(store.find_like(picture.id, owner).await.unwrap().is_none());
        assert!(store.list_comments(picture.id).await.unwrap().is_empty());
        assert!(store.image_tags(picture.id).await.unwrap().is_empty());
        // The tag itself survives.
        assert!(store.find_tag("gone").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn comments_are_newest_first_with_author() {
        let store = setup().await;
        let owner = profile(&store, "owner").await;
        let picture = image(&store, owner, "pic").await;
        for content in ["first", "second"] {
            store
                .insert_comment(&NewComment {
                    image_id: picture.id,
                    user_id: owner,
                    content: content.to_string(),
                })
                .await
                .unwrap();
        }

        let comments = store.list_comments(picture.id).await.unwrap();
        let contents: Vec<&str> = comments
            .iter()
            .map(|view| view.comment.content.as_str())
            .collect();
        assert_eq!(contents, vec!["second", "first"]);
        assert_eq!(comments[0].author_name(), "owner");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn chat_pair_key_is_unique() {
        let store = setup().await;
        let a = UserId::new();
        let b = UserId::new();
        let chat = store.insert_chat(&ParticipantPair::new(a, b)).await.unwrap();
        store.insert_participants(chat.id, &[a, b]).await.unwrap();

        assert!(matches!(
            store.insert_chat(&ParticipantPair::new(b, a)).await,
            Err(Error::UniqueViolation(_))
        ));
        assert_eq!(store.chat_ids_for_user(b).await.unwrap(), vec![chat.id]);
        assert!(store.is_participant(chat.id, a).await.unwrap());
        assert_eq!(store.other_participants(chat.id, a).await.unwrap(), vec![b]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn messages_are_ordered_and_previewed() {
        let store = setup().await;
        let a = UserId::new();
        let b = UserId::new();
        let chat = store.insert_chat(&ParticipantPair::new(a, b)).await.unwrap();
        for (sender, content) in [(a, "hi"), (b, "hello"), (a, "how are you?")] {
            store
                .insert_message(&NewMessage {
                    chat_id: chat.id,
                    user_id: sender,
                    content: content.to_string(),
                })
                .await
                .unwrap();
        }

        let contents: Vec<String> = store
            .list_messages(chat.id)
            .await
            .unwrap()
            .into_iter()
            .map(|message| message.content)
            .collect();
        assert_eq!(contents, vec!["hi", "hello", "how are you?"]);
        assert_eq!(
            store.latest_message(chat.id).await.unwrap().unwrap().content,
            "how are you?"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn batch_profile_lookup() {
        let store = setup().await;
        let a = profile(&store, "alpha").await;
        let b = profile(&store, "beta").await;
        let mut names: Vec<String> = store
            .get_profiles(&[a, b, UserId::new()])
            .await
            .unwrap()
            .into_iter()
            .map(|profile| profile.username)
            .collect();
        names.sort();
        assert_eq!(names, vec!["alpha", "beta"]);
    }
}
