use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use pixlink_core::auth::AuthError;
use pixlink_core::models::{CommentView, GalleryImage, Image, ImageId, ThreadMessage};
use pixlink_core::viewmodel::AuthBridge;
use pixlink_core::{Backend, ClientConfig};
use serde::Serialize;

use crate::auth::KeyringSessionStore;
use crate::config_profiles::{data_dir, CliProfilesConfig};
use crate::error::CliError;

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub db_path: Option<PathBuf>,
    pub storage_dir: Option<PathBuf>,
    pub profile: Option<String>,
}

/// A connected backend with the profile's session restored.
pub struct AppContext {
    pub profile_name: String,
    pub backend: Backend,
    pub auth: AuthBridge<KeyringSessionStore>,
}

#[derive(Debug, Serialize)]
pub struct GalleryListItem {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub image_url: String,
    pub author: String,
    pub likes: i64,
    pub tags: Vec<String>,
    pub created_at: String,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationListItem {
    pub chat_id: String,
    pub partner_id: String,
    pub partner: String,
    pub full_name: Option<String>,
    pub last_message: Option<String>,
}

impl AppContext {
    pub async fn open(options: &GlobalOptions) -> Result<Self, CliError> {
        let config = CliProfilesConfig::load().map_err(CliError::Config)?;
        let profile_name = config.resolve_profile_name(options.profile.as_deref());
        let from_profile = config
            .profile(&profile_name)
            .cloned()
            .unwrap_or_default()
            .client_config(ClientConfig::from_env());
        let client_config = ClientConfig {
            db_path: options.db_path.clone(),
            storage_dir: options.storage_dir.clone(),
            ..ClientConfig::default()
        }
        .or(from_profile);

        let data_dir = data_dir().map_err(CliError::Config)?;
        let backend = Backend::connect(&client_config, &data_dir).await?;
        Self::with_backend(profile_name, backend).await
    }

    pub async fn with_backend(profile_name: String, backend: Backend) -> Result<Self, CliError> {
        let auth = AuthBridge::new(&backend, KeyringSessionStore::new(&profile_name));
        auth.restore().await.map_err(auth_error)?;
        Ok(Self {
            profile_name,
            backend,
            auth,
        })
    }
}

pub fn auth_error(error: AuthError) -> CliError {
    CliError::Auth(error.to_string())
}

pub fn parse_id<T: FromStr>(raw: &str) -> Result<T, CliError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| CliError::InvalidId(raw.trim().to_string()))
}

pub async fn find_image(backend: &Backend, raw_id: &str) -> Result<Image, CliError> {
    let id: ImageId = parse_id(raw_id)?;
    backend
        .store
        .get_image(id)
        .await?
        .ok_or_else(|| CliError::ImageNotFound(raw_id.trim().to_string()))
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

pub fn format_gallery_lines(images: &[&GalleryImage]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    images
        .iter()
        .map(|entry| {
            let image = &entry.image;
            let id = short_id(&image.id.to_string());
            let title = truncate(&image.title, 30);
            let likes = format!("{} likes", image.likes_count);
            let relative_time =
                format_relative_time(image.created_at.timestamp_millis(), now_ms);
            let tags = render_tags(&entry.tags);
            let line = format!(
                "{id:<13}  {title:<30}  {likes:<9}  {:<16}  {relative_time}",
                entry.author_name()
            );
            if tags.is_empty() {
                line
            } else {
                format!("{line}  {tags}")
            }
        })
        .collect()
}

pub fn gallery_to_list_item(entry: &GalleryImage) -> GalleryListItem {
    let now_ms = Utc::now().timestamp_millis();
    GalleryListItem {
        id: entry.image.id.to_string(),
        title: entry.image.title.clone(),
        description: entry.image.description.clone(),
        image_url: entry.image.image_url.clone(),
        author: entry.author_name().to_string(),
        likes: entry.image.likes_count,
        tags: entry.tags.clone(),
        created_at: entry.image.created_at.to_rfc3339(),
        relative_time: format_relative_time(entry.image.created_at.timestamp_millis(), now_ms),
    }
}

pub fn format_comment_lines(comments: &[CommentView]) -> Vec<String> {
    comments
        .iter()
        .map(|entry| {
            format!(
                "{}  {}: {}  ({})",
                short_id(&entry.comment.id.to_string()),
                entry.author_name(),
                entry.comment.content,
                format_timestamp(entry.comment.created_at)
            )
        })
        .collect()
}

pub fn format_thread_lines(messages: &[ThreadMessage]) -> Vec<String> {
    messages
        .iter()
        .map(|entry| {
            format!(
                "[{}] {}: {}",
                entry.message.created_at.format("%H:%M"),
                entry.sender,
                entry.message.content
            )
        })
        .collect()
}

pub fn render_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn truncate(value: &str, max_chars: usize) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M UTC").to_string()
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Join word arguments, falling back to piped stdin.
pub fn resolve_text(parts: &[String]) -> Result<String, CliError> {
    if let Some(text) = normalize_content(&parts.join(" ")) {
        return Ok(text);
    }
    if let Some(text) = read_piped_stdin()? {
        return Ok(text);
    }
    Err(CliError::EmptyText)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}
