//! Change notifications.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;

/// Tables a client can watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Profiles,
    Images,
    Tags,
    ImageTags,
    Likes,
    Comments,
    Chats,
    ChatParticipants,
    Messages,
}

impl Table {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Profiles => "profiles",
            Self::Images => "images",
            Self::Tags => "tags",
            Self::ImageTags => "image_tags",
            Self::Likes => "likes",
            Self::Comments => "comments",
            Self::Chats => "chats",
            Self::ChatParticipants => "chat_participants",
            Self::Messages => "messages",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "profiles" => Ok(Self::Profiles),
            "images" => Ok(Self::Images),
            "tags" => Ok(Self::Tags),
            "image_tags" => Ok(Self::ImageTags),
            "likes" => Ok(Self::Likes),
            "comments" => Ok(Self::Comments),
            "chats" => Ok(Self::Chats),
            "chat_participants" => Ok(Self::ChatParticipants),
            "messages" => Ok(Self::Messages),
            other => Err(format!("unknown table '{other}'")),
        }
    }
}

/// Row change kinds; `All` only appears in filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    #[serde(rename = "*")]
    All,
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
}

impl ChangeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "*",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "*" => Some(Self::All),
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// One row change
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    /// New row for inserts and updates, old row for deletes
    pub record: serde_json::Value,
}

/// What a subscription wants to hear about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: Table,
    pub kind: ChangeKind,
    /// `(column, value)` equality filter
    pub column_eq: Option<(String, String)>,
}

impl ChangeFilter {
    pub const fn table(table: Table) -> Self {
        Self {
            table,
            kind: ChangeKind::All,
            column_eq: None,
        }
    }

    #[must_use]
    pub const fn kind(mut self, kind: ChangeKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.column_eq = Some((column.into(), value.to_string()));
        self
    }

    /// Filter in PostgREST form, e.g. `image_id=eq.<id>`.
    pub fn filter_expression(&self) -> Option<String> {
        self.column_eq
            .as_ref()
            .map(|(column, value)| format!("{column}=eq.{value}"))
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table {
            return false;
        }
        if self.kind != ChangeKind::All && self.kind != event.kind {
            return false;
        }
        match &self.column_eq {
            None => true,
            Some((column, expected)) => match event.record.get(column) {
                Some(serde_json::Value::String(value)) => value == expected,
                Some(value) => value.to_string() == *expected,
                None => false,
            },
        }
    }
}

/// Live subscription; dropping it unsubscribes.
pub struct Subscription {
    events: mpsc::Receiver<ChangeEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Subscription fed by `task`, which is aborted on drop.
    pub const fn new(events: mpsc::Receiver<ChangeEvent>, task: JoinHandle<()>) -> Self {
        Self {
            events,
            task: Some(task),
        }
    }

    /// Subscription whose producer shuts itself down once the receiver closes.
    pub const fn from_receiver(events: mpsc::Receiver<ChangeEvent>) -> Self {
        Self { events, task: None }
    }

    /// Next matching change, or `None` once the feed has closed.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription>;
}
