//! Conversation list and message thread.

use std::collections::{BTreeSet, HashMap};

use crate::backend::{Backend, ChangeFilter, ChangeKind, Subscription, Table};
use crate::error::{Error, Result, ValidationError};
use crate::models::{
    ChatId, ChatPartner, ConversationPreview, NewMessage, ParticipantPair, ThreadMessage, UserId,
};

pub struct ChatViewModel {
    backend: Backend,
    conversations: Vec<ConversationPreview>,
    search: String,
    selected: Option<ChatId>,
    messages: Vec<ThreadMessage>,
    compose: String,
    thread_feed: Option<Subscription>,
}

impl ChatViewModel {
    pub const fn new(backend: Backend) -> Self {
        Self {
            backend,
            conversations: Vec::new(),
            search: String::new(),
            selected: None,
            messages: Vec::new(),
            compose: String::new(),
            thread_feed: None,
        }
    }

    pub const fn selected(&self) -> Option<ChatId> {
        self.selected
    }

    /// Thread messages, oldest first
    pub fn messages(&self) -> &[ThreadMessage] {
        &self.messages
    }

    pub fn compose(&self) -> &str {
        &self.compose
    }

    pub fn set_compose(&mut self, text: impl Into<String>) {
        self.compose = text.into();
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    pub fn conversations(&self) -> &[ConversationPreview] {
        &self.conversations
    }

    /// Conversations whose partner matches the search box.
    pub fn visible_conversations(&self) -> Vec<&ConversationPreview> {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return self.conversations.iter().collect();
        }
        self.conversations
            .iter()
            .filter(|conversation| {
                let partner = &conversation.partner;
                partner.username.to_lowercase().contains(&needle)
                    || partner
                        .full_name
                        .as_ref()
                        .is_some_and(|name| name.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// The existing conversation between `me` and `other`, if any.
    pub async fn find_chat_with(&self, me: UserId, other: UserId) -> Result<Option<ChatId>> {
        let store = &self.backend.store;
        for chat in store.chat_ids_for_user(me).await? {
            if store.is_participant(chat, other).await? {
                return Ok(Some(chat));
            }
        }
        Ok(None)
    }

    /// Open the conversation with `other`, creating it if needed.
    pub async fn start_or_open_chat(&mut self, other: UserId) -> Result<ChatId> {
        let me = self.backend.session.require_user()?.id;
        if me == other {
            return Err(ValidationError::SelfChat.into());
        }

        let chat = match self.find_chat_with(me, other).await? {
            Some(chat) => chat,
            None => self.create_chat(me, other).await?,
        };
        self.open_thread(chat).await?;
        Ok(chat)
    }

    async fn create_chat(&self, me: UserId, other: UserId) -> Result<ChatId> {
        let pair = ParticipantPair::new(me, other);
        let store = &self.backend.store;
        match store.insert_chat(&pair).await {
            Ok(chat) => {
                store.insert_participants(chat.id, &pair.members()).await?;
                tracing::info!("Started chat {}", chat.id);
                Ok(chat.id)
            }
            // The other side created it since the scan.
            Err(Error::UniqueViolation(_)) => self
                .find_chat_with(me, other)
                .await?
                .ok_or_else(|| Error::NotFound(format!("chat for {}", pair.key()))),
            Err(error) => Err(error),
        }
    }

    /// Load every conversation of the current user with partner and latest
    /// message. Conversations whose partner has no profile are skipped.
    pub async fn load_conversations(&mut self) -> Result<()> {
        let me = self.backend.session.require_user()?.id;
        let store = &self.backend.store;

        let mut conversations = Vec::new();
        for chat_id in store.chat_ids_for_user(me).await? {
            let Some(partner_id) = store.other_participants(chat_id, me).await?.into_iter().next()
            else {
                continue;
            };
            let Some(profile) = store.get_profile(partner_id).await? else {
                tracing::debug!("Skipping chat {chat_id}: partner has no profile");
                continue;
            };
            conversations.push(ConversationPreview {
                chat_id,
                partner: ChatPartner {
                    id: profile.id,
                    username: profile.username,
                    full_name: profile.full_name,
                },
                last_message: store.latest_message(chat_id).await?,
            });
        }

        self.conversations = conversations;
        Ok(())
    }

    /// Select `chat`, subscribe to its new messages and load the thread.
    pub async fn open_thread(&mut self, chat: ChatId) -> Result<()> {
        self.thread_feed = None;
        self.selected = Some(chat);
        self.messages.clear();
        self.thread_feed = Some(
            self.backend
                .feed
                .subscribe(
                    ChangeFilter::table(Table::Messages)
                        .kind(ChangeKind::Insert)
                        .eq("chat_id", chat),
                )
                .await?,
        );
        self.refresh_thread().await
    }

    /// Drop the selection and stop listening for its messages.
    pub fn close_thread(&mut self) {
        self.thread_feed = None;
        self.selected = None;
        self.messages.clear();
    }

    /// Reload the selected thread, resolving senders in one batch.
    pub async fn refresh_thread(&mut self) -> Result<()> {
        let Some(chat) = self.selected else {
            return Ok(());
        };
        let store = &self.backend.store;
        let messages = store.list_messages(chat).await?;

        let senders: Vec<UserId> = messages
            .iter()
            .map(|message| message.user_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let names: HashMap<UserId, String> = store
            .get_profiles(&senders)
            .await?
            .into_iter()
            .map(|profile| (profile.id, profile.username))
            .collect();

        self.messages = messages
            .into_iter()
            .map(|message| {
                let sender = names
                    .get(&message.user_id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string());
                ThreadMessage { message, sender }
            })
            .collect();
        Ok(())
    }

    /// Send the compose text to the selected conversation.
    pub async fn send_message(&mut self) -> Result<()> {
        let content = self.compose.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyContent.into());
        }
        let chat = self.selected.ok_or(ValidationError::NoConversationSelected)?;
        let user = self.backend.session.require_user()?;

        self.backend
            .store
            .insert_message(&NewMessage {
                chat_id: chat,
                user_id: user.id,
                content: content.to_string(),
            })
            .await?;
        self.compose.clear();
        Ok(())
    }

    /// Wait for a new message in the open thread and reload it.
    ///
    /// Returns `false` when no thread is open or its feed has closed.
    pub async fn next_change(&mut self) -> Result<bool> {
        let Some(feed) = self.thread_feed.as_mut() else {
            return Ok(false);
        };
        if feed.recv().await.is_none() {
            self.thread_feed = None;
            return Ok(false);
        }
        self.refresh_thread().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewmodel::test_support::{local_backend, signed_in, signed_out};
    use pretty_assertions::assert_eq;

    #[tokio::test(flavor = "multi_thread")]
    async fn both_sides_resolve_to_one_chat() {
        let (backend, _dir) = local_backend().await;
        let ada = signed_in(&backend, "ada").await;
        let bob = signed_in(&backend, "bob").await;
        let ada_id = ada.session.user_id().unwrap();
        let bob_id = bob.session.user_id().unwrap();

        let mut ada_chat = ChatViewModel::new(ada);
        let mut bob_chat = ChatViewModel::new(bob);
        let first = ada_chat.start_or_open_chat(bob_id).await.unwrap();
        let second = bob_chat.start_or_open_chat(ada_id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(ada_chat.start_or_open_chat(bob_id).await.unwrap(), first);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn racing_creation_reuses_existing_pair() {
        let (backend, _dir) = local_backend().await;
        let ada = signed_in(&backend, "ada").await;
        let bob = signed_in(&backend, "bob").await;
        let ada_id = ada.session.user_id().unwrap();
        let bob_id = bob.session.user_id().unwrap();

        let existing = ChatViewModel::new(bob.clone())
            .create_chat(bob_id, ada_id)
            .await
            .unwrap();
        let raced = ChatViewModel::new(ada)
            .create_chat(ada_id, bob_id)
            .await
            .unwrap();
        assert_eq!(raced, existing);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn self_chat_is_rejected() {
        let (backend, _dir) = local_backend().await;
        let ada = signed_in(&backend, "ada").await;
        let me = ada.session.user_id().unwrap();
        assert!(matches!(
            ChatViewModel::new(ada).start_or_open_chat(me).await,
            Err(Error::Validation(ValidationError::SelfChat))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn thread_updates_from_the_other_side() {
        let (backend, _dir) = local_backend().await;
        let ada = signed_in(&backend, "ada").await;
        let bob = signed_in(&backend, "bob").await;
        let bob_id = bob.session.user_id().unwrap();
        let ada_id = ada.session.user_id().unwrap();

        let mut ada_chat = ChatViewModel::new(ada);
        let chat = ada_chat.start_or_open_chat(bob_id).await.unwrap();
        let mut bob_chat = ChatViewModel::new(bob);
        bob_chat.start_or_open_chat(ada_id).await.unwrap();

        ada_chat.set_compose("  hi bob  ");
        ada_chat.send_message().await.unwrap();
        assert_eq!(ada_chat.compose(), "");
        assert!(bob_chat.next_change().await.unwrap());

        bob_chat.set_compose("hey");
        bob_chat.send_message().await.unwrap();
        assert!(bob_chat.next_change().await.unwrap());

        let thread: Vec<(&str, &str)> = bob_chat
            .messages()
            .iter()
            .map(|entry| (entry.sender.as_str(), entry.message.content.as_str()))
            .collect();
        assert_eq!(thread, vec![("ada", "hi bob"), ("bob", "hey")]);
        assert!(bob_chat.messages().iter().all(|entry| entry.message.chat_id == chat));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn conversation_list_shows_partner_and_latest() {
        let (backend, _dir) = local_backend().await;
        let ada = signed_in(&backend, "ada").await;
        let bob = signed_in(&backend, "bob").await;
        let cy = signed_in(&backend, "cy").await;

        let mut chats = ChatViewModel::new(ada);
        chats
            .start_or_open_chat(bob.session.user_id().unwrap())
            .await
            .unwrap();
        chats.set_compose("lunch?");
        chats.send_message().await.unwrap();
        chats
            .start_or_open_chat(cy.session.user_id().unwrap())
            .await
            .unwrap();

        chats.load_conversations().await.unwrap();
        let summary: Vec<(&str, Option<&str>)> = chats
            .conversations()
            .iter()
            .map(|entry| {
                (
                    entry.partner.username.as_str(),
                    entry.last_message.as_ref().map(|last| last.content.as_str()),
                )
            })
            .collect();
        assert_eq!(summary, vec![("bob", Some("lunch?")), ("cy", None)]);

        chats.set_search("B");
        assert_eq!(chats.visible_conversations().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn closed_thread_no_longer_accepts_messages() {
        let (backend, _dir) = local_backend().await;
        let ada = signed_in(&backend, "ada").await;
        let bob = signed_in(&backend, "bob").await;

        let mut chats = ChatViewModel::new(ada);
        let chat = chats
            .start_or_open_chat(bob.session.user_id().unwrap())
            .await
            .unwrap();
        chats.set_compose("see you");
        chats.send_message().await.unwrap();
        assert!(chats.next_change().await.unwrap());
        assert_eq!(chats.selected(), Some(chat));
        assert_eq!(chats.messages().len(), 1);

        chats.close_thread();
        assert_eq!(chats.selected(), None);
        assert!(chats.messages().is_empty());
        assert!(!chats.next_change().await.unwrap());
        chats.set_compose("still there?");
        assert!(matches!(
            chats.send_message().await,
            Err(Error::Validation(ValidationError::NoConversationSelected))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sending_needs_text_and_a_conversation() {
        let (backend, _dir) = local_backend().await;
        let ada = signed_in(&backend, "ada").await;

        let mut chats = ChatViewModel::new(ada);
        assert!(matches!(
            chats.send_message().await,
            Err(Error::Validation(ValidationError::EmptyContent))
        ));
        chats.set_compose("hello");
        assert!(matches!(
            chats.send_message().await,
            Err(Error::Validation(ValidationError::NoConversationSelected))
        ));

        let mut anonymous = ChatViewModel::new(signed_out(&backend));
        assert!(matches!(
            anonymous.load_conversations().await,
            Err(Error::AuthRequired)
        ));
    }
}
