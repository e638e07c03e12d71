//! Explicit session context shared by every view-model.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;

use crate::auth::{AuthSession, AuthUser};
use crate::error::{Error, Result};
use crate::models::UserId;

const AUTH_EVENT_CAPACITY: usize = 16;

/// Session lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(AuthUser),
    TokenRefreshed(AuthUser),
    SignedOut,
}

/// Current session plus a broadcast of auth events.
///
/// Cloning shares the same underlying session.
#[derive(Clone)]
pub struct SessionContext {
    current: Arc<RwLock<Option<AuthSession>>>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            current: Arc::new(RwLock::new(None)),
            events,
        }
    }

    /// A context already holding `session`, without emitting an event.
    pub fn with_session(session: AuthSession) -> Self {
        let context = Self::new();
        *context
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(session);
        context
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub fn current_session(&self) -> Option<AuthSession> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|session| session.user.clone())
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|session| session.user.id)
    }

    /// The signed-in user, or [`Error::AuthRequired`].
    pub fn require_user(&self) -> Result<AuthUser> {
        self.current_user().ok_or(Error::AuthRequired)
    }

    pub fn access_token(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.user_id().is_some()
    }

    pub(crate) fn sign_in(&self, session: AuthSession) {
        let user = session.user.clone();
        self.replace(Some(session));
        self.emit(AuthEvent::SignedIn(user));
    }

    pub(crate) fn refresh(&self, session: AuthSession) {
        let user = session.user.clone();
        self.replace(Some(session));
        self.emit(AuthEvent::TokenRefreshed(user));
    }

    pub(crate) fn sign_out(&self) {
        if self.replace(None).is_some() {
            self.emit(AuthEvent::SignedOut);
        }
    }

    fn replace(&self, session: Option<AuthSession>) -> Option<AuthSession> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, session)
    }

    fn emit(&self, event: AuthEvent) {
        // No receivers is fine; nobody is listening yet.
        if self.events.send(event).is_err() {
            tracing::trace!("Auth event dropped without subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserMetadata;

    fn session() -> AuthSession {
        AuthSession {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: i64::MAX,
            user: AuthUser {
                id: UserId::new(),
                email: Some("ada@example.com".to_string()),
                user_metadata: UserMetadata::default(),
            },
        }
    }

    #[test]
    fn require_user_without_session_fails() {
        let context = SessionContext::new();
        assert!(matches!(context.require_user(), Err(Error::AuthRequired)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn subscribers_see_lifecycle_events() {
        let context = SessionContext::new();
        let mut events = context.subscribe();
        let session = session();
        let user = session.user.clone();

        context.sign_in(session);
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedIn(user.clone()));
        assert_eq!(context.current_user(), Some(user));

        context.sign_out();
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedOut);
        assert!(!context.is_signed_in());
    }

    #[test]
    fn clones_share_state() {
        let context = SessionContext::new();
        let clone = context.clone();
        context.sign_in(session());
        assert!(clone.is_signed_in());
    }
}
