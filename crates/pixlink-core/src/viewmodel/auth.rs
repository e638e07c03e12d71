//! Auth session bridge.

use std::sync::Arc;

use crate::auth::{
    AuthError, AuthProvider, AuthResult, AuthSession, AuthUser, OAuthProvider, SessionPersistence,
    SignUpOutcome, SignUpRequest,
};
use crate::backend::Backend;
use crate::session::SessionContext;

/// Connects the backend's auth provider to the session context and a
/// persistent session store.
#[derive(Clone)]
pub struct AuthBridge<S: SessionPersistence> {
    auth: Arc<dyn AuthProvider>,
    session: SessionContext,
    store: S,
}

impl<S: SessionPersistence> AuthBridge<S> {
    pub fn new(backend: &Backend, store: S) -> Self {
        Self {
            auth: Arc::clone(&backend.auth),
            session: backend.session.clone(),
            store,
        }
    }

    pub const fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.session.current_user()
    }

    /// Load the persisted session, refreshing it when expired.
    ///
    /// A session that can no longer be refreshed is cleared and treated as
    /// signed out.
    pub async fn restore(&self) -> AuthResult<Option<AuthUser>> {
        let Some(stored) = self.store.load_session()? else {
            return Ok(None);
        };

        if !stored.is_expired() {
            let user = stored.user.clone();
            self.session.sign_in(stored);
            return Ok(Some(user));
        }

        match self.auth.refresh_session(&stored.refresh_token).await {
            Ok(session) => {
                self.store.save_session(&session)?;
                let user = session.user.clone();
                self.session.sign_in(session);
                Ok(Some(user))
            }
            Err(error) => {
                tracing::warn!("Stored session could not be refreshed: {error}");
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    pub async fn sign_up(&self, request: &SignUpRequest) -> AuthResult<SignUpOutcome> {
        let outcome = self.auth.sign_up(request).await?;
        if let SignUpOutcome::SignedIn(session) = &outcome {
            self.accept(session.clone())?;
        }
        Ok(outcome)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthUser> {
        let session = self.auth.sign_in(email, password).await?;
        self.accept(session)
    }

    pub fn oauth_url(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
    ) -> AuthResult<String> {
        self.auth.oauth_authorize_url(provider, redirect_to)
    }

    pub async fn complete_oauth(&self, redirect_url: &str) -> AuthResult<AuthUser> {
        let session = self.auth.complete_oauth(redirect_url).await?;
        self.accept(session)
    }

    /// Exchange the current refresh token for a new session.
    pub async fn refresh(&self) -> AuthResult<AuthUser> {
        let current = self
            .session
            .current_session()
            .ok_or_else(|| AuthError::Api("No active session".to_string()))?;
        let session = self.auth.refresh_session(&current.refresh_token).await?;
        self.store.save_session(&session)?;
        let user = session.user.clone();
        self.session.refresh(session);
        Ok(user)
    }

    /// Sign out remotely when possible, then forget the session locally.
    pub async fn sign_out(&self) -> AuthResult<()> {
        if let Some(token) = self.session.access_token() {
            if let Err(error) = self.auth.sign_out(&token).await {
                tracing::warn!("Remote sign-out failed: {error}");
            }
        }
        self.store.clear_session()?;
        self.session.sign_out();
        Ok(())
    }

    fn accept(&self, session: AuthSession) -> AuthResult<AuthUser> {
        self.store.save_session(&session)?;
        let user = session.user.clone();
        tracing::info!("Signed in as {}", user.email.as_deref().unwrap_or("<no email>"));
        self.session.sign_in(session);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemorySessionStore;
    use crate::session::AuthEvent;
    use crate::viewmodel::test_support::{local_backend, sign_up_request};

    #[tokio::test(flavor = "multi_thread")]
    async fn sign_in_publishes_and_persists() {
        let (backend, _dir) = local_backend().await;
        let store = MemorySessionStore::default();
        let bridge = AuthBridge::new(&backend, store.clone());
        let mut events = bridge.session().subscribe();

        let SignUpOutcome::SignedIn(_) = bridge.sign_up(&sign_up_request("ada")).await.unwrap()
        else {
            panic!("local sign-up signs in");
        };
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedIn(_)));
        assert!(store.load_session().unwrap().is_some());

        bridge.sign_out().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedOut);
        assert!(store.load_session().unwrap().is_none());
        assert!(!backend.session.is_signed_in());

        let user = bridge
            .sign_in("ada@example.com", "correct horse")
            .await
            .unwrap();
        assert_eq!(backend.session.user_id(), Some(user.id));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restore_uses_stored_session() {
        let (backend, _dir) = local_backend().await;
        let store = MemorySessionStore::default();
        AuthBridge::new(&backend, store.clone())
            .sign_up(&sign_up_request("ada"))
            .await
            .unwrap();

        let (fresh, _dir2) = local_backend().await;
        let bridge = AuthBridge::new(&fresh, store);
        let user = bridge.restore().await.unwrap().unwrap();
        assert_eq!(fresh.session.user_id(), Some(user.id));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn expired_session_that_cannot_refresh_is_cleared() {
        let (backend, _dir) = local_backend().await;
        let store = MemorySessionStore::default();
        store
            .save_session(&AuthSession {
                access_token: "stale".to_string(),
                refresh_token: "unknown".to_string(),
                expires_at: 0,
                user: AuthUser {
                    id: crate::models::UserId::new(),
                    email: None,
                    user_metadata: crate::auth::UserMetadata::default(),
                },
            })
            .unwrap();

        let bridge = AuthBridge::new(&backend, store.clone());
        assert_eq!(bridge.restore().await.unwrap(), None);
        assert!(store.load_session().unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refresh_rotates_tokens() {
        let (backend, _dir) = local_backend().await;
        let bridge = AuthBridge::new(&backend, MemorySessionStore::default());
        bridge.sign_up(&sign_up_request("ada")).await.unwrap();
        let before = backend.session.current_session().unwrap();

        bridge.refresh().await.unwrap();
        let after = backend.session.current_session().unwrap();
        assert_ne!(before.refresh_token, after.refresh_token);
        assert_eq!(before.user.id, after.user.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn oauth_is_unavailable_locally() {
        let (backend, _dir) = local_backend().await;
        let bridge = AuthBridge::new(&backend, MemorySessionStore::default());
        assert!(matches!(
            bridge.oauth_url(OAuthProvider::Github, None),
            Err(AuthError::Unsupported(_))
        ));
    }
}
