//! Local email/password accounts.

use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use libsql::params;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::connection::Database;
use crate::auth::{
    validate_credentials, AuthError, AuthProvider, AuthResult, AuthSession, AuthUser,
    OAuthProvider, SignUpOutcome, SignUpRequest, UserMetadata,
};
use crate::models::UserId;
use crate::util::{normalize_text_option, unix_timestamp_now};

const SESSION_TTL_SECONDS: i64 = 60 * 60;

/// Accounts stored next to the local records, passwords hashed with Argon2.
#[derive(Clone)]
pub struct LocalAuth {
    db: Arc<Mutex<Database>>,
}

fn storage_error(error: impl std::fmt::Display) -> AuthError {
    AuthError::Api(format!("local account store failed: {error}"))
}

impl LocalAuth {
    pub const fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    async fn issue_session(&self, user: AuthUser) -> AuthResult<AuthSession> {
        let session = AuthSession {
            access_token: Uuid::new_v4().simple().to_string(),
            refresh_token: Uuid::new_v4().simple().to_string(),
            expires_at: unix_timestamp_now() + SESSION_TTL_SECONDS,
            user,
        };
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "INSERT INTO user_sessions (refresh_token, access_token, user_id, expires_at)
                 VALUES (?, ?, ?, ?)",
                params![
                    session.refresh_token.as_str(),
                    session.access_token.as_str(),
                    session.user.id.as_str(),
                    session.expires_at
                ],
            )
            .await
            .map_err(storage_error)?;
        Ok(session)
    }

    async fn load_user(&self, id: &str) -> AuthResult<Option<(AuthUser, String)>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT id, email, username, full_name, password_hash FROM users WHERE id = ? OR email = ? COLLATE NOCASE",
                [id, id],
            )
            .await
            .map_err(storage_error)?;
        let Some(row) = rows.next().await.map_err(storage_error)? else {
            return Ok(None);
        };

        let raw_id: String = row.get(0).map_err(storage_error)?;
        let user = AuthUser {
            id: raw_id.parse::<UserId>().map_err(storage_error)?,
            email: row.get::<Option<String>>(1).map_err(storage_error)?,
            user_metadata: UserMetadata {
                username: row.get::<Option<String>>(2).map_err(storage_error)?,
                full_name: row.get::<Option<String>>(3).map_err(storage_error)?,
            },
        };
        let hash: String = row.get(4).map_err(storage_error)?;
        Ok(Some((user, hash)))
    }
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn sign_up(&self, request: &SignUpRequest) -> AuthResult<SignUpOutcome> {
        validate_credentials(&request.email, &request.password)?;

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(request.password.as_bytes(), &salt)
            .map_err(storage_error)?
            .to_string();

        let user = AuthUser {
            id: UserId::new(),
            email: Some(request.email.trim().to_string()),
            user_metadata: UserMetadata {
                username: normalize_text_option(Some(request.username.clone())),
                full_name: normalize_text_option(Some(request.full_name.clone())),
            },
        };

        {
            let db = self.db.lock().await;
            let inserted = db
                .connection()
                .execute(
                    "INSERT INTO users (id, email, password_hash, username, full_name, created_at)
                     VALUES (?, ?, ?, ?, ?, ?)",
                    params![
                        user.id.as_str(),
                        request.email.trim(),
                        password_hash.as_str(),
                        user.user_metadata.username.as_deref(),
                        user.user_metadata.full_name.as_deref(),
                        unix_timestamp_now()
                    ],
                )
                .await;
            if let Err(error) = inserted {
                if error.to_string().contains("UNIQUE constraint failed") {
                    return Err(AuthError::Api("User already registered".to_string()));
                }
                return Err(storage_error(error));
            }
        }

        tracing::info!(user_id = %user.id, "Registered local account");
        let session = self.issue_session(user).await?;
        Ok(SignUpOutcome::SignedIn(session))
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;

        let (user, hash) = self
            .load_user(email.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let parsed_hash = PasswordHash::new(&hash).map_err(storage_error)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)?;

        self.issue_session(user).await
    }

    fn oauth_authorize_url(
        &self,
        _provider: OAuthProvider,
        _redirect_to: Option<&str>,
    ) -> AuthResult<String> {
        Err(AuthError::Unsupported("OAuth sign-in needs a hosted backend"))
    }

    async fn complete_oauth(&self, _redirect_url: &str) -> AuthResult<AuthSession> {
        Err(AuthError::Unsupported("OAuth sign-in needs a hosted backend"))
    }

    async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        let user_id = {
            let db = self.db.lock().await;
            let conn = db.connection();
            let mut rows = conn
                .query(
                    "SELECT user_id FROM user_sessions WHERE refresh_token = ?",
                    [refresh_token],
                )
                .await
                .map_err(storage_error)?;
            let Some(row) = rows.next().await.map_err(storage_error)? else {
                return Err(AuthError::Api("Invalid refresh token".to_string()));
            };
            let user_id: String = row.get(0).map_err(storage_error)?;
            conn.execute(
                "DELETE FROM user_sessions WHERE refresh_token = ?",
                [refresh_token],
            )
            .await
            .map_err(storage_error)?;
            user_id
        };

        let (user, _) = self
            .load_user(&user_id)
            .await?
            .ok_or_else(|| AuthError::Api("Account no longer exists".to_string()))?;
        self.issue_session(user).await
    }

    async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "DELETE FROM user_sessions WHERE access_token = ?",
                [access_token],
            )
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}
