//! Hosted Supabase backend.

mod functions;
mod realtime;
mod rest;
mod storage;

use std::sync::Arc;

use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;

pub use functions::EdgeFunctions;
pub use realtime::RealtimeFeed;
pub use rest::PostgrestStore;
pub use storage::SupabaseStorage;

use super::Backend;
use crate::auth::SupabaseAuthClient;
use crate::error::{Error, Result};
use crate::session::SessionContext;
use crate::util::compact_text;

const UNIQUE_VIOLATION_CODE: &str = "23505";

/// Project URL, anon key and the signed-in session, shared by every service.
#[derive(Clone)]
pub struct ApiContext {
    base_url: String,
    anon_key: String,
    client: Client,
    session: SessionContext,
}

impl ApiContext {
    pub fn new(base_url: &str, anon_key: &str, session: SessionContext) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            anon_key: anon_key.trim().to_string(),
            client: Client::builder().build()?,
            session,
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub(crate) const fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn access_token(&self) -> Option<String> {
        self.session.access_token()
    }

    /// Attach the API key and the user's token, or the anon key when signed out.
    pub(crate) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .session
            .access_token()
            .unwrap_or_else(|| self.anon_key.clone());
        request.header("apikey", &self.anon_key).bearer_auth(bearer)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    message: Option<String>,
    error: Option<String>,
    msg: Option<String>,
    details: Option<String>,
}

/// Turn a non-success response into an `Error`, mapping Postgres unique
/// violations to `Error::UniqueViolation`.
pub(crate) async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let parsed = serde_json::from_str::<ApiErrorBody>(&body).ok();
    let message = parsed
        .as_ref()
        .and_then(|payload| {
            payload
                .message
                .clone()
                .or_else(|| payload.msg.clone())
                .or_else(|| payload.error.clone())
                .or_else(|| payload.details.clone())
        })
        .unwrap_or_else(|| compact_text(&body));

    if parsed
        .as_ref()
        .and_then(|payload| payload.code.as_deref())
        .is_some_and(|code| code == UNIQUE_VIOLATION_CODE)
    {
        return Err(Error::UniqueViolation(message));
    }

    if message.is_empty() {
        Err(Error::Backend(format!("HTTP {}", status.as_u16())))
    } else {
        Err(Error::Backend(format!("{message} ({})", status.as_u16())))
    }
}

impl Backend {
    /// Bind every collaborator to the Supabase project at `url`.
    pub fn supabase(url: &str, anon_key: &str, bucket: impl Into<String>) -> Result<Self> {
        let session = SessionContext::new();
        let context = ApiContext::new(url, anon_key, session.clone())?;
        Ok(Self {
            auth: Arc::new(SupabaseAuthClient::new(url, anon_key)?),
            store: Arc::new(PostgrestStore::new(context.clone())),
            storage: Arc::new(SupabaseStorage::new(context.clone())),
            feed: Arc::new(RealtimeFeed::new(context.clone())),
            functions: Arc::new(EdgeFunctions::new(context)),
            session,
            bucket: bucket.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthSession, AuthUser, UserMetadata};
    use crate::models::UserId;

    #[test]
    fn endpoint_joins_paths() {
        let context =
            ApiContext::new("https://demo.supabase.co/", "anon", SessionContext::new()).unwrap();
        assert_eq!(
            context.endpoint("/rest/v1/images"),
            "https://demo.supabase.co/rest/v1/images"
        );
    }

    #[test]
    fn signed_in_requests_use_the_session_token() {
        let session = SessionContext::with_session(AuthSession {
            access_token: "user-token".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: i64::MAX,
            user: AuthUser {
                id: UserId::new(),
                email: None,
                user_metadata: UserMetadata::default(),
            },
        });
        let context = ApiContext::new("https://demo.supabase.co", "anon", session).unwrap();
        let request = context
            .authorize(context.client().get(context.endpoint("rest/v1/images")))
            .build()
            .unwrap();
        assert_eq!(request.headers()["apikey"], "anon");
        assert_eq!(request.headers()["authorization"], "Bearer user-token");
    }
}
