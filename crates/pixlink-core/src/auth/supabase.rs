//! Supabase GoTrue client.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::{
    validate_credentials, AuthError, AuthProvider, AuthResult, AuthSession, AuthUser,
    OAuthProvider, SignUpOutcome, SignUpRequest, UserMetadata,
};
use crate::models::UserId;
use crate::util::{normalize_text_option, unix_timestamp_now};

#[derive(Clone)]
pub struct SupabaseAuthClient {
    auth_url: String,
    anon_key: String,
    client: Client,
}

impl SupabaseAuthClient {
    pub fn new(url: impl AsRef<str>, anon_key: impl Into<String>) -> AuthResult<Self> {
        let auth_url = normalize_auth_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Supabase anon key must not be empty",
            ));
        }

        Ok(Self {
            auth_url,
            anon_key,
            client: Client::builder().build()?,
        })
    }

    /// Fetch the user behind an access token.
    pub async fn fetch_user(&self, access_token: &str) -> AuthResult<AuthUser> {
        let request = self
            .client
            .get(format!("{}/user", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);
        let user: SupabaseUser = ensure_success(request.send().await?).await?.json().await?;
        Ok(user.into())
    }

    fn public_request(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    async fn exchange(&self, request: RequestBuilder) -> AuthResult<SupabaseAuthResponse> {
        let response = ensure_success(self.public_request(request).send().await?).await?;
        Ok(response.json().await?)
    }

    /// `POST /token` for grant types that always yield a session.
    async fn grant(
        &self,
        grant_type: &str,
        payload: serde_json::Value,
    ) -> AuthResult<AuthSession> {
        let request = self
            .client
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", grant_type)])
            .json(&payload);
        self.exchange(request).await?.into_session()?.ok_or_else(|| {
            AuthError::Api(format!("No session returned for the {grant_type} grant"))
        })
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuthClient {
    async fn sign_up(&self, request: &SignUpRequest) -> AuthResult<SignUpOutcome> {
        validate_credentials(&request.email, &request.password)?;

        let payload = serde_json::json!({
            "email": request.email.trim(),
            "password": request.password,
            "data": {
                "username": request.username.trim(),
                "full_name": request.full_name.trim(),
            },
        });
        let signup = self.client.post(format!("{}/signup", self.auth_url));
        match self.exchange(signup.json(&payload)).await?.into_session()? {
            Some(session) => Ok(SignUpOutcome::SignedIn(session)),
            None => Ok(SignUpOutcome::ConfirmationRequired),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;

        self.grant(
            "password",
            serde_json::json!({ "email": email.trim(), "password": password }),
        )
        .await
    }

    fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
    ) -> AuthResult<String> {
        let mut url = format!("{}/authorize?provider={}", self.auth_url, provider.as_str());
        if let Some(redirect_to) = normalize_text_option(redirect_to.map(str::to_string)) {
            url.push_str("&redirect_to=");
            url.push_str(&urlencoding::encode(&redirect_to));
        }
        Ok(url)
    }

    async fn complete_oauth(&self, redirect_url: &str) -> AuthResult<AuthSession> {
        let tokens = parse_redirect_tokens(redirect_url)?;
        let user = self.fetch_user(&tokens.access_token).await?;
        Ok(AuthSession {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.expires_at,
            user,
        })
    }

    async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }

        self.grant(
            "refresh_token",
            serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
    }

    async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let request = self
            .client
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);

        let response = request.send().await?;
        // An already revoked token still counts as signed out.
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        ensure_success(response).await.map(drop)
    }
}

pub fn normalize_auth_url(url: &str) -> AuthResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must not be empty",
        ));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(AuthError::InvalidConfiguration(
            "Supabase URL must include http:// or https://",
        ));
    }
    if trimmed.ends_with("/auth/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/auth/v1"))
    }
}

pub fn resolve_optional_supabase_config(
    url: Option<String>,
    anon_key: Option<String>,
) -> AuthResult<Option<(String, String)>> {
    let url = normalize_text_option(url);
    let anon_key = normalize_text_option(anon_key);

    match (url, anon_key) {
        (None, None) => Ok(None),
        (Some(url), Some(anon_key)) => Ok(Some((url, anon_key))),
        _ => Err(AuthError::NotConfigured),
    }
}

#[derive(Debug, PartialEq, Eq)]
struct RedirectTokens {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
}

/// Read the session tokens GoTrue appends to the OAuth redirect.
///
/// Tokens arrive in the fragment; a query string is accepted as well.
fn parse_redirect_tokens(redirect_url: &str) -> AuthResult<RedirectTokens> {
    let params = redirect_url
        .split_once('#')
        .map(|(_, fragment)| fragment)
        .or_else(|| redirect_url.split_once('?').map(|(_, query)| query))
        .ok_or(AuthError::Api(
            "Redirect URL does not carry session tokens".to_string(),
        ))?;

    let mut access_token = None;
    let mut refresh_token = None;
    let mut expires_at = None;
    let mut expires_in = None;
    let mut error_description = None;

    for pair in params.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = urlencoding::decode(value)
            .map(std::borrow::Cow::into_owned)
            .unwrap_or_else(|_| value.to_string());
        match key {
            "access_token" => access_token = Some(value),
            "refresh_token" => refresh_token = Some(value),
            "expires_at" => expires_at = value.parse::<i64>().ok(),
            "expires_in" => expires_in = value.parse::<i64>().ok(),
            "error_description" => error_description = Some(value.replace('+', " ")),
            _ => {}
        }
    }

    if let Some(description) = error_description {
        return Err(AuthError::Api(description));
    }

    let expires_at = expires_at
        .or_else(|| expires_in.map(|seconds| unix_timestamp_now().saturating_add(seconds)));
    match (access_token, refresh_token, expires_at) {
        (Some(access_token), Some(refresh_token), Some(expires_at)) => Ok(RedirectTokens {
            access_token,
            refresh_token,
            expires_at,
        }),
        _ => Err(AuthError::Api(
            "Redirect URL did not include enough session fields".to_string(),
        )),
    }
}

/// GoTrue returns the session either inline or under `session`.
#[derive(Debug, Default, Deserialize)]
struct SessionFields {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<SupabaseUser>,
}

impl SessionFields {
    fn or(self, other: Self) -> Self {
        Self {
            access_token: self.access_token.or(other.access_token),
            refresh_token: self.refresh_token.or(other.refresh_token),
            expires_at: self.expires_at.or(other.expires_at),
            expires_in: self.expires_in.or(other.expires_in),
            user: self.user.or(other.user),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseAuthResponse {
    #[serde(flatten)]
    inline: SessionFields,
    #[serde(default)]
    session: Option<SessionFields>,
}

impl SupabaseAuthResponse {
    /// `Ok(None)` when GoTrue answered without any tokens, as it does while
    /// an email confirmation is pending.
    fn into_session(self) -> AuthResult<Option<AuthSession>> {
        let fields = self.inline.or(self.session.unwrap_or_default());
        let expires_at = fields.expires_at.or_else(|| {
            fields
                .expires_in
                .map(|seconds| unix_timestamp_now().saturating_add(seconds))
        });

        match (fields.access_token, fields.refresh_token, expires_at, fields.user) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(Some(AuthSession {
                    access_token,
                    refresh_token,
                    expires_at,
                    user: user.into(),
                }))
            }
            (None, None, None, _) => Ok(None),
            _ => Err(AuthError::Api(
                "GoTrue response is missing session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: UserId,
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<UserMetadata>,
}

impl From<SupabaseUser> for AuthUser {
    fn from(user: SupabaseUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
            user_metadata: user.user_metadata.unwrap_or_default(),
        }
    }
}

async fn ensure_success(response: Response) -> AuthResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::BAD_REQUEST && body.contains("invalid_grant") {
        return Err(AuthError::InvalidCredentials);
    }
    Err(AuthError::Api(describe_failure(status, &body)))
}

/// Pick the most specific message GoTrue put in an error body.
fn describe_failure(status: StatusCode, body: &str) -> String {
    const MESSAGE_KEYS: [&str; 4] = ["message", "msg", "error_description", "error"];

    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|value| {
            MESSAGE_KEYS
                .iter()
                .find_map(|key| value.get(*key).and_then(serde_json::Value::as_str))
        })
        .unwrap_or(body)
        .trim();

    if message.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{message} ({})", status.as_u16())
    }
}
