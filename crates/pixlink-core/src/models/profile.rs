//! Profile model and username rules

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::UserId;
use crate::error::ValidationError;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 20;

/// Public profile, 1:1 with an auth user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Same id as the auth user
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Fields for a lazily created profile row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProfile {
    pub id: UserId,
    pub username: String,
    pub full_name: Option<String>,
}

/// Editable profile fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    pub username: String,
    pub full_name: Option<String>,
}

impl ProfileUpdate {
    /// Validate raw form input and normalize it for persistence.
    ///
    /// The username is stored trimmed and lower-cased; an empty full name is
    /// stored as `None`.
    pub fn from_form(username: &str, full_name: &str) -> Result<Self, ValidationError> {
        validate_username(username)?;
        let full_name = full_name.trim();
        Ok(Self {
            username: username.trim().to_lowercase(),
            full_name: (!full_name.is_empty()).then(|| full_name.to_string()),
        })
    }
}

fn username_charset() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("Invalid regex"))
}

fn username_replacements() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_]").expect("Invalid regex"))
}

/// Check a username against the public profile rules.
///
/// Checks run in order: non-empty, 3–20 characters, `[A-Za-z0-9_]+`.
///
/// ```
/// use pixlink_core::models::validate_username;
///
/// assert!(validate_username("pixel_fan_42").is_ok());
/// assert!(validate_username("no spaces").is_err());
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        return Err(ValidationError::UsernameEmpty);
    }
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(ValidationError::UsernameLength);
    }
    if !username_charset().is_match(username) {
        return Err(ValidationError::UsernameCharset);
    }
    Ok(())
}

/// Username given to a profile created on first view.
///
/// Uses the email local-part with every character outside `[A-Za-z0-9_]`
/// replaced by `_`, or `user_` plus the first 8 characters of the user id.
pub fn default_username(email: Option<&str>, user_id: &UserId) -> String {
    let local_part = email
        .and_then(|email| email.split('@').next())
        .filter(|local| !local.is_empty());
    match local_part {
        Some(local) => username_replacements().replace_all(local, "_").into_owned(),
        None => {
            let id = user_id.as_str();
            format!("user_{}", id.chars().take(8).collect::<String>())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn accepts_valid_usernames() {
        for name in ["abc", "A_b_9", "twenty_characters_xx", "___"] {
            assert_eq!(validate_username(name), Ok(()), "{name}");
        }
    }

    #[test]
    fn rejects_bad_lengths() {
        assert_eq!(validate_username("ab"), Err(ValidationError::UsernameLength));
        assert_eq!(
            validate_username("twenty_one_characters"),
            Err(ValidationError::UsernameLength)
        );
    }

    #[test]
    fn rejects_bad_characters() {
        for name in ["with space", "dash-ed", "dot.ted", "emoji😀x", "ünï"] {
            assert_eq!(
                validate_username(name),
                Err(ValidationError::UsernameCharset),
                "{name}"
            );
        }
    }

    #[test]
    fn rejects_empty_before_length() {
        assert_eq!(validate_username(""), Err(ValidationError::UsernameEmpty));
        assert_eq!(validate_username("   "), Err(ValidationError::UsernameEmpty));
    }

    #[test]
    fn form_normalizes_fields() {
        let update = ProfileUpdate::from_form("Pixel_Fan", "  Ada Lovelace ").unwrap();
        assert_eq!(update.username, "pixel_fan");
        assert_eq!(update.full_name.as_deref(), Some("Ada Lovelace"));

        let update = ProfileUpdate::from_form("pixel_fan", "   ").unwrap();
        assert_eq!(update.full_name, None);
    }

    #[test]
    fn default_username_from_email() {
        let id = UserId::new();
        assert_eq!(
            default_username(Some("jane.doe+art@example.com"), &id),
            "jane_doe_art"
        );
    }

    #[test]
    fn default_username_falls_back_to_user_id() {
        let id: UserId = "0190f0a4-1234-7abc-8def-0123456789ab".parse().unwrap();
        assert_eq!(default_username(None, &id), "user_0190f0a4");
        assert_eq!(default_username(Some("@example.com"), &id), "user_0190f0a4");
    }
}
