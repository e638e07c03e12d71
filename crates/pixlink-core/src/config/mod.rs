//! Client configuration.
//!
//! A `ClientConfig` says which backend to talk to. When both Supabase values
//! are present the hosted backend is used; otherwise the client runs against a
//! local libSQL database and a directory of stored objects.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::auth::resolve_optional_supabase_config;
use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_IMAGE_BUCKET: &str = "images";

pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";
pub const ENV_DB_PATH: &str = "PIXLINK_DB_PATH";
pub const ENV_STORAGE_DIR: &str = "PIXLINK_STORAGE_DIR";
pub const ENV_IMAGE_BUCKET: &str = "PIXLINK_IMAGE_BUCKET";

const LOCAL_DB_FILE: &str = "pixlink.db";
const LOCAL_STORAGE_DIR: &str = "objects";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    #[serde(default)]
    pub image_bucket: Option<String>,
}

/// Where the client's data lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendTarget {
    Hosted {
        url: String,
        anon_key: String,
    },
    Local {
        db_path: PathBuf,
        storage_dir: PathBuf,
    },
}

impl ClientConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            supabase_url: normalize_text_option(lookup(ENV_SUPABASE_URL)),
            supabase_anon_key: normalize_text_option(lookup(ENV_SUPABASE_ANON_KEY)),
            db_path: normalize_text_option(lookup(ENV_DB_PATH)).map(PathBuf::from),
            storage_dir: normalize_text_option(lookup(ENV_STORAGE_DIR)).map(PathBuf::from),
            image_bucket: normalize_text_option(lookup(ENV_IMAGE_BUCKET)),
        }
    }

    /// Fill unset fields from `fallback`; values already set win.
    #[must_use]
    pub fn or(self, fallback: Self) -> Self {
        Self {
            supabase_url: self.supabase_url.or(fallback.supabase_url),
            supabase_anon_key: self.supabase_anon_key.or(fallback.supabase_anon_key),
            db_path: self.db_path.or(fallback.db_path),
            storage_dir: self.storage_dir.or(fallback.storage_dir),
            image_bucket: self.image_bucket.or(fallback.image_bucket),
        }
    }

    pub fn image_bucket(&self) -> &str {
        self.image_bucket
            .as_deref()
            .map(str::trim)
            .filter(|bucket| !bucket.is_empty())
            .unwrap_or(DEFAULT_IMAGE_BUCKET)
    }

    pub fn is_hosted(&self) -> bool {
        normalize_text_option(self.supabase_url.clone()).is_some()
            && normalize_text_option(self.supabase_anon_key.clone()).is_some()
    }

    /// Decide the backend, using `data_dir` for local paths left unset.
    pub fn target(&self, data_dir: &Path) -> Result<BackendTarget> {
        let hosted = resolve_optional_supabase_config(
            self.supabase_url.clone(),
            self.supabase_anon_key.clone(),
        )?;

        if let Some((url, anon_key)) = hosted {
            if !is_http_url(&url) {
                return Err(Error::Backend(
                    "Supabase URL must include http:// or https://".to_string(),
                ));
            }
            return Ok(BackendTarget::Hosted {
                url: url.trim_end_matches('/').to_string(),
                anon_key,
            });
        }

        Ok(BackendTarget::Local {
            db_path: self
                .db_path
                .clone()
                .unwrap_or_else(|| data_dir.join(LOCAL_DB_FILE)),
            storage_dir: self
                .storage_dir
                .clone()
                .unwrap_or_else(|| data_dir.join(LOCAL_STORAGE_DIR)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value).to_string())
        }
    }

    #[test]
    fn env_values_select_hosted_backend() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_SUPABASE_URL, " https://demo.supabase.co/ "),
            (ENV_SUPABASE_ANON_KEY, "anon"),
        ]));
        assert!(config.is_hosted());
        assert_eq!(
            config.target(Path::new("/data")).unwrap(),
            BackendTarget::Hosted {
                url: "https://demo.supabase.co".to_string(),
                anon_key: "anon".to_string(),
            }
        );
    }

    #[test]
    fn empty_env_falls_back_to_local_paths() {
        let config = ClientConfig::from_lookup(lookup(&[(ENV_SUPABASE_URL, "   ")]));
        assert_eq!(
            config.target(Path::new("/data")).unwrap(),
            BackendTarget::Local {
                db_path: PathBuf::from("/data/pixlink.db"),
                storage_dir: PathBuf::from("/data/objects"),
            }
        );
        assert_eq!(config.image_bucket(), DEFAULT_IMAGE_BUCKET);
    }

    #[test]
    fn partial_supabase_config_is_an_error() {
        let config = ClientConfig::from_lookup(lookup(&[(ENV_SUPABASE_ANON_KEY, "anon")]));
        assert!(config.target(Path::new("/data")).is_err());
    }

    #[test]
    fn set_values_win_over_fallback() {
        let primary = ClientConfig {
            image_bucket: Some("photos".to_string()),
            ..Default::default()
        };
        let fallback = ClientConfig {
            image_bucket: Some("images".to_string()),
            db_path: Some(PathBuf::from("/tmp/p.db")),
            ..Default::default()
        };
        let merged = primary.or(fallback);
        assert_eq!(merged.image_bucket(), "photos");
        assert_eq!(merged.db_path, Some(PathBuf::from("/tmp/p.db")));
    }

    #[test]
    fn config_json_rejects_unknown_fields() {
        let error = serde_json::from_str::<ClientConfig>(r#"{"api_base_url":"x"}"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }
}
