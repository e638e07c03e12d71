//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use pixlink_core::models::Language;
use pixlink_core::util::normalize_text_option;
use pixlink_core::ClientConfig;
use serde::{Deserialize, Serialize};

const CONFIG_DIR_NAME: &str = "pixlink";
const CONFIG_FILE_NAME: &str = "cli-config.json";
pub const PROFILE_ENV_VAR: &str = "PIXLINK_PROFILE";
const DEFAULT_PROFILE: &str = "default";

/// Contents of `cli-config.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CliProfilesConfig {
    pub version: u32,
    pub active_profile: Option<String>,
    pub language: Option<Language>,
    pub profiles: BTreeMap<String, CliProfile>,
}

impl Default for CliProfilesConfig {
    fn default() -> Self {
        Self {
            version: 1,
            active_profile: None,
            language: None,
            profiles: BTreeMap::new(),
        }
    }
}

/// Hosted backend settings; an empty profile selects the local backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CliProfile {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub image_bucket: Option<String>,
}

fn config_dir() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
}

/// Where the local backend keeps its database and image objects.
pub fn data_dir() -> Result<PathBuf, String> {
    dirs::data_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .ok_or_else(|| "Failed to resolve CLI data directory".to_string())
}

fn default_config_path() -> Result<PathBuf, String> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

fn at_path<'a>(
    action: &'static str,
    path: &'a Path,
) -> impl FnOnce(std::io::Error) -> String + 'a {
    move |error| format!("Failed to {action} {}: {error}", path.display())
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    /// A missing file loads as an empty configuration.
    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(error) => return Err(at_path("read config at", path)(error)),
        };
        let config: Self = serde_json::from_str(&raw)
            .map_err(|error| format!("Config at {} is not valid: {error}", path.display()))?;
        Ok(config.tidied())
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(at_path("create directory", parent))?;
        }
        let json = serde_json::to_string_pretty(&self.clone().tidied())
            .map_err(|error| format!("Failed to encode config: {error}"))?;
        std::fs::write(path, json).map_err(at_path("write config at", path))
    }

    /// Flag, then `PIXLINK_PROFILE`, then the saved active profile.
    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        let name = |value: Option<&str>| normalize_text_option(value.map(str::to_string));
        name(explicit)
            .or_else(|| name(std::env::var(PROFILE_ENV_VAR).ok().as_deref()))
            .or_else(|| name(self.active_profile.as_deref()))
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn tidied(mut self) -> Self {
        self.active_profile = normalize_text_option(self.active_profile);
        self.profiles = self
            .profiles
            .into_iter()
            .map(|(name, profile)| (name, profile.tidied()))
            .collect();
        self
    }
}

impl CliProfile {
    /// Backend settings from this profile, with the environment filling gaps.
    pub fn client_config(&self, env: ClientConfig) -> ClientConfig {
        ClientConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            image_bucket: self.image_bucket.clone(),
            ..ClientConfig::default()
        }
        .or(env)
    }

    fn tidied(self) -> Self {
        Self {
            supabase_url: normalize_text_option(self.supabase_url),
            supabase_anon_key: normalize_text_option(self.supabase_anon_key),
            image_bucket: normalize_text_option(self.image_bucket),
        }
    }
}
