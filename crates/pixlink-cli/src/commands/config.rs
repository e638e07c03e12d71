use std::env;

use pixlink_core::config::{
    BackendTarget, ENV_IMAGE_BUCKET, ENV_SUPABASE_ANON_KEY, ENV_SUPABASE_URL,
};
use pixlink_core::util::{is_http_url, normalize_text_option};
use pixlink_core::ClientConfig;

use crate::cli::ConfigCommands;
use crate::commands::common::GlobalOptions;
use crate::config_profiles::{data_dir, CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, options: &GlobalOptions) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            supabase_url,
            supabase_anon_key,
            image_bucket,
            no_activate,
        } => run_config_init(
            options.profile.as_deref(),
            supabase_url,
            supabase_anon_key,
            image_bucket,
            no_activate,
        ),
        ConfigCommands::Show => run_config_show(options),
    }
}

#[allow(clippy::needless_pass_by_value)]
pub fn run_config_init(
    profile_name: Option<&str>,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    image_bucket: Option<String>,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile(
        &existing,
        CliProfile {
            supabase_url,
            supabase_anon_key,
            image_bucket,
        },
        |key| env::var(key).ok(),
    );
    validate_profile(&merged)?;
    *config.profile_mut_or_default(&profile_name) = merged.clone();

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    if merged.supabase_url.is_some() && merged.supabase_anon_key.is_some() {
        println!(
            "Profile '{profile_name}' uses the hosted backend. Run `pixlink auth login --email <email> --password <password>`."
        );
    } else {
        println!("Profile '{profile_name}' runs against a local database.");
    }
    Ok(())
}

/// Explicit values win, then environment variables, then what was saved.
pub fn merge_profile(
    existing: &CliProfile,
    explicit: CliProfile,
    lookup: impl Fn(&str) -> Option<String>,
) -> CliProfile {
    CliProfile {
        supabase_url: normalize_text_option(explicit.supabase_url)
            .or_else(|| normalize_text_option(lookup(ENV_SUPABASE_URL)))
            .or_else(|| normalize_text_option(existing.supabase_url.clone()))
            .map(|url| url.trim_end_matches('/').to_string()),
        supabase_anon_key: normalize_text_option(explicit.supabase_anon_key)
            .or_else(|| normalize_text_option(lookup(ENV_SUPABASE_ANON_KEY)))
            .or_else(|| normalize_text_option(existing.supabase_anon_key.clone())),
        image_bucket: normalize_text_option(explicit.image_bucket)
            .or_else(|| normalize_text_option(lookup(ENV_IMAGE_BUCKET)))
            .or_else(|| normalize_text_option(existing.image_bucket.clone())),
    }
}

pub fn validate_profile(profile: &CliProfile) -> Result<(), CliError> {
    if let Some(url) = profile.supabase_url.as_deref() {
        if !is_http_url(url) {
            return Err(CliError::Config(
                "supabase_url must include http:// or https://".to_string(),
            ));
        }
    }
    if profile.supabase_url.is_some() != profile.supabase_anon_key.is_some() {
        return Err(CliError::Config(
            "supabase_url and supabase_anon_key must be set together".to_string(),
        ));
    }
    Ok(())
}

fn run_config_show(options: &GlobalOptions) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(options.profile.as_deref());
    let client_config = ClientConfig {
        db_path: options.db_path.clone(),
        storage_dir: options.storage_dir.clone(),
        ..ClientConfig::default()
    }
    .or(config
        .profile(&profile_name)
        .cloned()
        .unwrap_or_default()
        .client_config(ClientConfig::from_env()));
    let data_dir = data_dir().map_err(CliError::Config)?;

    println!("profile:  {profile_name}");
    match client_config.target(&data_dir)? {
        BackendTarget::Hosted { url, .. } => println!("backend:  hosted ({url})"),
        BackendTarget::Local {
            db_path,
            storage_dir,
        } => {
            println!("backend:  local");
            println!("database: {}", db_path.display());
            println!("objects:  {}", storage_dir.display());
        }
    }
    println!("bucket:   {}", client_config.image_bucket());
    if let Some(language) = config.language {
        println!("language: {language}");
    }
    Ok(())
}
