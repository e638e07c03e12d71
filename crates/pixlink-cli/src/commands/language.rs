use pixlink_core::models::Language;
use pixlink_core::util::normalize_text_option;

use crate::cli::LanguageCommands;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

/// ISO 3166 country code supplied by the environment
pub const COUNTRY_ENV_VAR: &str = "PIXLINK_COUNTRY";
const LOCALE_ENV_VARS: [&str; 3] = ["LC_ALL", "LC_MESSAGES", "LANG"];

pub fn run_language(command: LanguageCommands) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    match command {
        LanguageCommands::Show => {
            let detected = remember_language(&mut config, |key| std::env::var(key).ok());
            if detected {
                config.save().map_err(CliError::Config)?;
            }
            let source = if detected { "detected" } else { "saved" };
            if let Some(language) = config.language {
                println!("{language} ({source})");
            }
        }
        LanguageCommands::Set { code } => {
            let language = code.parse::<Language>().map_err(CliError::Config)?;
            config.language = Some(language);
            config.save().map_err(CliError::Config)?;
            println!("Language set to {language}");
        }
    }
    Ok(())
}

/// Store the detected language when none is saved yet.
///
/// Returns whether the configuration changed.
pub fn remember_language(
    config: &mut CliProfilesConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> bool {
    if config.language.is_some() {
        return false;
    }
    config.language = Some(resolve_language(None, lookup));
    true
}

/// Saved choice first, then the country variable, then the locale.
pub fn resolve_language(
    saved: Option<Language>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Language {
    let country = normalize_text_option(lookup(COUNTRY_ENV_VAR));
    let locale = LOCALE_ENV_VARS
        .iter()
        .find_map(|key| {
            normalize_text_option(lookup(key)).filter(|locale| locale != "C" && locale != "POSIX")
        });
    Language::resolve(saved, country.as_deref(), locale.as_deref())
}
