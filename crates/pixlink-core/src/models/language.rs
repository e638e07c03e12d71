//! Interface language preference

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported interface languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Uzbek
    #[default]
    Uz,
    /// Russian
    Ru,
    /// English
    En,
}

impl Language {
    pub const ALL: [Self; 3] = [Self::Uz, Self::Ru, Self::En];

    pub const fn code(self) -> &'static str {
        match self {
            Self::Uz => "uz",
            Self::Ru => "ru",
            Self::En => "en",
        }
    }

    /// Language for an ISO 3166 alpha-2 country code.
    pub fn from_country_code(country: &str) -> Self {
        match country.trim().to_ascii_uppercase().as_str() {
            "UZ" => Self::Uz,
            "RU" | "KZ" | "BY" | "TJ" | "KG" => Self::Ru,
            _ => Self::En,
        }
    }

    /// Language for a locale string such as `ru-RU` or `uz_UZ.UTF-8`.
    pub fn from_locale(locale: &str) -> Self {
        let primary = locale
            .split(['-', '_', '.'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "uz" => Self::Uz,
            "ru" => Self::Ru,
            _ => Self::En,
        }
    }

    /// Resolve the active language.
    ///
    /// A saved preference wins, then the detected country, then the locale.
    pub fn resolve(saved: Option<Self>, country: Option<&str>, locale: Option<&str>) -> Self {
        saved
            .or_else(|| country.map(Self::from_country_code))
            .or_else(|| locale.map(Self::from_locale))
            .unwrap_or(Self::En)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uz" => Ok(Self::Uz),
            "ru" => Ok(Self::Ru),
            "en" => Ok(Self::En),
            other => Err(format!("unsupported language '{other}' (expected uz, ru or en)")),
        }
    }
}
