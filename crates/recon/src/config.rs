use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ImportError;

/// Store-config key whose value is a locale code and goes through the
/// locale resolver before being written.
pub const DEFAULT_LOCALE_KEY: &str = "general/locale/code";

/// Engine configuration, loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    #[serde(default = "default_locale_key")]
    pub locale_key: String,
    /// Locale code → `user/repo/branch` source of its language pack.
    #[serde(default = "default_language_packs")]
    pub language_packs: BTreeMap<String, String>,
}

impl ImportConfig {
    pub fn from_toml(input: &str) -> Result<Self, ImportError> {
        toml::from_str(input).map_err(|e| ImportError::ConfigParse(e.to_string()))
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            locale_key: default_locale_key(),
            language_packs: default_language_packs(),
        }
    }
}

fn default_locale_key() -> String {
    DEFAULT_LOCALE_KEY.to_string()
}

fn default_language_packs() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "de_DE".to_string(),
            "riconeitzel/German_LocalePack_de_DE/preview".to_string(),
        ),
        (
            "fr_FR".to_string(),
            "MaWoScha/German_LocalePack_fr_FR/master".to_string(),
        ),
    ])
}
