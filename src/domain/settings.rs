use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::feed::DEFAULT_REFRESH_INTERVAL_MINUTES;
use crate::store::{Collection, Record, SINGLETON_KEY};

pub const DEFAULT_MAX_ARTICLES_PER_FEED: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

/// Chat-completion provider used by the translation and summary features.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiProviderConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl fmt::Debug for AiProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiProviderConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .finish()
    }
}

/// Singleton settings record, edited by the UI and read by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub theme: Theme,
    pub default_refresh_interval_minutes: u32,
    pub max_articles_per_feed: usize,
    pub notifications_enabled: bool,
    pub background_sync_enabled: bool,
    pub ai_provider: AiProviderConfig,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            default_refresh_interval_minutes: DEFAULT_REFRESH_INTERVAL_MINUTES,
            max_articles_per_feed: DEFAULT_MAX_ARTICLES_PER_FEED,
            notifications_enabled: false,
            background_sync_enabled: true,
            ai_provider: AiProviderConfig::default(),
        }
    }
}

impl Record for UserSettings {
    const COLLECTION: Collection = Collection::Settings;

    fn key(&self) -> String {
        SINGLETON_KEY.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_document_uses_defaults() {
        let settings: UserSettings = serde_json::from_str(r#"{"theme":"dark"}"#).unwrap();
        assert_eq!(settings.theme, Theme::Dark);
        assert_eq!(settings.max_articles_per_feed, DEFAULT_MAX_ARTICLES_PER_FEED);
        assert!(settings.background_sync_enabled);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = AiProviderConfig {
            endpoint: "https://api.example.com/v1/chat".into(),
            api_key: Some("sk-secret".into()),
            model: "small".into(),
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
