//! Configuration for extraction, the completion API, and usage limits.
//!
//! Defaults mirror the shipped settings; [`Config::from_env`] layers
//! environment variables (and a `.env` file) on top, and
//! [`Config::apply_overrides`] layers the persisted user settings held in a
//! [`ConfigStore`].

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::RwLock;
use std::time::Duration;

use dotenvy::dotenv;
use tracing::{debug, warn};

use crate::error::{DocQaError, Result};
use crate::security::{SecretString, PLACEHOLDER_API_KEY};

/// Store key for the persisted API key.
pub const KEY_API_KEY: &str = "openai_api_key";
/// Store key for the persisted model name.
pub const KEY_MODEL: &str = "openai_model";
/// Store key for the persisted sampling temperature.
pub const KEY_TEMPERATURE: &str = "openai_temperature";

/// Completion API settings.
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: SecretString,
    /// Full chat completions endpoint URL.
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Default for the "document analysis mode" toggle.
    pub mock_mode_enabled: bool,
    /// Maximum characters of document text sent to the API.
    pub truncation_budget: usize,
    /// `None` leaves the transport default in place.
    pub request_timeout: Option<Duration>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: SecretString::new(PLACEHOLDER_API_KEY),
            api_url: openai_client::DEFAULT_ENDPOINT.to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.3,
            max_tokens: 800,
            mock_mode_enabled: true,
            truncation_budget: 8000,
            request_timeout: None,
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.masked())
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("mock_mode_enabled", &self.mock_mode_enabled)
            .field("truncation_budget", &self.truncation_budget)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Upload and document limits.
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    /// Maximum upload size in bytes.
    pub max_file_size: u64,
    /// Accepted extensions, with leading dot (".pdf").
    pub supported_file_types: Vec<String>,
    /// Approximate context-window limit in characters.
    pub max_character_limit: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            max_file_size: 20 * 1024 * 1024,
            supported_file_types: [".pdf", ".docx", ".doc", ".txt"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_character_limit: 12000,
        }
    }
}

impl DocumentConfig {
    /// Whether an extension (with or without leading dot, any case) is accepted.
    pub fn accepts_extension(&self, extension: &str) -> bool {
        let wanted = format!(".{}", extension.trim_start_matches('.').to_lowercase());
        self.supported_file_types
            .iter()
            .any(|t| t.to_lowercase() == wanted)
    }
}

/// Per-session API call limits.
#[derive(Debug, Clone)]
pub struct UsageConfig {
    pub call_limit: u64,
    pub warning_threshold: u64,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            call_limit: 50,
            warning_threshold: 45,
        }
    }
}

/// Process-wide configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub llm: LlmConfig,
    pub document: DocumentConfig,
    pub usage: UsageConfig,
}

impl Config {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Unset variables keep their defaults; set-but-invalid numbers are errors.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let mut config = Self::default();

        if let Ok(key) = env::var("OPENAI_API_KEY") {
            config = config.with_api_key(key);
        }
        if let Ok(url) = env::var("DOCQA_API_URL") {
            config.llm.api_url = url;
        }
        if let Ok(model) = env::var("DOCQA_MODEL") {
            config.llm.model = model;
        }
        if let Some(temperature) = parse_env("DOCQA_TEMPERATURE")? {
            config.llm.temperature = temperature;
        }
        if let Some(max_tokens) = parse_env("DOCQA_MAX_TOKENS")? {
            config.llm.max_tokens = max_tokens;
        }
        if let Some(max_file_size) = parse_env("DOCQA_MAX_FILE_SIZE")? {
            config.document.max_file_size = max_file_size;
        }
        if let Some(limit) = parse_env("DOCQA_MAX_CHARACTER_LIMIT")? {
            config.document.max_character_limit = limit;
        }
        if let Some(call_limit) = parse_env("DOCQA_CALL_LIMIT")? {
            config.usage.call_limit = call_limit;
        }
        if let Some(secs) = parse_env::<u64>("DOCQA_REQUEST_TIMEOUT_SECS")? {
            config.llm.request_timeout = Some(Duration::from_secs(secs));
        }

        debug!(config = ?config, "Configuration loaded from environment");
        Ok(config)
    }

    /// Set the API key. A real key switches the mock-mode default off.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.llm.api_key = SecretString::new(key);
        self.llm.mock_mode_enabled = self.llm.api_key.is_placeholder();
        self
    }

    /// Set the endpoint URL.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.llm.api_url = url.into();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.llm.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.llm.temperature = temperature;
        self
    }

    /// Set the maximum upload size in bytes.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.document.max_file_size = bytes;
        self
    }

    /// Set the context-window limit in characters.
    pub fn with_max_character_limit(mut self, chars: usize) -> Self {
        self.document.max_character_limit = chars;
        self
    }

    /// Set the per-session API call limit.
    pub fn with_call_limit(mut self, limit: u64) -> Self {
        self.usage.call_limit = limit;
        self
    }

    /// Set the usage warning threshold.
    pub fn with_warning_threshold(mut self, threshold: u64) -> Self {
        self.usage.warning_threshold = threshold;
        self
    }

    /// Characters of document text a prompt may carry: the truncation
    /// budget, capped by the context-window limit.
    pub fn prompt_budget(&self) -> usize {
        self.llm.truncation_budget.min(self.document.max_character_limit)
    }

    /// Whether a non-placeholder API key is configured.
    pub fn has_usable_api_key(&self) -> bool {
        !self.llm.api_key.is_placeholder()
    }

    /// Apply persisted user settings.
    ///
    /// Malformed values are logged and skipped rather than failing startup.
    pub fn apply_overrides(&mut self, store: &dyn ConfigStore) {
        if let Some(key) = store.get(KEY_API_KEY) {
            if key != PLACEHOLDER_API_KEY && !key.trim().is_empty() {
                self.llm.api_key = SecretString::new(key);
                self.llm.mock_mode_enabled = false;
            }
        }
        if let Some(model) = store.get(KEY_MODEL) {
            if !model.trim().is_empty() {
                self.llm.model = model;
            }
        }
        if let Some(raw) = store.get(KEY_TEMPERATURE) {
            match raw.parse::<f32>() {
                Ok(t) => self.llm.temperature = t,
                Err(_) => warn!(value = %raw, "Ignoring malformed saved temperature"),
            }
        }
    }

    /// Apply a settings change and persist it.
    pub fn update(&mut self, update: SettingsUpdate, store: &dyn ConfigStore) {
        if let Some(key) = update.api_key {
            store.set(KEY_API_KEY, key.expose());
            self.llm.api_key = key;
            self.llm.mock_mode_enabled = self.llm.api_key.is_placeholder();
        }
        if let Some(model) = update.model {
            store.set(KEY_MODEL, &model);
            self.llm.model = model;
        }
        if let Some(temperature) = update.temperature {
            store.set(KEY_TEMPERATURE, &temperature.to_string());
            self.llm.temperature = temperature;
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| DocQaError::ConfigurationMissing(format!("{} must be a valid number", name))),
        Err(_) => Ok(None),
    }
}

/// User-editable settings from the settings panel.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub api_key: Option<SecretString>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

/// Key-value store holding settings across reloads.
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory [`ConfigStore`].
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .ok()
            .and_then(|values| values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.write() {
            values.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut values) = self.values.write() {
            values.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert_eq!(config.llm.max_tokens, 800);
        assert!((config.llm.temperature - 0.3).abs() < f32::EPSILON);
        assert!(config.llm.mock_mode_enabled);
        assert!(!config.has_usable_api_key());
        assert_eq!(config.document.max_file_size, 20 * 1024 * 1024);
        assert_eq!(config.usage.call_limit, 50);
        assert_eq!(config.llm.api_url, "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_prompt_budget_capped_by_character_limit() {
        assert_eq!(Config::default().prompt_budget(), 8000);
        assert_eq!(Config::new().with_max_character_limit(5000).prompt_budget(), 5000);
    }

    #[test]
    fn test_accepts_extension() {
        let doc = DocumentConfig::default();
        assert!(doc.accepts_extension("pdf"));
        assert!(doc.accepts_extension(".DOCX"));
        assert!(doc.accepts_extension("txt"));
        assert!(!doc.accepts_extension("xlsx"));
    }

    #[test]
    fn test_real_key_disables_mock_default() {
        let config = Config::new().with_api_key("sk-live");
        assert!(config.has_usable_api_key());
        assert!(!config.llm.mock_mode_enabled);

        let config = Config::new().with_api_key(PLACEHOLDER_API_KEY);
        assert!(config.llm.mock_mode_enabled);
    }

    #[test]
    fn test_overrides_from_store() {
        let store = MemoryConfigStore::new();
        store.set(KEY_API_KEY, "sk-saved");
        store.set(KEY_MODEL, "gpt-4");
        store.set(KEY_TEMPERATURE, "0.7");

        let mut config = Config::default();
        config.apply_overrides(&store);

        assert_eq!(config.llm.api_key.expose(), "sk-saved");
        assert!(!config.llm.mock_mode_enabled);
        assert_eq!(config.llm.model, "gpt-4");
        assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_placeholder_and_garbage_overrides_ignored() {
        let store = MemoryConfigStore::new();
        store.set(KEY_API_KEY, PLACEHOLDER_API_KEY);
        store.set(KEY_TEMPERATURE, "warm");

        let mut config = Config::default();
        config.apply_overrides(&store);

        assert!(!config.has_usable_api_key());
        assert!(config.llm.mock_mode_enabled);
        assert!((config.llm.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_update_persists() {
        let store = MemoryConfigStore::new();
        let mut config = Config::default();

        config.update(
            SettingsUpdate {
                api_key: Some(SecretString::new("sk-new")),
                model: Some("gpt-4".into()),
                temperature: Some(0.5),
            },
            &store,
        );

        assert_eq!(store.get(KEY_API_KEY).as_deref(), Some("sk-new"));
        assert_eq!(store.get(KEY_MODEL).as_deref(), Some("gpt-4"));
        assert_eq!(store.get(KEY_TEMPERATURE).as_deref(), Some("0.5"));
        assert!(config.has_usable_api_key());
    }

    #[test]
    fn test_debug_masks_key() {
        let config = Config::new().with_api_key("sk-abcdefghijklmnop1234");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("abcdefghijklmnop"));
        assert!(debug.contains("sk-...1234"));
    }

    #[test]
    fn test_memory_store_remove() {
        let store = MemoryConfigStore::new();
        store.set("theme", "dark");
        assert_eq!(store.get("theme").as_deref(), Some("dark"));
        store.remove("theme");
        assert!(store.get("theme").is_none());
    }
}
