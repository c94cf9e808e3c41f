//! Credential handling with secure memory.
//!
//! Uses the `secrecy` crate to prevent accidental logging of API keys.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

/// Value shipped in default configuration until the user supplies a key.
pub const PLACEHOLDER_API_KEY: &str = "your-openai-api-key";

/// A secret string that won't be logged or displayed.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    /// Create a new secret string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Expose the secret value for use.
    ///
    /// Only call this when actually using the secret (e.g., in an API request).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// True when no usable key is present: empty or the shipped placeholder.
    pub fn is_placeholder(&self) -> bool {
        let value = self.expose().trim();
        value.is_empty() || value == PLACEHOLDER_API_KEY
    }

    /// Masked form for debug displays: first 3 and last 4 characters.
    ///
    /// Keys too short to mask meaningfully are fully hidden.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.expose().chars().collect();
        if self.is_placeholder() {
            return "(not configured)".to_string();
        }
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..3].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

impl Default for SecretString {
    fn default() -> Self {
        Self::new(PLACEHOLDER_API_KEY)
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.expose().to_string())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Everything a backend needs to reach the completion endpoint.
#[derive(Clone)]
pub struct ApiCredentials {
    /// API key (secret)
    pub api_key: SecretString,

    /// Full chat completions endpoint URL
    pub endpoint: String,
}

impl ApiCredentials {
    /// Create new credentials.
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key),
            endpoint: endpoint.into(),
        }
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key.masked())
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
