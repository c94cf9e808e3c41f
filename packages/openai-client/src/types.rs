//! Chat completion request and response types.

use serde::{Deserialize, Serialize};

// =============================================================================
// Request
// =============================================================================

/// Chat completion request.
///
/// Serializes to `{model, messages, temperature, max_tokens}`; unset optional
/// fields are omitted from the body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    /// Model to use (e.g., "gpt-3.5-turbo", "gpt-4")
    pub model: String,

    /// Conversation messages
    pub messages: Vec<Message>,

    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens in the completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Create a new chat request with the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Add a message to the conversation.
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Set temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max tokens.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// =============================================================================
// Response
// =============================================================================

/// Chat completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Content of the first choice
    pub content: String,

    /// Token usage statistics
    pub usage: Option<Usage>,
}

/// Raw chat response from API (for internal parsing).
#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponseRaw {
    pub choices: Vec<ChatChoice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatMessageResponse {
    #[serde(default)]
    pub content: Option<String>,
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// =============================================================================
// Errors
// =============================================================================

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub message: Option<String>,
}

/// Maximum characters of a raw error body quoted in a message.
const RAW_BODY_EXCERPT: usize = 100;

/// Build a human-readable message for a failed call.
///
/// Prefers the structured `error.message`; a JSON body without one yields a
/// status-only message, and a non-JSON body is quoted (truncated).
pub fn api_error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => parsed
            .error
            .and_then(|e| e.message)
            .unwrap_or_else(|| format!("API responded with status {}", status)),
        Err(_) => {
            let excerpt: String = body.chars().take(RAW_BODY_EXCERPT).collect();
            format!("API responded with status {}: {}", status, excerpt)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_expected_shape() {
        let request = ChatRequest::new("gpt-3.5-turbo")
            .message(Message::system("be brief"))
            .message(Message::user("hi"))
            .temperature(0.3)
            .max_tokens(800);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 800);
        assert!((json["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_unset_fields_omitted() {
        let json = serde_json::to_value(ChatRequest::new("m")).unwrap();
        assert!(json.get("temperature").is_none());
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_error_message_prefers_structured_body() {
        let msg = api_error_message(401, r#"{"error":{"message":"Invalid API key"}}"#);
        assert_eq!(msg, "Invalid API key");
    }

    #[test]
    fn test_error_message_json_without_message() {
        let msg = api_error_message(500, r#"{"detail":"nope"}"#);
        assert_eq!(msg, "API responded with status 500");
    }

    #[test]
    fn test_error_message_raw_body_truncated() {
        let body = "x".repeat(250);
        let msg = api_error_message(502, &body);
        assert_eq!(msg, format!("API responded with status 502: {}", "x".repeat(100)));
    }
}
