//! LLM gateway.
//!
//! Decides between the remote completion API and the heuristic responder,
//! and turns remote failures into a compensating heuristic answer. The
//! gateway never fails outward: every path yields a [`Response`].
//!
//! # Example
//!
//! ```rust,ignore
//! let gateway = LlmGateway::new(OpenAiBackend::new(), HeuristicResponder::default(), usage, bus, notifier);
//! let response = gateway
//!     .answer(Uuid::now_v7(), "What is this about?", &text, AnswerMode::remote(), &config.llm)
//!     .await;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use openai_client::{ChatRequest, Message, OpenAIClient};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LlmConfig;
use crate::error::{DocQaError, Result};
use crate::events::{DocQaEvent, EventBus};
use crate::notify::{Notification, Notifier};
use crate::respond::{HeuristicResponder, Response, ResponseSource};
use crate::security::ApiCredentials;
use crate::usage::UsageGovernor;

/// Fixed system instruction for document questions.
pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that answers questions about documents with precision and clarity.";

/// Appended to document text cut at the truncation budget.
pub const TRUNCATION_NOTICE: &str = "... [truncated for token limit]";

/// Answer given when there is no document text to work from.
pub const NO_DOCUMENT_MESSAGE: &str =
    "Error: No document content available. Please upload a document first.";

/// Default token ceiling for [`exceeds_token_limit`].
pub const DEFAULT_TOKEN_LIMIT: usize = 3000;

/// Rough token count at four characters per token.
pub fn estimate_token_count(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

pub fn exceeds_token_limit(text: &str, limit: usize) -> bool {
    estimate_token_count(text) > limit
}

/// Cut `text` to `budget` characters, marking the cut.
pub fn truncate_for_budget(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_NOTICE),
        None => text.to_string(),
    }
}

/// User message carrying the (truncated) document and the question.
pub fn build_user_prompt(query: &str, document_text: &str, budget: usize) -> String {
    format!(
        "\nDocument content:\n{}\n\nQuestion: {}\n\n\
         Please answer based only on the document content above. \
         If the answer cannot be found in the document, say so clearly.",
        truncate_for_budget(document_text, budget),
        query
    )
}

/// Whether the UI's document-analysis toggle is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerMode {
    pub mock_mode_enabled: bool,
}

impl AnswerMode {
    /// Heuristic answers only.
    pub fn mock() -> Self {
        Self {
            mock_mode_enabled: true,
        }
    }

    /// Remote answers when a key is configured and the limit allows.
    pub fn remote() -> Self {
        Self {
            mock_mode_enabled: false,
        }
    }
}

/// A chat completion to run against a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Completion provider seam.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run one completion and return the answer text.
    async fn complete(
        &self,
        credentials: &ApiCredentials,
        request: CompletionRequest,
    ) -> Result<String>;
}

/// [`CompletionBackend`] over the OpenAI chat completions API.
#[derive(Debug, Clone, Default)]
pub struct OpenAiBackend {
    http_client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a request timeout to every call.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                DocQaError::ConfigurationMissing(format!("failed to build HTTP client: {}", e))
            })?;
        Ok(Self { http_client })
    }

    /// Build from config: a timeout is applied only when one is set.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        match config.request_timeout {
            Some(timeout) => Self::with_timeout(timeout),
            None => Ok(Self::new()),
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(
        &self,
        credentials: &ApiCredentials,
        request: CompletionRequest,
    ) -> Result<String> {
        let client = OpenAIClient::new(credentials.api_key.expose())
            .with_http_client(self.http_client.clone())
            .with_endpoint(&credentials.endpoint);

        let chat = ChatRequest::new(request.model)
            .message(Message::system(request.system_prompt))
            .message(Message::user(request.user_prompt))
            .temperature(request.temperature)
            .max_tokens(request.max_tokens);

        let response = client.chat_completion(chat).await?;
        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion token usage"
            );
        }
        Ok(response.content)
    }
}

/// Routes questions to the completion API or the heuristic responder.
pub struct LlmGateway<B> {
    backend: B,
    responder: HeuristicResponder,
    usage: UsageGovernor,
    events: EventBus,
    notifier: Arc<dyn Notifier>,
}

impl<B: CompletionBackend> LlmGateway<B> {
    pub fn new(
        backend: B,
        responder: HeuristicResponder,
        usage: UsageGovernor,
        events: EventBus,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            backend,
            responder,
            usage,
            events,
            notifier,
        }
    }

    pub fn usage(&self) -> &UsageGovernor {
        &self.usage
    }

    pub fn responder(&self) -> &HeuristicResponder {
        &self.responder
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Answer `query` about `document_text`.
    pub async fn answer(
        &self,
        request_id: Uuid,
        query: &str,
        document_text: &str,
        mode: AnswerMode,
        llm: &LlmConfig,
    ) -> Response {
        if document_text.trim().is_empty() {
            return Response::new(NO_DOCUMENT_MESSAGE, ResponseSource::Error);
        }

        if mode.mock_mode_enabled || llm.api_key.is_placeholder() {
            debug!(
                request_id = %request_id,
                mock_mode_enabled = mode.mock_mode_enabled,
                "Using document analysis mode"
            );
            return self.responder.respond(query, document_text);
        }

        if self.usage.limit_reached() {
            return self.responder.respond(query, document_text);
        }

        self.remote_answer(request_id, query, document_text, llm).await
    }

    async fn remote_answer(
        &self,
        request_id: Uuid,
        query: &str,
        document_text: &str,
        llm: &LlmConfig,
    ) -> Response {
        let credentials = ApiCredentials {
            api_key: llm.api_key.clone(),
            endpoint: llm.api_url.clone(),
        };
        let request = CompletionRequest {
            model: llm.model.clone(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_prompt: build_user_prompt(query, document_text, llm.truncation_budget),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
        };

        self.events.emit(DocQaEvent::RemoteCallStarted {
            request_id,
            model: request.model.clone(),
            prompt_chars: request.user_prompt.chars().count(),
        });
        self.notifier.notify(Notification::info("Calling OpenAI API..."));

        let start = Instant::now();
        match self.backend.complete(&credentials, request).await {
            Ok(content) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                self.usage.record_call();
                info!(request_id = %request_id, duration_ms, "Remote answer received");
                self.events.emit(DocQaEvent::RemoteCallSucceeded {
                    request_id,
                    duration_ms,
                });
                self.notifier
                    .notify(Notification::success("API response received successfully"));
                Response::new(content, ResponseSource::Llm)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(request_id = %request_id, error = %message, "Remote answer failed, compensating");
                self.events.emit(DocQaEvent::RemoteCallFailed {
                    request_id,
                    error: message.clone(),
                });
                self.notifier.notify(Notification::error(format!(
                    "Error calling OpenAI API: {}. Check your API key and try again.",
                    message
                )));
                let fallback = self.responder.default_answer(document_text);
                Response::new(
                    format!(
                        "Error calling OpenAI API: {}. Using document content instead.\n\n{}",
                        message, fallback.body
                    ),
                    ResponseSource::Error,
                )
            }
        }
    }
}

impl<B> std::fmt::Debug for LlmGateway<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmGateway")
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}
