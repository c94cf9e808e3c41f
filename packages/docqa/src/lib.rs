//! Document Question Answering Library
//!
//! Loads an uploaded PDF, Word, or text file, extracts its text, and answers
//! natural-language questions about it, either through a chat completions
//! API or through a local keyword-and-statistics responder when no API is
//! available ("document analysis mode").
//!
//! # Usage
//!
//! ```rust,ignore
//! use docqa::{AnswerMode, Config, Session, UploadedFile};
//! use docqa::testing::MockBackend;
//!
//! let session = Session::new(Config::from_env()?, MockBackend::new());
//! session.upload(UploadedFile::new("report.pdf", bytes)).await?;
//!
//! let answer = session.ask("Give me a summary", AnswerMode::mock()).await?;
//! println!("{}", docqa::render::response_to_html(&answer.response.body));
//! ```
//!
//! # Modules
//!
//! - [`extract`] - Text extraction from PDF, DOCX, and TXT files
//! - [`respond`] - Heuristic answers and recommended questions
//! - [`gateway`] - Completion API routing with heuristic fallback
//! - [`usage`] - Per-session API call limit
//! - [`session`] - Application state with stale-result guards
//! - [`events`] - Lifecycle event bus
//! - [`render`] - HTML rendering with escaping
//! - [`testing`] - Mock implementations for testing

pub mod config;
pub mod error;
pub mod events;
pub mod extract;
pub mod gateway;
pub mod notify;
pub mod render;
pub mod respond;
pub mod security;
pub mod session;
pub mod testing;
pub mod usage;

// Re-export core types at crate root
pub use config::{
    Config, ConfigStore, DocumentConfig, LlmConfig, MemoryConfigStore, SettingsUpdate, UsageConfig,
};
pub use error::{DocQaError, Result};
pub use events::{spawn_event_logger, DocQaEvent, EventBus};
pub use extract::{ExtractionMethod, Extracted, FileKind, TextExtractor, UploadedFile};
pub use gateway::{
    estimate_token_count, exceeds_token_limit, AnswerMode, CompletionBackend, CompletionRequest,
    LlmGateway, OpenAiBackend,
};
pub use notify::{Notification, NotificationLevel, Notifier, TracingNotifier};
pub use respond::{
    DocumentStats, HeuristicResponder, QueryIntent, ResponderConfig, Response, ResponseSource,
};
pub use security::{ApiCredentials, SecretString};
pub use session::{Answer, Document, Query, Session};
pub use usage::UsageGovernor;

// Re-export testing utilities
pub use testing::{MockBackend, RecordingNotifier};
