//! Application state for one user session.
//!
//! A [`Session`] owns the configuration, the current document, the last
//! answer, and the gateway. Uploads and questions may overlap; each carries
//! the document generation (and questions a sequence number) it started
//! with, and a result is installed only if nothing newer has started since.
//! Stale results are dropped with [`DocQaError::Superseded`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Config, ConfigStore, LlmConfig, MemoryConfigStore, SettingsUpdate};
use crate::error::{DocQaError, Result};
use crate::events::{DocQaEvent, EventBus};
use crate::extract::{ExtractionMethod, TextExtractor, UploadedFile};
use crate::gateway::{AnswerMode, CompletionBackend, LlmGateway, OpenAiBackend};
use crate::notify::{Notification, Notifier, TracingNotifier};
use crate::respond::{recommend, HeuristicResponder, Response};
use crate::usage::UsageGovernor;

/// The loaded document. Immutable once extracted.
#[derive(Debug, Clone)]
pub struct Document {
    pub file_name: String,
    pub raw_bytes: Vec<u8>,
    pub extracted_text: String,
    pub extraction_method: ExtractionMethod,
    /// Upload generation that produced this document.
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
}

/// A question as asked.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub text: String,
    pub asked_at: DateTime<Utc>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            asked_at: Utc::now(),
        }
    }
}

/// An installed answer plus the follow-up suggestions it implies.
#[derive(Debug, Clone)]
pub struct Answer {
    pub request_id: Uuid,
    pub query: Query,
    pub response: Response,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Default)]
struct SessionState {
    document: Option<Arc<Document>>,
    last_response: Option<Response>,
}

/// One user's document Q&A session.
pub struct Session<B> {
    config: RwLock<Config>,
    store: Arc<dyn ConfigStore>,
    extractor: TextExtractor,
    gateway: LlmGateway<B>,
    events: EventBus,
    notifier: Arc<dyn Notifier>,
    state: RwLock<SessionState>,
    generation: AtomicU64,
    query_seq: AtomicU64,
    upload_token: Mutex<CancellationToken>,
}

impl Session<OpenAiBackend> {
    /// Session backed by the OpenAI API, with an in-memory settings store.
    pub fn openai(config: Config) -> Result<Self> {
        let backend = OpenAiBackend::from_config(&config.llm)?;
        Ok(Self::new(config, backend))
    }
}

impl<B: CompletionBackend> Session<B> {
    /// Create a session with an in-memory store, log notifications, and a
    /// fresh event bus.
    pub fn new(config: Config, backend: B) -> Self {
        Self::with_parts(
            config,
            backend,
            Arc::new(MemoryConfigStore::new()),
            Arc::new(TracingNotifier),
            EventBus::new(),
        )
    }

    /// Create a session from explicit collaborators. Saved settings in
    /// `store` are applied on top of `config`.
    pub fn with_parts(
        mut config: Config,
        backend: B,
        store: Arc<dyn ConfigStore>,
        notifier: Arc<dyn Notifier>,
        events: EventBus,
    ) -> Self {
        config.apply_overrides(store.as_ref());

        let usage = UsageGovernor::new(config.usage.clone(), events.clone(), notifier.clone());
        let gateway = LlmGateway::new(
            backend,
            HeuristicResponder::default(),
            usage,
            events.clone(),
            notifier.clone(),
        );

        Self {
            config: RwLock::new(config),
            store,
            extractor: TextExtractor::new(),
            gateway,
            events,
            notifier,
            state: RwLock::new(SessionState::default()),
            generation: AtomicU64::new(0),
            query_seq: AtomicU64::new(0),
            upload_token: Mutex::new(CancellationToken::new()),
        }
    }

    /// Validate, extract, and install `file` as the current document.
    ///
    /// Starting an upload cancels any upload still in flight.
    pub async fn upload(&self, file: UploadedFile) -> Result<Arc<Document>> {
        if let Err(e) = self.validate(&file).await {
            self.notifier.notify(Notification::error(match &e {
                DocQaError::FileTooLarge { max, .. } => format!(
                    "File too large. Maximum size is {}MB.",
                    max / (1024 * 1024)
                ),
                _ => format!(
                    "Unsupported file type. Please upload {}",
                    self.config.read().await.document.supported_file_types.join(", ")
                ),
            }));
            return Err(e);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = self.replace_upload_token();

        self.events.emit(DocQaEvent::ExtractionStarted {
            generation,
            file_name: file.name.clone(),
            size: file.size(),
        });

        let extractor = self.extractor.clone();
        let task = tokio::task::spawn_blocking(move || {
            let result = extractor.extract(&file);
            (file, result)
        });

        let joined = tokio::select! {
            _ = token.cancelled() => {
                return Err(self.discard_extraction(generation));
            }
            joined = task => joined,
        };

        let (file, extracted) = joined.map_err(|e| DocQaError::ExtractionFailed {
            reason: format!("extraction task failed: {}", e),
        })?;

        let extracted = match extracted {
            Ok(extracted) => extracted,
            Err(e) => {
                self.events.emit(DocQaEvent::ExtractionFailed {
                    generation,
                    file_name: file.name.clone(),
                    reason: e.to_string(),
                });
                self.notifier
                    .notify(Notification::error(format!("Error processing document: {}", e)));
                return Err(e);
            }
        };

        let document = Arc::new(Document {
            file_name: file.name,
            raw_bytes: file.bytes,
            extracted_text: extracted.text,
            extraction_method: extracted.method,
            generation,
            loaded_at: Utc::now(),
        });

        {
            let mut state = self.state.write().await;
            if self.generation.load(Ordering::SeqCst) != generation || token.is_cancelled() {
                drop(state);
                return Err(self.discard_extraction(generation));
            }
            state.document = Some(document.clone());
            state.last_response = None;
        }

        self.events.emit(DocQaEvent::ExtractionSucceeded {
            generation,
            file_name: document.file_name.clone(),
            method: document.extraction_method,
            chars: document.extracted_text.chars().count(),
        });
        self.notifier
            .notify(Notification::success("Document processed successfully"));
        info!(
            generation,
            file_name = %document.file_name,
            method = ?document.extraction_method,
            "Document loaded"
        );
        Ok(document)
    }

    /// Cancel the upload in flight, if any. It resolves to
    /// [`DocQaError::Cancelled`].
    pub fn cancel_upload(&self) {
        if let Ok(token) = self.upload_token.lock() {
            token.cancel();
        }
    }

    /// Answer a question about the current document.
    pub async fn ask(&self, query: impl Into<String>, mode: AnswerMode) -> Result<Answer> {
        let query = Query::new(query);
        if query.text.trim().is_empty() {
            self.notifier
                .notify(Notification::error("Please enter a question"));
            return Err(DocQaError::EmptyQuery);
        }

        let document = match self.current_document().await {
            Some(document) => document,
            None => {
                self.notifier
                    .notify(Notification::error("Please upload a document first"));
                return Err(DocQaError::NoDocumentLoaded);
            }
        };

        let request_id = Uuid::now_v7();
        let seq = self.query_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.events.emit(DocQaEvent::QueryStarted {
            request_id,
            generation: document.generation,
        });
        debug!(request_id = %request_id, generation = document.generation, "Answering question");

        let llm = {
            let config = self.config.read().await;
            LlmConfig {
                truncation_budget: config.prompt_budget(),
                ..config.llm.clone()
            }
        };
        let response = self
            .gateway
            .answer(request_id, &query.text, &document.extracted_text, mode, &llm)
            .await;

        {
            let mut state = self.state.write().await;
            let current_generation = state.document.as_ref().map(|d| d.generation);
            if current_generation != Some(document.generation)
                || self.query_seq.load(Ordering::SeqCst) != seq
            {
                warn!(request_id = %request_id, "Discarding answer for a superseded question");
                self.events.emit(DocQaEvent::ResponseDiscarded {
                    request_id,
                    generation: document.generation,
                });
                return Err(DocQaError::Superseded);
            }
            state.last_response = Some(response.clone());
        }

        self.events.emit(DocQaEvent::ResponseReady {
            request_id,
            generation: document.generation,
            source: response.source,
        });

        let recommendations = recommend::follow_up_questions(&response.body);
        Ok(Answer {
            request_id,
            query,
            response,
            recommendations,
        })
    }

    /// Suggested questions for the current state.
    pub async fn recommendations(&self) -> Vec<String> {
        let state = self.state.read().await;
        match (&state.last_response, &state.document) {
            (Some(response), _) => recommend::follow_up_questions(&response.body),
            (None, Some(document)) => recommend::initial_questions(&document.extracted_text),
            (None, None) => recommend::default_questions(),
        }
    }

    pub async fn current_document(&self) -> Option<Arc<Document>> {
        self.state.read().await.document.clone()
    }

    pub async fn last_response(&self) -> Option<Response> {
        self.state.read().await.last_response.clone()
    }

    pub fn usage_count(&self) -> u64 {
        self.gateway.usage().count()
    }

    pub fn reset_usage(&self) {
        self.gateway.usage().reset();
    }

    /// Apply and persist settings from the settings panel.
    pub async fn update_settings(&self, update: SettingsUpdate) {
        let mut config = self.config.write().await;
        config.update(update, self.store.as_ref());
        if config.has_usable_api_key() {
            self.notifier
                .notify(Notification::success("API settings saved successfully"));
        } else {
            self.notifier.notify(Notification::warning(
                "API settings saved, but API key may be invalid",
            ));
        }
        debug!(llm = ?config.llm, "Settings updated");
    }

    /// Snapshot of the current configuration.
    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DocQaEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn gateway(&self) -> &LlmGateway<B> {
        &self.gateway
    }

    async fn validate(&self, file: &UploadedFile) -> Result<()> {
        let config = self.config.read().await;
        let extension = file.extension().unwrap_or_default();
        if !config.document.accepts_extension(&extension) {
            return Err(DocQaError::UnsupportedFileType { extension });
        }
        if file.size() > config.document.max_file_size {
            return Err(DocQaError::FileTooLarge {
                size: file.size(),
                max: config.document.max_file_size,
            });
        }
        Ok(())
    }

    /// Install a fresh token for a new upload, cancelling the previous one.
    fn replace_upload_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        match self.upload_token.lock() {
            Ok(mut current) => {
                let previous = std::mem::replace(&mut *current, token.clone());
                previous.cancel();
            }
            Err(_) => warn!("Upload token lock poisoned"),
        }
        token
    }

    fn discard_extraction(&self, generation: u64) -> DocQaError {
        let current_generation = self.generation.load(Ordering::SeqCst);
        self.events.emit(DocQaEvent::ExtractionDiscarded {
            generation,
            current_generation,
        });
        if current_generation == generation {
            debug!(generation, "Upload cancelled");
            DocQaError::Cancelled
        } else {
            debug!(generation, current_generation, "Upload superseded");
            DocQaError::Superseded
        }
    }
}

impl<B> std::fmt::Debug for Session<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .field("gateway", &self.gateway)
            .finish_non_exhaustive()
    }
}
