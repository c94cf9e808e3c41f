//! Lifecycle event bus.
//!
//! Extraction, gateway, and usage changes are published as [`DocQaEvent`]s
//! on a broadcast channel. Observers (the log, a debug panel, a usage
//! badge) subscribe independently.
//!
//! # Guarantees
//!
//! - **At-most-once delivery**: Slow receivers may miss events
//! - **In-memory only**: Events are not persisted
//! - **No replay**: Late subscribers see only events emitted after subscribing

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::extract::ExtractionMethod;
use crate::respond::ResponseSource;

/// Default channel capacity for the event bus.
const DEFAULT_CAPACITY: usize = 1024;

/// Something that happened while loading a document or answering a question.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocQaEvent {
    ExtractionStarted {
        generation: u64,
        file_name: String,
        size: u64,
    },
    ExtractionSucceeded {
        generation: u64,
        file_name: String,
        method: ExtractionMethod,
        chars: usize,
    },
    ExtractionFailed {
        generation: u64,
        file_name: String,
        reason: String,
    },
    /// A finished extraction was dropped because a newer upload started.
    ExtractionDiscarded {
        generation: u64,
        current_generation: u64,
    },
    QueryStarted {
        request_id: Uuid,
        generation: u64,
    },
    RemoteCallStarted {
        request_id: Uuid,
        model: String,
        prompt_chars: usize,
    },
    RemoteCallSucceeded {
        request_id: Uuid,
        duration_ms: u64,
    },
    RemoteCallFailed {
        request_id: Uuid,
        error: String,
    },
    ResponseReady {
        request_id: Uuid,
        generation: u64,
        source: ResponseSource,
    },
    /// A finished answer was dropped because the document or query changed.
    ResponseDiscarded {
        request_id: Uuid,
        generation: u64,
    },
    UsageWarning {
        count: u64,
        limit: u64,
    },
    UsageLimitReached {
        count: u64,
        limit: u64,
    },
    UsageReset,
}

/// Broadcast bus for [`DocQaEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DocQaEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new event bus with the specified capacity.
    ///
    /// The capacity determines how many events can be buffered before
    /// slow receivers start lagging.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers (fire-and-forget).
    ///
    /// Returns the number of receivers that received the event.
    pub fn emit(&self, event: DocQaEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DocQaEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Spawn a task that writes every event to `tracing`.
///
/// The task ends when every sender of the bus has been dropped.
pub fn spawn_event_logger(bus: &EventBus) -> JoinHandle<()> {
    let mut receiver = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event logger lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &DocQaEvent) {
    match event {
        DocQaEvent::ExtractionStarted {
            generation,
            file_name,
            size,
        } => debug!(generation, file_name = %file_name, size, "Extraction started"),
        DocQaEvent::ExtractionSucceeded {
            generation,
            file_name,
            method,
            chars,
        } => info!(generation, file_name = %file_name, method = ?method, chars, "Extraction succeeded"),
        DocQaEvent::ExtractionFailed {
            generation,
            file_name,
            reason,
        } => warn!(generation, file_name = %file_name, reason = %reason, "Extraction failed"),
        DocQaEvent::ExtractionDiscarded {
            generation,
            current_generation,
        } => debug!(generation, current_generation, "Stale extraction discarded"),
        DocQaEvent::QueryStarted {
            request_id,
            generation,
        } => debug!(request_id = %request_id, generation, "Query started"),
        DocQaEvent::RemoteCallStarted {
            request_id,
            model,
            prompt_chars,
        } => debug!(request_id = %request_id, model = %model, prompt_chars, "Remote call started"),
        DocQaEvent::RemoteCallSucceeded {
            request_id,
            duration_ms,
        } => info!(request_id = %request_id, duration_ms, "Remote call succeeded"),
        DocQaEvent::RemoteCallFailed { request_id, error } => {
            warn!(request_id = %request_id, error = %error, "Remote call failed")
        }
        DocQaEvent::ResponseReady {
            request_id,
            generation,
            source,
        } => debug!(request_id = %request_id, generation, source = ?source, "Response ready"),
        DocQaEvent::ResponseDiscarded {
            request_id,
            generation,
        } => debug!(request_id = %request_id, generation, "Stale response discarded"),
        DocQaEvent::UsageWarning { count, limit } => {
            warn!(count, limit, "Approaching API call limit")
        }
        DocQaEvent::UsageLimitReached { count, limit } => {
            warn!(count, limit, "API call limit reached")
        }
        DocQaEvent::UsageReset => info!("API usage counter reset"),
    }
}
