//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that embed the library
//! without making real completion API calls.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{DocQaError, Result};
use crate::gateway::{CompletionBackend, CompletionRequest};
use crate::notify::{Notification, NotificationLevel, Notifier};
use crate::security::ApiCredentials;

/// A mock completion backend for testing.
///
/// Replies come from a script of answers and errors, consumed in order.
/// Once the script is exhausted every call returns the default answer.
#[derive(Clone)]
pub struct MockBackend {
    /// Scripted replies (`Err` holds the failure message)
    script: Arc<RwLock<VecDeque<std::result::Result<String, String>>>>,

    /// Reply used when the script is empty
    default_answer: String,

    /// Artificial latency before replying
    delay: Option<Duration>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<CompletionRequest>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            script: Arc::new(RwLock::new(VecDeque::new())),
            default_answer: "Mock completion".to_string(),
            delay: None,
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful answer.
    pub fn with_response(self, answer: impl Into<String>) -> Self {
        self.script.write().unwrap().push_back(Ok(answer.into()));
        self
    }

    /// Queue a failure with the given message.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.script.write().unwrap().push_back(Err(message.into()));
        self
    }

    /// Set the answer used once the script runs out.
    pub fn with_default_answer(mut self, answer: impl Into<String>) -> Self {
        self.default_answer = answer.into();
        self
    }

    /// Sleep before replying.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    async fn complete(
        &self,
        _credentials: &ApiCredentials,
        request: CompletionRequest,
    ) -> Result<String> {
        self.calls.write().unwrap().push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.write().unwrap().pop_front();
        match next {
            Some(Ok(answer)) => Ok(answer),
            Some(Err(message)) => Err(DocQaError::RemoteCallFailed(message)),
            None => Ok(self.default_answer.clone()),
        }
    }
}

/// Collects notifications for assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: RwLock<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.notifications.read().unwrap().clone()
    }

    pub fn last(&self) -> Option<Notification> {
        self.notifications.read().unwrap().last().cloned()
    }

    pub fn messages(&self) -> Vec<String> {
        self.all().into_iter().map(|n| n.message).collect()
    }

    /// Number of notifications at `level`.
    pub fn count_at(&self, level: NotificationLevel) -> usize {
        self.notifications
            .read()
            .unwrap()
            .iter()
            .filter(|n| n.level == level)
            .count()
    }

    pub fn clear(&self) {
        self.notifications.write().unwrap().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.write().unwrap().push(notification);
    }
}
