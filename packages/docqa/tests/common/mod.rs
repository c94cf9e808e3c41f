// Common test utilities

use std::sync::Arc;

use docqa::testing::{MockBackend, RecordingNotifier};
use docqa::{Config, EventBus, MemoryConfigStore, Session};
use tracing_subscriber::EnvFilter;

/// Route `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A session over `backend` with a recording notifier.
pub fn session_with<B: docqa::CompletionBackend>(
    config: Config,
    backend: B,
) -> (Session<B>, Arc<RecordingNotifier>) {
    init_tracing();
    let notifier = Arc::new(RecordingNotifier::new());
    let session = Session::with_parts(
        config,
        backend,
        Arc::new(MemoryConfigStore::new()),
        notifier.clone(),
        EventBus::new(),
    );
    (session, notifier)
}

/// A mock-backed session in document analysis mode.
#[allow(dead_code)]
pub fn mock_session() -> (Session<MockBackend>, Arc<RecordingNotifier>) {
    session_with(Config::new(), MockBackend::new())
}

/// Config with a usable key pointed at `endpoint`.
#[allow(dead_code)]
pub fn live_config(endpoint: &str) -> Config {
    Config::new()
        .with_api_key("sk-test-0123456789")
        .with_api_url(endpoint)
}
