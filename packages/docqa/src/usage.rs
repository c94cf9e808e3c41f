//! Per-session API call counter with a soft limit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::UsageConfig;
use crate::events::{DocQaEvent, EventBus};
use crate::notify::{Notification, Notifier};

/// Counts successful completion calls and reports when the limit is hit.
///
/// Reaching the limit does not block anything by itself; the gateway reads
/// [`UsageGovernor::is_limit_reached`] and falls back to document analysis
/// mode.
pub struct UsageGovernor {
    count: AtomicU64,
    limits: UsageConfig,
    events: EventBus,
    notifier: Arc<dyn Notifier>,
}

impl UsageGovernor {
    pub fn new(limits: UsageConfig, events: EventBus, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            count: AtomicU64::new(0),
            limits,
            events,
            notifier,
        }
    }

    /// Record one successful call. Returns the new count.
    pub fn record_call(&self) -> u64 {
        let count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(count, "API call recorded");

        if count == self.limits.warning_threshold && count < self.limits.call_limit {
            warn!(count, limit = self.limits.call_limit, "Approaching API call limit");
            self.events.emit(DocQaEvent::UsageWarning {
                count,
                limit: self.limits.call_limit,
            });
            self.notifier.notify(Notification::warning(format!(
                "Approaching API call limit ({}/{}).",
                count, self.limits.call_limit
            )));
        }
        count
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    /// The configured call limit.
    pub fn limit(&self) -> u64 {
        self.limits.call_limit
    }

    /// Whether `count >= limit`. When true, announces the switch to
    /// document analysis mode.
    pub fn is_limit_reached(&self, limit: u64) -> bool {
        let count = self.count();
        let reached = count >= limit;
        if reached {
            warn!(count, limit, "API call limit reached");
            self.events.emit(DocQaEvent::UsageLimitReached { count, limit });
            self.notifier.notify(Notification::warning(format!(
                "API call limit reached ({}/{}). Using document analysis mode.",
                count, limit
            )));
        }
        reached
    }

    /// [`Self::is_limit_reached`] against the configured limit.
    pub fn limit_reached(&self) -> bool {
        self.is_limit_reached(self.limits.call_limit)
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
        info!("API usage counter reset");
        self.events.emit(DocQaEvent::UsageReset);
        self.notifier
            .notify(Notification::info("API usage counter reset."));
    }
}

impl std::fmt::Debug for UsageGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageGovernor")
            .field("count", &self.count())
            .field("limits", &self.limits)
            .finish()
    }
}
