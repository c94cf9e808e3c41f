//! User-facing notifications.
//!
//! The UI shows these as auto-dismissing toasts; the library only decides
//! what to say and how loudly.

use serde::Serialize;
use tracing::{error, info, warn};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, message)
    }
}

/// Sink for user-facing notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log. Used when no UI sink is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let message = notification.message.as_str();
        match notification.level {
            NotificationLevel::Info | NotificationLevel::Success => {
                info!(level = ?notification.level, message, "Notification")
            }
            NotificationLevel::Warning => warn!(message, "Notification"),
            NotificationLevel::Error => error!(message, "Notification"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_level() {
        assert_eq!(Notification::success("ok").level, NotificationLevel::Success);
        assert_eq!(Notification::warning("careful").level, NotificationLevel::Warning);
        assert_eq!(Notification::error("bad").message, "bad");
    }

    #[test]
    fn test_tracing_notifier_accepts_all_levels() {
        let notifier = TracingNotifier;
        notifier.notify(Notification::info("i"));
        notifier.notify(Notification::error("e"));
    }
}
