//! User-facing notifications (the toast layer)

use std::sync::{Mutex, PoisonError};

use crate::error::FetchError;

/// Sink for transient user messages. Implementations must not panic.
pub trait Notifier: Send + Sync {
    /// Report a failed operation
    fn notify_failure(&self, message: &str, cause: &FetchError);
    /// Report a completed operation
    fn notify_success(&self, message: &str);
}

/// Notifier writing through the `log` crate
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_failure(&self, message: &str, cause: &FetchError) {
        match &cause.cause {
            Some(source) => log::warn!(
                target: "spendbook::notify",
                "{}: {} [{}/{}]",
                message,
                cause,
                source.code(),
                source.severity()
            ),
            None => log::warn!(target: "spendbook::notify", "{}: {}", message, cause),
        }
    }

    fn notify_success(&self, message: &str) {
        log::info!(target: "spendbook::notify", "{}", message);
    }
}

/// A message delivered to a [`RecordingNotifier`]
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Success(String),
    Failure { message: String, cause: String },
}

/// Notifier that keeps every message, for summaries and tests
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    entries: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn failures(&self) -> Vec<Notification> {
        self.entries()
            .into_iter()
            .filter(|n| matches!(n, Notification::Failure { .. }))
            .collect()
    }

    fn push(&self, notification: Notification) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

impl Notifier for RecordingNotifier {
    fn notify_failure(&self, message: &str, cause: &FetchError) {
        LogNotifier.notify_failure(message, cause);
        self.push(Notification::Failure {
            message: message.to_string(),
            cause: cause.to_string(),
        });
    }

    fn notify_success(&self, message: &str) {
        LogNotifier.notify_success(message);
        self.push(Notification::Success(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;

    #[test]
    fn test_recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        notifier.notify_success("Category saved");
        notifier.notify_failure("Could not load categories", &ServiceError::Unavailable.into());

        let entries = notifier.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], Notification::Success("Category saved".to_string()));
        assert_eq!(
            entries[1],
            Notification::Failure {
                message: "Could not load categories".to_string(),
                cause: "Backend unavailable".to_string(),
            }
        );
        assert_eq!(notifier.failures().len(), 1);
    }
}
