//! Transient user-facing messages about bookmark outcomes.

use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Success,
    Danger,
    Primary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notification {
    pub fn new(title: impl Into<String>, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
        }
    }

    pub(crate) fn added(name: &str) -> Self {
        Self::new("Bookmark added", format!("{name} was added to your bookmarks."), Severity::Success)
    }

    pub(crate) fn removed(name: &str) -> Self {
        Self::new("Bookmark removed", format!("{name} was removed from your bookmarks."), Severity::Primary)
    }

    pub(crate) fn auth_required() -> Self {
        Self::new("Sign in required", "You need to sign in to bookmark items.", Severity::Danger)
    }

    pub(crate) fn failed() -> Self {
        Self::new("Something went wrong", "Your bookmark could not be updated.", Severity::Danger)
    }
}

/// Sink for [`Notification`]s. Presentation decides how (and whether) to
/// show them; the engine only emits.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Default sink: every notification becomes a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let Notification { title, description, severity } = notification;
        match severity {
            Severity::Danger => tracing::warn!(%title, %description, "notification"),
            Severity::Success | Severity::Primary => tracing::info!(%title, %description, "notification"),
        }
    }
}

/// Keeps every notification it receives, for inspection in tests.
#[derive(Debug, Default)]
pub struct Recorder {
    seen: Mutex<Vec<Notification>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn severities(&self) -> Vec<Severity> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).iter().map(|n| n.severity).collect()
    }

    /// Drain everything received so far.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.seen.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Notifier for Recorder {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).push(notification);
    }
}
