//! Subscription types for registry notifications.

use crate::audit::{AuditEvent, AuditKind, AuditSubject};
use crate::types::{Sequence, Timestamp};
use serde::{Deserialize, Serialize};

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping subscriber.
    /// Default: 256
    pub buffer_size: usize,

    /// Replay audit events after this sequence before going live
    /// (None = live only).
    pub from_sequence: Option<Sequence>,

    /// Filter criteria.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 256,
            from_sequence: None,
            filter: SubscriptionFilter::all(),
        }
    }
}

/// Filter criteria for subscriptions.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    /// Include toast notifications.
    pub include_notifications: bool,

    /// Include record change events.
    pub include_changes: bool,

    /// Restrict change events to these subject categories
    /// (`"identity"`, `"account"`, `"api_key"`, `"role"`, `"settings"`).
    pub subjects: Option<Vec<String>>,
}

impl SubscriptionFilter {
    /// Only user-facing notifications.
    pub fn notifications() -> Self {
        Self {
            include_notifications: true,
            ..Default::default()
        }
    }

    /// Every change event.
    pub fn changes() -> Self {
        Self {
            include_changes: true,
            ..Default::default()
        }
    }

    /// Change events for the given subject categories.
    pub fn subjects(categories: Vec<String>) -> Self {
        Self {
            include_changes: true,
            subjects: Some(categories),
            ..Default::default()
        }
    }

    /// Subscribe to everything.
    pub fn all() -> Self {
        Self {
            include_notifications: true,
            include_changes: true,
            subjects: None,
        }
    }
}

/// How a notification should be rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Default,
    Destructive,
}

/// Transient user-facing message, the toast of the admin console.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
}

impl Notification {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity: Severity::Default,
        }
    }

    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity: Severity::Destructive,
            ..Self::new(title, description)
        }
    }
}

/// A committed change, mirrored from the audit log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub sequence: Sequence,
    pub subject: AuditSubject,
    pub kind: AuditKind,
    pub timestamp: Timestamp,
}

impl From<&AuditEvent> for ChangeEvent {
    fn from(event: &AuditEvent) -> Self {
        Self {
            sequence: event.sequence,
            subject: event.subject.clone(),
            kind: event.kind.clone(),
            timestamp: event.timestamp,
        }
    }
}

/// Events emitted by subscriptions.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryEvent {
    /// A toast notification.
    Notification { notification: Notification },

    /// A record changed.
    Changed { change: ChangeEvent },

    /// Finished replaying history, now streaming live.
    CaughtUp,

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to manage a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<RegistryEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<RegistryEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<RegistryEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<RegistryEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered.
    pub fn drain(&self) -> Vec<RegistryEvent> {
        self.receiver.try_iter().collect()
    }
}
