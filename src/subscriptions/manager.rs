//! Notification bus: fans registry events out to subscribers.

use crate::audit::{AuditEvent, AuditSubject};
use crate::error::{LedgerError, Result};
use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{
    ChangeEvent, DropReason, Notification, RegistryEvent, SubscriptionConfig, SubscriptionHandle,
    SubscriptionId,
};

/// Internal subscription state.
struct Subscription {
    config: SubscriptionConfig,
    sender: Sender<RegistryEvent>,
    /// Whether history replay is complete.
    caught_up: bool,
}

impl Subscription {
    /// Try to send an event. Returns false if buffer is full (subscriber will be dropped).
    fn try_send(&self, event: RegistryEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }

    fn wants_notifications(&self) -> bool {
        self.config.filter.include_notifications
    }

    fn matches_subject(&self, subject: &AuditSubject) -> bool {
        if !self.config.filter.include_changes {
            return false;
        }

        match self.config.filter.subjects {
            Some(ref categories) => categories.iter().any(|c| c == subject_category(subject)),
            None => true,
        }
    }
}

/// Category name used by subject filters.
pub fn subject_category(subject: &AuditSubject) -> &'static str {
    match subject {
        AuditSubject::Identity(_) => "identity",
        AuditSubject::Account(_) => "account",
        AuditSubject::ApiKey(_) => "api_key",
        AuditSubject::Role(_) => "role",
        AuditSubject::Settings => "settings",
    }
}

/// Manages subscriptions and broadcasts events.
pub struct NotificationBus {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new subscription.
    ///
    /// The subscription receives nothing live until `mark_caught_up` is
    /// called, so history can be replayed with `replay_to` first.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));

        let subscription = Subscription {
            config,
            sender,
            caught_up: false,
        };

        self.subscriptions.write().insert(id, subscription);

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscriptions.write();
        if let Some(sub) = subs.remove(&id) {
            let _ = sub.sender.try_send(RegistryEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    /// Mark a subscription as caught up (finished history replay).
    pub fn mark_caught_up(&self, id: SubscriptionId) -> Result<()> {
        let mut subs = self.subscriptions.write();
        if let Some(sub) = subs.get_mut(&id) {
            sub.caught_up = true;
            if !sub.try_send(RegistryEvent::CaughtUp) {
                subs.remove(&id);
                return Err(LedgerError::SubscriptionDropped);
            }
        }
        Ok(())
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    // --- Broadcasting ---

    /// Broadcast a toast notification.
    pub fn notify(&self, notification: Notification) {
        let event = RegistryEvent::Notification { notification };
        self.broadcast(|sub| sub.caught_up && sub.wants_notifications(), event);
    }

    /// Broadcast a committed audit event as a change.
    pub fn broadcast_change(&self, event: &AuditEvent) {
        let change = ChangeEvent::from(event);
        let subject = change.subject.clone();
        self.broadcast(
            |sub| sub.caught_up && sub.matches_subject(&subject),
            RegistryEvent::Changed { change },
        );
    }

    /// Internal broadcast helper. Drops subscribers that fail to receive.
    fn broadcast<F>(&self, filter: F, event: RegistryEvent)
    where
        F: Fn(&Subscription) -> bool,
    {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            for (id, sub) in subs.iter() {
                if filter(sub) && !sub.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for id in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    tracing::warn!(subscription = id.0, "dropping slow subscriber");
                    let _ = sub.sender.try_send(RegistryEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }

    // --- Replay ---

    /// Send a historical change directly to one subscription, honouring its
    /// filter. Returns false if the subscription is gone or its buffer is full.
    pub fn replay_to(&self, id: SubscriptionId, event: &AuditEvent) -> bool {
        let subs = self.subscriptions.read();
        match subs.get(&id) {
            Some(sub) if sub.matches_subject(&event.subject) => sub.try_send(RegistryEvent::Changed {
                change: ChangeEvent::from(event),
            }),
            Some(_) => true,
            None => false,
        }
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}
