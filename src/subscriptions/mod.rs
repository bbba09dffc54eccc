//! In-process subscriptions to registry events.
//!
//! Two kinds of events flow through the bus:
//! - Notifications: the transient success/error messages shown to the
//!   operator after an action
//! - Changes: one event per committed audit entry
//!
//! Subscriptions support:
//! - Filtering by event kind and subject category
//! - Replay of audit history from a given sequence
//! - Bounded buffers with slow-subscriber dropping
//!
//! # Example
//!
//! ```ignore
//! let registry = Registry::with_demo_data(RegistryConfig::default())?;
//! let handle = registry.subscribe(SubscriptionConfig {
//!     filter: SubscriptionFilter::notifications(),
//!     ..Default::default()
//! })?;
//!
//! loop {
//!     match handle.recv() {
//!         Ok(RegistryEvent::Notification { notification }) => println!("{}", notification.title),
//!         Ok(RegistryEvent::Dropped { .. }) | Err(_) => break,
//!         Ok(_) => {}
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::{subject_category, NotificationBus};
pub use types::{
    ChangeEvent, DropReason, Notification, RegistryEvent, Severity, SubscriptionConfig,
    SubscriptionFilter, SubscriptionHandle, SubscriptionId,
};
