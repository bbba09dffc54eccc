//! # Identity Ledger
//!
//! An in-memory registry of user accounts and the verified identities
//! attached to them, with the console configuration around them.
//!
//! ## Core Concepts
//!
//! - **Accounts**: Login profiles with status, contact details and history
//! - **Identities**: One live verification record per account, moving through
//!   pending, approved, rejected, obsoleted and compromised
//! - **Superseded identities**: Read-only snapshots of identities an account
//!   has replaced
//! - **Access**: Roles, permissions and API keys
//! - **Settings**: KYC field requirements, auth methods and security policy
//! - **Audit**: Every mutation is appended to a hash-chained log and fanned
//!   out to subscribers
//!
//! ## Example
//!
//! ```ignore
//! use identity_ledger::{IdentityId, IdentityState, Registry, RegistryConfig};
//!
//! let registry = Registry::with_demo_data(RegistryConfig::default())?;
//!
//! let updated = registry.update_identity_state(
//!     &IdentityId::from("identity2"),
//!     IdentityState::Approved,
//! )?;
//! assert_eq!(updated.state, IdentityState::Approved);
//!
//! let split = registry.identity_partition();
//! assert!(split.pending.is_empty());
//! ```

pub mod access;
pub mod audit;
pub mod error;
pub mod records;
pub mod registry;
pub mod seed;
pub mod settings;
pub mod state;
pub mod subscriptions;
pub mod types;
pub mod views;

// Re-exports
pub use access::{ApiKey, NewRole, Permission, Role, RoleOption, RolePatch};
pub use audit::{verify_chain, AuditEvent, AuditKind, AuditLog, AuditSubject};
pub use error::{LedgerError, Result};
pub use records::{
    AccountPatch, AccountRecord, AccountStatus, ActivityInput, ActivityItem, ActivityKind,
    IdentityPatch, IdentityRecord, IdentityState, NewAccount, NewIdentity, RetiredState,
    SupersededIdentity,
};
pub use registry::{Registry, RegistryConfig, SUPERSEDED_REASON};
pub use seed::SeedData;
pub use settings::{
    AuthMethod, ConsoleSettings, KycField, KycFieldKind, KycSettings, KycToggle, SecuritySettings,
};
pub use state::{apply_transition, transition, transition_in, TransitionPolicy};
pub use subscriptions::{
    ChangeEvent, DropReason, Notification, RegistryEvent, Severity, SubscriptionConfig,
    SubscriptionFilter, SubscriptionHandle, SubscriptionId,
};
pub use types::*;
pub use views::{
    AccountDetail, AccountSummary, AccountTab, ActivityGroups, IdentityPartition, RegistryStats,
};
