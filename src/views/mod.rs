//! Derived read models.
//!
//! Nothing here is cached: every view is recomputed from the live
//! collections on each call.

mod account;
mod partition;
mod search;
mod stats;

pub use account::{AccountDetail, AccountSummary, AccountTab, ActivityGroups};
pub use partition::{partition, IdentityPartition};
pub use search::{filter, matches, Searchable};
pub use stats::{count_by_state, RegistryStats};
