//! Record types held by the registry.
//!
//! Every record kind lives in an insertion-ordered [`Collection`] so list
//! views keep the order records were added in.

mod account;
mod collection;
mod identity;

pub use account::{
    AccountPatch, AccountRecord, AccountStatus, ActivityInput, ActivityItem, ActivityKind,
    NewAccount,
};
pub use collection::{Collection, Keyed};
pub use identity::{
    IdentityPatch, IdentityRecord, IdentityState, NewIdentity, RetiredState, SupersededIdentity,
};
