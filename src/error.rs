//! Error types for the identity ledger.

use crate::records::IdentityState;
use crate::types::{AccountId, ApiKeyId, IdentityId, KycFieldId, PermissionId, RoleId};
use thiserror::Error;

/// Main error type for registry operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Identity not found: {0}")]
    IdentityNotFound(IdentityId),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("API key not found: {0}")]
    ApiKeyNotFound(ApiKeyId),

    #[error("Role not found: {0}")]
    RoleNotFound(RoleId),

    #[error("Permission not found: {0}")]
    PermissionNotFound(PermissionId),

    #[error("KYC field not found: {0}")]
    KycFieldNotFound(KycFieldId),

    #[error("Authentication method not found: {0}")]
    AuthMethodNotFound(String),

    #[error("Required field missing: {0}")]
    MissingField(String),

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: IdentityState,
        to: IdentityState,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Role is a system role and cannot be modified: {0}")]
    SystemRole(RoleId),

    #[error("Role is still assigned to {keys} API key(s): {role}")]
    RoleInUse { role: RoleId, keys: usize },

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Index out of bounds: {index} (len={len})")]
    OutOfBounds { index: usize, len: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Subscription was dropped")]
    SubscriptionDropped,
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
