//! Audit event types.

use crate::records::{AccountStatus, IdentityState};
use crate::types::{AccountId, ActivityId, ApiKeyId, Hash, IdentityId, RoleId, Sequence, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an audit event is about.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum AuditSubject {
    Identity(IdentityId),
    Account(AccountId),
    ApiKey(ApiKeyId),
    Role(RoleId),
    Settings,
}

impl fmt::Display for AuditSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditSubject::Identity(id) => write!(f, "identity/{id}"),
            AuditSubject::Account(id) => write!(f, "account/{id}"),
            AuditSubject::ApiKey(id) => write!(f, "api_key/{id}"),
            AuditSubject::Role(id) => write!(f, "role/{id}"),
            AuditSubject::Settings => f.write_str("settings"),
        }
    }
}

/// What happened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditKind {
    IdentityCreated {
        account_id: AccountId,
    },
    IdentityStateChanged {
        account_id: AccountId,
        from: IdentityState,
        to: IdentityState,
    },
    IdentitySuperseded {
        account_id: AccountId,
        replaced_by: IdentityId,
        retired_as: IdentityState,
    },
    IdentityUpdated {
        account_id: AccountId,
    },
    AccountCreated,
    AccountUpdated,
    AccountStatusChanged {
        from: AccountStatus,
        to: AccountStatus,
    },
    AccountDeleted,
    LoginRecorded {
        activity: ActivityId,
    },
    ActivityRecorded {
        activity: ActivityId,
    },
    ApiKeyCreated {
        role: RoleId,
    },
    ApiKeyRegenerated,
    ApiKeyUsed,
    ApiKeyRevoked,
    RoleCreated,
    RoleUpdated,
    RoleDeleted,
    KycSettingsUpdated {
        fields: usize,
    },
    AuthMethodToggled {
        method: String,
        enabled: bool,
    },
    SecuritySettingsUpdated,
}

impl AuditKind {
    /// Account an identity event belongs to, if any.
    pub fn identity_account(&self) -> Option<&AccountId> {
        match self {
            AuditKind::IdentityCreated { account_id }
            | AuditKind::IdentityStateChanged { account_id, .. }
            | AuditKind::IdentitySuperseded { account_id, .. }
            | AuditKind::IdentityUpdated { account_id } => Some(account_id),
            _ => None,
        }
    }
}

/// One entry in the audit log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub sequence: Sequence,
    pub subject: AuditSubject,
    pub kind: AuditKind,
    pub timestamp: Timestamp,
    pub prev_hash: Hash,
    pub hash: Hash,
}

/// The hashed portion of an event.
#[derive(Serialize)]
pub(crate) struct HashedFields<'a> {
    pub sequence: Sequence,
    pub subject: &'a AuditSubject,
    pub kind: &'a AuditKind,
    pub timestamp: Timestamp,
}

impl AuditEvent {
    /// Recompute this event's hash from its fields and `prev_hash`.
    pub fn compute_hash(&self) -> crate::error::Result<Hash> {
        compute_hash(
            &self.prev_hash,
            &HashedFields {
                sequence: self.sequence,
                subject: &self.subject,
                kind: &self.kind,
                timestamp: self.timestamp,
            },
        )
    }
}

pub(crate) fn compute_hash(prev: &Hash, fields: &HashedFields<'_>) -> crate::error::Result<Hash> {
    let bytes = serde_json::to_vec(fields)?;
    Ok(Hash::chained(prev, &bytes))
}
