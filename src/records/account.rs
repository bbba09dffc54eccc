//! Account records and account activity.

use crate::error::{LedgerError, Result};
use crate::records::collection::Keyed;
use crate::types::{AccountId, ActivityId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account-level lifecycle, independent of identity state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            "suspended" => Ok(AccountStatus::Suspended),
            other => Err(LedgerError::InvalidState(other.to_string())),
        }
    }
}

/// A user/tenant entity.
///
/// Whether the account has an identity, and that identity's state, are not
/// stored here: they are read from the identity collection on demand (see
/// `AccountSummary`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    #[serde(default)]
    pub status: AccountStatus,
    pub created_at: Timestamp,
    pub last_login: Option<Timestamp>,
    pub avatar: Option<String>,
}

impl Keyed for AccountRecord {
    type Key = AccountId;

    fn key(&self) -> &AccountId {
        &self.id
    }
}

/// Input for creating an account.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub status: Option<AccountStatus>,
    pub avatar: Option<String>,
}

impl NewAccount {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone_number = phone.into();
        self
    }

    pub fn with_status(mut self, status: AccountStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    /// Name and email are required; values are trimmed.
    pub(crate) fn into_record(self, id: AccountId, created_at: Timestamp) -> Result<AccountRecord> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(LedgerError::MissingField("name".into()));
        }
        let email = self.email.trim().to_string();
        if email.is_empty() {
            return Err(LedgerError::MissingField("email".into()));
        }

        Ok(AccountRecord {
            id,
            name,
            email,
            phone_number: self.phone_number.trim().to_string(),
            status: self.status.unwrap_or_default(),
            created_at,
            last_login: None,
            avatar: self.avatar,
        })
    }
}

/// Partial account update.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub status: Option<AccountStatus>,
    pub avatar: Option<String>,
}

impl AccountPatch {
    /// Blank names or emails are refused rather than applied.
    pub(crate) fn validate(&self) -> Result<()> {
        if matches!(&self.name, Some(n) if n.trim().is_empty()) {
            return Err(LedgerError::MissingField("name".into()));
        }
        if matches!(&self.email, Some(e) if e.trim().is_empty()) {
            return Err(LedgerError::MissingField("email".into()));
        }
        Ok(())
    }

    pub(crate) fn apply(self, record: &mut AccountRecord) {
        if let Some(v) = self.name {
            record.name = v.trim().to_string();
        }
        if let Some(v) = self.email {
            record.email = v.trim().to_string();
        }
        if let Some(v) = self.phone_number {
            record.phone_number = v.trim().to_string();
        }
        if let Some(v) = self.status {
            record.status = v;
        }
        if let Some(v) = self.avatar {
            record.avatar = Some(v);
        }
    }
}

/// Kind of an account activity entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Login,
    Contract,
    Identity,
    Other(String),
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityKind::Login => f.write_str("login"),
            ActivityKind::Contract => f.write_str("contract"),
            ActivityKind::Identity => f.write_str("identity"),
            ActivityKind::Other(kind) => f.write_str(kind),
        }
    }
}

/// One entry in an account's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityItem {
    pub id: ActivityId,
    pub account_id: AccountId,
    pub kind: ActivityKind,
    pub description: String,
    pub timestamp: Timestamp,
    pub ip_address: Option<String>,
    pub device: Option<String>,
    pub document_id: Option<String>,
}

impl Keyed for ActivityItem {
    type Key = ActivityId;

    fn key(&self) -> &ActivityId {
        &self.id
    }
}

/// Input for recording an activity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityInput {
    pub kind: ActivityKind,
    pub description: String,
    pub timestamp: Option<Timestamp>,
    pub ip_address: Option<String>,
    pub device: Option<String>,
    pub document_id: Option<String>,
}

impl ActivityInput {
    pub fn new(kind: ActivityKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            timestamp: None,
            ip_address: None,
            device: None,
            document_id: None,
        }
    }

    pub fn login(description: impl Into<String>) -> Self {
        Self::new(ActivityKind::Login, description)
    }

    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn from_device(mut self, ip_address: impl Into<String>, device: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self.device = Some(device.into());
        self
    }

    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub(crate) fn into_item(self, id: ActivityId, account_id: AccountId) -> ActivityItem {
        ActivityItem {
            id,
            account_id,
            kind: self.kind,
            description: self.description,
            timestamp: self.timestamp.unwrap_or_else(Timestamp::now),
            ip_address: self.ip_address,
            device: self.device,
            document_id: self.document_id,
        }
    }
}
