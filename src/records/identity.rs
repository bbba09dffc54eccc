//! Identity records and their lifecycle states.

use crate::error::LedgerError;
use crate::records::collection::Keyed;
use crate::types::{AccountId, IdentityId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Verification state of an identity. Closed set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityState {
    Pending,
    Approved,
    Rejected,
    Obsoleted,
    Compromised,
}

impl IdentityState {
    pub const ALL: [IdentityState; 5] = [
        IdentityState::Pending,
        IdentityState::Approved,
        IdentityState::Rejected,
        IdentityState::Obsoleted,
        IdentityState::Compromised,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IdentityState::Pending => "pending",
            IdentityState::Approved => "approved",
            IdentityState::Rejected => "rejected",
            IdentityState::Obsoleted => "obsoleted",
            IdentityState::Compromised => "compromised",
        }
    }

    /// Target states offered as actions for a record in this state.
    pub fn actions(self) -> impl Iterator<Item = IdentityState> {
        IdentityState::ALL
            .into_iter()
            .filter(move |s| *s != self && *s != IdentityState::Pending)
    }
}

impl fmt::Display for IdentityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityState {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(IdentityState::Pending),
            "approved" => Ok(IdentityState::Approved),
            "rejected" => Ok(IdentityState::Rejected),
            "obsoleted" => Ok(IdentityState::Obsoleted),
            "compromised" => Ok(IdentityState::Compromised),
            other => Err(LedgerError::InvalidState(other.to_string())),
        }
    }
}

/// States a superseded identity can be archived in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetiredState {
    Obsoleted,
    Compromised,
    Rejected,
}

impl RetiredState {
    /// How a live state is archived: rejected and compromised records keep
    /// their verdict, everything else becomes obsoleted.
    pub fn from_live(state: IdentityState) -> Self {
        match state {
            IdentityState::Rejected => RetiredState::Rejected,
            IdentityState::Compromised => RetiredState::Compromised,
            _ => RetiredState::Obsoleted,
        }
    }
}

impl From<RetiredState> for IdentityState {
    fn from(state: RetiredState) -> Self {
        match state {
            RetiredState::Obsoleted => IdentityState::Obsoleted,
            RetiredState::Compromised => IdentityState::Compromised,
            RetiredState::Rejected => IdentityState::Rejected,
        }
    }
}

impl fmt::Display for RetiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        IdentityState::from(*self).fmt(f)
    }
}

/// The verification profile of a person tied to an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: IdentityId,
    pub account_id: AccountId,
    pub first_name: String,
    pub last_name: String,
    /// Opaque, never validated.
    pub identity_number: String,
    pub state: IdentityState,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub additional_fields: BTreeMap<String, String>,
    pub created_at: Timestamp,
}

impl IdentityRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_pending(&self) -> bool {
        self.state == IdentityState::Pending
    }

    /// Initial used by avatar placeholders.
    pub fn initial(&self) -> Option<char> {
        self.first_name.chars().next().map(|c| c.to_ascii_uppercase())
    }
}

impl Keyed for IdentityRecord {
    type Key = IdentityId;

    fn key(&self) -> &IdentityId {
        &self.id
    }
}

/// Input for creating an identity (before id/state/timestamp assigned).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewIdentity {
    pub account_id: AccountId,
    pub first_name: String,
    pub last_name: String,
    pub identity_number: String,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub additional_fields: BTreeMap<String, String>,
}

impl NewIdentity {
    pub fn new(
        account_id: impl Into<AccountId>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        identity_number: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            identity_number: identity_number.into(),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_profile_picture(mut self, url: impl Into<String>) -> Self {
        self.profile_picture = Some(url.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_fields.insert(name.into(), value.into());
        self
    }

    /// Value submitted for a named KYC field, if any and non-blank.
    ///
    /// Known names map onto record fields; everything else is looked up in
    /// `additional_fields`.
    pub fn field_value(&self, name: &str) -> Option<&str> {
        let value = match name {
            "firstName" => Some(self.first_name.as_str()),
            "lastName" => Some(self.last_name.as_str()),
            "identityNumber" => Some(self.identity_number.as_str()),
            "email" => self.email.as_deref(),
            "address" => self.address.as_deref(),
            "phone" => self.phone.as_deref(),
            "profilePicture" => self.profile_picture.as_deref(),
            other => self.additional_fields.get(other).map(String::as_str),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// Build the record. New identities always start pending.
    pub(crate) fn into_record(self, id: IdentityId, created_at: Timestamp) -> IdentityRecord {
        IdentityRecord {
            id,
            account_id: self.account_id,
            first_name: self.first_name,
            last_name: self.last_name,
            identity_number: self.identity_number,
            state: IdentityState::Pending,
            address: self.address,
            email: self.email,
            phone: self.phone,
            profile_picture: self.profile_picture,
            additional_fields: self.additional_fields,
            created_at,
        }
    }
}

/// Partial update of an identity's descriptive fields. State changes go
/// through the transition action only.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdentityPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub identity_number: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub additional_fields: BTreeMap<String, String>,
}

impl IdentityPatch {
    pub(crate) fn apply(self, record: &mut IdentityRecord) {
        if let Some(v) = self.first_name {
            record.first_name = v;
        }
        if let Some(v) = self.last_name {
            record.last_name = v;
        }
        if let Some(v) = self.identity_number {
            record.identity_number = v;
        }
        if let Some(v) = self.address {
            record.address = Some(v);
        }
        if let Some(v) = self.email {
            record.email = Some(v);
        }
        if let Some(v) = self.phone {
            record.phone = Some(v);
        }
        if let Some(v) = self.profile_picture {
            record.profile_picture = Some(v);
        }
        record.additional_fields.extend(self.additional_fields);
    }
}

/// Archived snapshot of an identity an account no longer uses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupersededIdentity {
    pub id: IdentityId,
    pub account_id: AccountId,
    pub first_name: String,
    pub last_name: String,
    pub identity_number: String,
    pub state: RetiredState,
    pub created_at: Timestamp,
    pub expired_at: Timestamp,
    pub reason: String,
    pub profile_picture: Option<String>,
}

impl SupersededIdentity {
    /// Retire a live record.
    pub fn retire(
        record: IdentityRecord,
        reason: impl Into<String>,
        expired_at: Timestamp,
    ) -> Self {
        Self {
            state: RetiredState::from_live(record.state),
            id: record.id,
            account_id: record.account_id,
            first_name: record.first_name,
            last_name: record.last_name,
            identity_number: record.identity_number,
            created_at: record.created_at,
            expired_at,
            reason: reason.into(),
            profile_picture: record.profile_picture,
        }
    }
}

impl Keyed for SupersededIdentity {
    type Key = IdentityId;

    fn key(&self) -> &IdentityId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_parse_and_display() {
        for state in IdentityState::ALL {
            assert_eq!(state.as_str().parse::<IdentityState>().unwrap(), state);
        }
        assert_eq!(" Approved ".parse::<IdentityState>().unwrap(), IdentityState::Approved);
        assert!(matches!(
            "verified".parse::<IdentityState>(),
            Err(LedgerError::InvalidState(s)) if s == "verified"
        ));
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&IdentityState::Compromised).unwrap();
        assert_eq!(json, "\"compromised\"");
    }

    #[test]
    fn test_actions_exclude_current_and_pending() {
        let actions: Vec<_> = IdentityState::Approved.actions().collect();
        assert_eq!(
            actions,
            vec![
                IdentityState::Rejected,
                IdentityState::Obsoleted,
                IdentityState::Compromised
            ]
        );
        assert_eq!(IdentityState::Pending.actions().count(), 4);
    }

    #[test]
    fn test_new_identity_starts_pending() {
        let record = NewIdentity::new("1", "John", "Smith", "ID1")
            .with_email("john@example.com")
            .into_record(IdentityId::new("identity1"), Timestamp(5));

        assert_eq!(record.state, IdentityState::Pending);
        assert_eq!(record.full_name(), "John Smith");
        assert_eq!(record.initial(), Some('J'));
        assert_eq!(record.created_at, Timestamp(5));
    }

    #[test]
    fn test_default_new_identity_is_blank() {
        let input = NewIdentity::default();
        assert_eq!(input.account_id, AccountId::default());
        assert!(input.account_id.as_str().is_empty());
        assert!(input.email.is_none());
    }

    #[test]
    fn test_field_value_mapping() {
        let input = NewIdentity::new("1", "John", "", "ID1")
            .with_address("1 Main St")
            .with_field("dateOfBirth", "1985-05-15")
            .with_field("nationality", "  ");

        assert_eq!(input.field_value("firstName"), Some("John"));
        assert_eq!(input.field_value("lastName"), None);
        assert_eq!(input.field_value("address"), Some("1 Main St"));
        assert_eq!(input.field_value("dateOfBirth"), Some("1985-05-15"));
        assert_eq!(input.field_value("nationality"), None);
        assert_eq!(input.field_value("email"), None);
    }

    #[test]
    fn test_retire_keeps_verdict() {
        let mut record = NewIdentity::new("5", "Robert", "Chen", "ID7")
            .into_record(IdentityId::new("identity5"), Timestamp(1));

        record.state = IdentityState::Compromised;
        let retired = SupersededIdentity::retire(record.clone(), "Security breach", Timestamp(2));
        assert_eq!(retired.state, RetiredState::Compromised);

        record.state = IdentityState::Approved;
        let retired = SupersededIdentity::retire(record, "Address change", Timestamp(2));
        assert_eq!(retired.state, RetiredState::Obsoleted);
        assert_eq!(retired.reason, "Address change");
    }

    #[test]
    fn test_patch_leaves_state_alone() {
        let mut record = NewIdentity::new("1", "John", "Smith", "ID1")
            .into_record(IdentityId::new("identity1"), Timestamp(1));

        IdentityPatch {
            address: Some("New address".into()),
            additional_fields: [("nationality".to_string(), "US".to_string())].into(),
            ..Default::default()
        }
        .apply(&mut record);

        assert_eq!(record.address.as_deref(), Some("New address"));
        assert_eq!(record.additional_fields["nationality"], "US");
        assert_eq!(record.state, IdentityState::Pending);
        assert_eq!(record.first_name, "John");
    }
}
