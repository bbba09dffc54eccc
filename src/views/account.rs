//! Account read models: list summaries and the detail view.

use crate::error::LedgerError;
use crate::records::{
    AccountRecord, ActivityItem, ActivityKind, IdentityRecord, IdentityState, SupersededIdentity,
};
use crate::views::search::Searchable;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// An account with its identity status read through from the identity
/// collection. Never stored, so it cannot go stale.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AccountSummary {
    #[serde(flatten)]
    pub account: AccountRecord,
    pub has_identity: bool,
    pub identity_status: Option<IdentityState>,
}

impl AccountSummary {
    pub fn derive(account: &AccountRecord, identity: Option<&IdentityRecord>) -> Self {
        Self {
            account: account.clone(),
            has_identity: identity.is_some(),
            identity_status: identity.map(|i| i.state),
        }
    }
}

impl Searchable for AccountSummary {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        self.account.search_fields()
    }
}

/// Activities grouped for the history tabs, newest first.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ActivityGroups {
    pub all: Vec<ActivityItem>,
    pub login: Vec<ActivityItem>,
    pub contract: Vec<ActivityItem>,
    pub identity: Vec<ActivityItem>,
    pub other: Vec<ActivityItem>,
}

impl ActivityGroups {
    pub fn from_items(mut items: Vec<ActivityItem>) -> Self {
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let of_kind = |kind: ActivityKind| -> Vec<ActivityItem> {
            items.iter().filter(|a| a.kind == kind).cloned().collect()
        };

        Self {
            login: of_kind(ActivityKind::Login),
            contract: of_kind(ActivityKind::Contract),
            identity: of_kind(ActivityKind::Identity),
            other: items
                .iter()
                .filter(|a| matches!(a.kind, ActivityKind::Other(_)))
                .cloned()
                .collect(),
            all: items,
        }
    }
}

/// Everything the account detail screen shows.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AccountDetail {
    pub summary: AccountSummary,
    pub identity: Option<IdentityRecord>,
    pub superseded: Vec<SupersededIdentity>,
    pub activities: ActivityGroups,
}

/// Tab selector carried by the account detail route.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountTab {
    #[default]
    Details,
    Identity,
    History,
}

impl AccountTab {
    /// Parse an optional query value, falling back to the details tab.
    pub fn from_query(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for AccountTab {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "details" => Ok(AccountTab::Details),
            "identity" => Ok(AccountTab::Identity),
            "history" => Ok(AccountTab::History),
            other => Err(LedgerError::InvalidState(other.to_string())),
        }
    }
}

impl fmt::Display for AccountTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountTab::Details => f.write_str("details"),
            AccountTab::Identity => f.write_str("identity"),
            AccountTab::History => f.write_str("history"),
        }
    }
}
