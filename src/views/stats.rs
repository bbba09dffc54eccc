//! Dashboard counters.

use crate::records::{IdentityRecord, IdentityState};
use serde::Serialize;
use std::collections::BTreeMap;

/// Registry statistics.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RegistryStats {
    pub account_count: usize,
    pub identity_count: usize,
    pub pending_applications: usize,
    pub compromised_identities: usize,
    pub identities_by_state: BTreeMap<IdentityState, usize>,
    pub superseded_count: usize,
    pub api_key_count: usize,
    pub role_count: usize,
    pub enabled_auth_methods: usize,
    pub audit_events: u64,
}

/// Count identities per state. Every state is present, zero if unused.
pub fn count_by_state(identities: &[IdentityRecord]) -> BTreeMap<IdentityState, usize> {
    let mut counts: BTreeMap<IdentityState, usize> =
        IdentityState::ALL.iter().map(|s| (*s, 0)).collect();
    for identity in identities {
        *counts.entry(identity.state).or_default() += 1;
    }
    counts
}
