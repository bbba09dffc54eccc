//! The identity state transition.

use crate::error::Result;
use crate::records::{IdentityRecord, IdentityState};
use crate::state::policy::TransitionPolicy;
use crate::types::IdentityId;

/// Produce a record identical to `record` except for `state`.
///
/// This is the bare transition: no precondition is checked and
/// `created_at` is left untouched. Same-state "transitions" are allowed.
pub fn transition(record: &IdentityRecord, target: IdentityState) -> IdentityRecord {
    IdentityRecord {
        state: target,
        ..record.clone()
    }
}

/// Check `target` against `policy`, then transition.
pub fn apply_transition(
    policy: TransitionPolicy,
    record: &IdentityRecord,
    target: IdentityState,
) -> Result<IdentityRecord> {
    policy.check(record.state, target)?;
    Ok(transition(record, target))
}

/// Apply a transition to the record with `id` inside a slice, returning the
/// updated records. Unknown ids leave the slice as it was.
pub fn transition_in(
    records: &[IdentityRecord],
    id: &IdentityId,
    target: IdentityState,
) -> Vec<IdentityRecord> {
    records
        .iter()
        .map(|r| if &r.id == id { transition(r, target) } else { r.clone() })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::records::NewIdentity;
    use crate::types::{IdentityId, Timestamp};

    fn record(id: &str, state: IdentityState) -> IdentityRecord {
        let mut r = NewIdentity::new("acct", "John", "Smith", "ID123")
            .with_email("john.smith@example.com")
            .into_record(IdentityId::new(id), Timestamp(100));
        r.state = state;
        r
    }

    #[test]
    fn test_transition_changes_only_state() {
        let before = record("1", IdentityState::Pending);
        let after = transition(&before, IdentityState::Approved);

        assert_eq!(after.state, IdentityState::Approved);
        assert_eq!(IdentityRecord { state: before.state, ..after }, before);
    }

    #[test]
    fn test_same_state_is_noop() {
        let before = record("1", IdentityState::Rejected);
        assert_eq!(transition(&before, IdentityState::Rejected), before);
    }

    #[test]
    fn test_transition_in_slice() {
        let records = vec![
            record("1", IdentityState::Pending),
            record("2", IdentityState::Approved),
        ];

        let updated = transition_in(&records, &IdentityId::new("1"), IdentityState::Approved);
        assert!(updated.iter().all(|r| r.state == IdentityState::Approved));
        assert_eq!(updated[0].id, IdentityId::new("1"));

        let unchanged = transition_in(&records, &IdentityId::new("9"), IdentityState::Compromised);
        assert_eq!(unchanged, records);
    }

    #[test]
    fn test_apply_transition_respects_policy() {
        let obsolete = record("1", IdentityState::Obsoleted);

        let permissive = apply_transition(TransitionPolicy::Permissive, &obsolete, IdentityState::Pending);
        assert_eq!(permissive.unwrap().state, IdentityState::Pending);

        let strict = apply_transition(TransitionPolicy::Lifecycle, &obsolete, IdentityState::Pending);
        assert!(matches!(strict, Err(LedgerError::InvalidTransition { .. })));
    }
}
