//! Current vs. pending split used by the identity tabs.

use crate::records::IdentityRecord;
use serde::Serialize;

/// Identities split by whether they await review.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct IdentityPartition {
    /// Every record whose state is not pending.
    pub current: Vec<IdentityRecord>,
    /// Records awaiting approval or rejection.
    pub pending: Vec<IdentityRecord>,
}

impl IdentityPartition {
    pub fn len(&self) -> usize {
        self.current.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.pending.is_empty()
    }
}

/// Split `records` on `state == pending`. Both halves keep input order.
pub fn partition(records: &[IdentityRecord]) -> IdentityPartition {
    let (pending, current): (Vec<_>, Vec<_>) =
        records.iter().cloned().partition(|r| r.is_pending());
    IdentityPartition { current, pending }
}
