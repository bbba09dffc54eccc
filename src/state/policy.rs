//! Transition validation.

use crate::error::{LedgerError, Result};
use crate::records::IdentityState;
use serde::{Deserialize, Serialize};

/// Which identity transitions the registry accepts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Any state may move to any state, including itself.
    #[default]
    Permissive,

    /// Verification lifecycle:
    /// - pending -> approved | rejected
    /// - approved -> obsoleted | compromised
    /// - rejected -> pending (resubmission)
    /// - obsoleted, compromised: terminal
    ///
    /// Self transitions are refused.
    Lifecycle,
}

impl TransitionPolicy {
    /// Whether `from -> to` is allowed.
    pub fn allows(self, from: IdentityState, to: IdentityState) -> bool {
        use IdentityState::*;

        match self {
            TransitionPolicy::Permissive => true,
            TransitionPolicy::Lifecycle => matches!(
                (from, to),
                (Pending, Approved)
                    | (Pending, Rejected)
                    | (Approved, Obsoleted)
                    | (Approved, Compromised)
                    | (Rejected, Pending)
            ),
        }
    }

    pub fn check(self, from: IdentityState, to: IdentityState) -> Result<()> {
        if self.allows(from, to) {
            Ok(())
        } else {
            Err(LedgerError::InvalidTransition { from, to })
        }
    }

    /// Targets reachable from `from`, in declaration order.
    pub fn targets(self, from: IdentityState) -> Vec<IdentityState> {
        IdentityState::ALL
            .into_iter()
            .filter(|to| self.allows(from, *to))
            .collect()
    }

    /// A state with no outgoing transitions.
    pub fn is_terminal(self, state: IdentityState) -> bool {
        self.targets(state).is_empty()
    }
}
