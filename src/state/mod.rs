//! Identity lifecycle: the transition action and its validation policy.

mod operations;
mod policy;

pub use operations::{apply_transition, transition, transition_in};
pub use policy::TransitionPolicy;
