//! Audit trail for registry mutations.
//!
//! Every registry operation that changes state appends one or more events
//! here. Events are never edited or removed, and each one carries the hash
//! of its predecessor:
//!
//! ```text
//! hash(n) = SHA-256(hash(n-1) || json(sequence, subject, kind, timestamp))
//! ```
//!
//! Identity history for an account is read back from this log rather than
//! stored on the records.

mod log;
mod types;

pub use log::{verify_chain, AuditLog};
pub use types::{AuditEvent, AuditKind, AuditSubject};
