//! Append-only, hash-chained audit log.

use super::types::{compute_hash, AuditEvent, AuditKind, AuditSubject, HashedFields};
use crate::error::{LedgerError, Result};
use crate::types::{Hash, Sequence, Timestamp};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Append-only audit log.
///
/// Each event's hash covers the previous event's hash, so editing or
/// removing any entry breaks `verify`.
pub struct AuditLog {
    /// Events in append order.
    events: RwLock<Vec<AuditEvent>>,

    /// Subject to positions in `events`.
    by_subject: RwLock<HashMap<AuditSubject, Vec<usize>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            by_subject: RwLock::new(HashMap::new()),
        }
    }

    /// Append an event stamped with the current time.
    pub fn append(&self, subject: AuditSubject, kind: AuditKind) -> Result<AuditEvent> {
        self.append_at(subject, kind, Timestamp::now())
    }

    /// Append an event with an explicit timestamp.
    pub fn append_at(
        &self,
        subject: AuditSubject,
        kind: AuditKind,
        timestamp: Timestamp,
    ) -> Result<AuditEvent> {
        let mut events = self.events.write();

        let (sequence, prev_hash) = match events.last() {
            Some(last) => (last.sequence.next(), last.hash),
            None => (Sequence(1), Hash::ZERO),
        };

        let hash = compute_hash(
            &prev_hash,
            &HashedFields {
                sequence,
                subject: &subject,
                kind: &kind,
                timestamp,
            },
        )?;

        let event = AuditEvent {
            sequence,
            subject,
            kind,
            timestamp,
            prev_hash,
            hash,
        };

        self.by_subject
            .write()
            .entry(event.subject.clone())
            .or_default()
            .push(events.len());
        events.push(event.clone());

        Ok(event)
    }

    /// Events about `subject`, oldest first.
    pub fn events_for(&self, subject: &AuditSubject) -> Vec<AuditEvent> {
        let events = self.events.read();
        self.by_subject
            .read()
            .get(subject)
            .map(|positions| positions.iter().map(|&i| events[i].clone()).collect())
            .unwrap_or_default()
    }

    /// Events matching `pred`, oldest first.
    pub fn events_where<F>(&self, pred: F) -> Vec<AuditEvent>
    where
        F: Fn(&AuditEvent) -> bool,
    {
        self.events.read().iter().filter(|e| pred(e)).cloned().collect()
    }

    /// All events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().clone()
    }

    /// The last `n` events, oldest first.
    pub fn tail(&self, n: usize) -> Vec<AuditEvent> {
        let events = self.events.read();
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    /// Hash of the newest event.
    pub fn head(&self) -> Hash {
        self.events.read().last().map(|e| e.hash).unwrap_or(Hash::ZERO)
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Recompute the chain from the start.
    pub fn verify(&self) -> Result<()> {
        verify_chain(&self.events.read())
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Check that `events` form an unbroken chain from `Hash::ZERO`.
pub fn verify_chain(events: &[AuditEvent]) -> Result<()> {
    let mut prev = Hash::ZERO;
    for (i, event) in events.iter().enumerate() {
        let expected_seq = Sequence(i as u64 + 1);
        if event.sequence != expected_seq {
            return Err(LedgerError::Corruption(format!(
                "audit sequence gap: expected {expected_seq}, found {}",
                event.sequence
            )));
        }
        if event.prev_hash != prev {
            return Err(LedgerError::Corruption(format!(
                "audit event {} does not link to its predecessor",
                event.sequence
            )));
        }
        if event.compute_hash()? != event.hash {
            return Err(LedgerError::Corruption(format!(
                "audit event {} hash mismatch",
                event.sequence
            )));
        }
        prev = event.hash;
    }
    Ok(())
}
