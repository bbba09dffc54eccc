//! Insertion-ordered keyed collection backing every record kind.

use crate::error::{LedgerError, Result};
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

/// A record that carries its own key.
pub trait Keyed {
    type Key: Clone + Eq + Hash + Display;

    fn key(&self) -> &Self::Key;
}

/// Ordered map: iteration follows insertion order, lookups go through a
/// key -> position index.
#[derive(Clone, Debug)]
pub struct Collection<V: Keyed> {
    items: Vec<V>,
    positions: HashMap<V::Key, usize>,
}

impl<V: Keyed> Default for Collection<V> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<V: Keyed> Collection<V> {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record at the end. Fails if the key is taken.
    pub fn insert(&mut self, value: V) -> Result<()> {
        let key = value.key().clone();
        if self.positions.contains_key(&key) {
            return Err(LedgerError::DuplicateId(key.to_string()));
        }
        self.positions.insert(key, self.items.len());
        self.items.push(value);
        Ok(())
    }

    /// Replace the record with the same key in place, returning the old one.
    pub fn replace(&mut self, value: V) -> Option<V> {
        let pos = *self.positions.get(value.key())?;
        Some(std::mem::replace(&mut self.items[pos], value))
    }

    /// Apply `f` to the record under `key` and return the updated record.
    pub fn update<F>(&mut self, key: &V::Key, f: F) -> Option<&V>
    where
        F: FnOnce(&mut V),
    {
        let pos = *self.positions.get(key)?;
        f(&mut self.items[pos]);
        Some(&self.items[pos])
    }

    /// Remove the record under `key`.
    pub fn remove(&mut self, key: &V::Key) -> Option<V> {
        let pos = self.positions.remove(key)?;
        let removed = self.items.remove(pos);
        for item in &self.items[pos..] {
            if let Some(p) = self.positions.get_mut(item.key()) {
                *p -= 1;
            }
        }
        Some(removed)
    }

    /// Remove every record matching `pred`, returning them in order.
    pub fn remove_where<F>(&mut self, pred: F) -> Vec<V>
    where
        F: Fn(&V) -> bool,
    {
        let (removed, kept): (Vec<V>, Vec<V>) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|v| pred(v));

        self.positions = kept
            .iter()
            .enumerate()
            .map(|(i, v)| (v.key().clone(), i))
            .collect();
        self.items = kept;

        removed
    }

    pub fn get(&self, key: &V::Key) -> Option<&V> {
        self.positions.get(key).map(|&pos| &self.items[pos])
    }

    pub fn contains(&self, key: &V::Key) -> bool {
        self.positions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &V> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[V] {
        &self.items
    }

    /// Build from `values` in order. Fails on the first duplicate key.
    pub fn try_from_iter<I>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
    {
        let mut collection = Collection::new();
        for value in values {
            collection.insert(value)?;
        }
        Ok(collection)
    }
}

impl<V: Keyed + Clone> Collection<V> {
    /// Clone every record out, in insertion order.
    pub fn to_vec(&self) -> Vec<V> {
        self.items.clone()
    }
}
