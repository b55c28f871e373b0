//! The three coordinated views of a queue.
//!
//! - `by_value`: every entry, ordered by value then key. Entries that compare
//!   equal stay in insertion order.
//! - `by_key`: key -> value -> identifiers of the entries holding that pair.
//! - `all_values`: distinct values with the number of entries holding each.
//!
//! Equal keys and equal values are stored once: an insert looks up the key
//! index and the registry first and reuses the handles it finds there.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::journal::{Journal, Undo};
use super::tree::{NodeId, Position, Tree};
use crate::handle::Handle;

// =============================================================================
// Index Items
// =============================================================================

/// Where an entry is filed in the key index and the registry.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct Slot {
    pub(crate) key_bucket: NodeId,
    pub(crate) value_bucket: NodeId,
    pub(crate) registered: NodeId,
}

impl Slot {
    /// Placeholder until the entry's buckets are linked.
    pub(crate) const PENDING: Self = Self {
        key_bucket: NodeId::MAX,
        value_bucket: NodeId::MAX,
        registered: NodeId::MAX,
    };
}

/// One stored pair.
pub(crate) struct Entry<K, V> {
    pub(crate) key: Handle<K>,
    pub(crate) value: Handle<V>,
    pub(crate) slot: Slot,
}

impl<K, V> Clone for Entry<K, V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: self.value.clone(),
            slot: self.slot,
        }
    }
}

/// All entries sharing one key, grouped by value.
pub(crate) struct KeyBucket<K, V> {
    pub(crate) key: Handle<K>,
    pub(crate) values: Tree<ValueBucket<V>>,
}

impl<K, V> KeyBucket<K, V> {
    pub(crate) fn new(key: Handle<K>) -> Self {
        Self {
            key,
            values: Tree::new(),
        }
    }
}

impl<K, V> Clone for KeyBucket<K, V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            values: self.values.clone(),
        }
    }
}

/// Entries sharing one key and one value.
pub(crate) struct ValueBucket<V> {
    pub(crate) value: Handle<V>,
    pub(crate) members: BTreeSet<NodeId>,
}

impl<V> ValueBucket<V> {
    pub(crate) const fn new(value: Handle<V>) -> Self {
        Self {
            value,
            members: BTreeSet::new(),
        }
    }
}

impl<V> Clone for ValueBucket<V> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            members: self.members.clone(),
        }
    }
}

/// A distinct stored value.
pub(crate) struct Registered<V> {
    pub(crate) value: Handle<V>,
    pub(crate) references: usize,
}

impl<V> Clone for Registered<V> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            references: self.references,
        }
    }
}

/// Primary order: value first, key as tiebreak.
fn compare_entries<K: Ord, V: Ord>(
    key: &Handle<K>,
    value: &Handle<V>,
    entry: &Entry<K, V>,
) -> Ordering {
    value.cmp(&entry.value).then_with(|| key.cmp(&entry.key))
}

// =============================================================================
// Views Definition
// =============================================================================

pub(crate) struct Views<K, V> {
    pub(crate) by_value: Tree<Entry<K, V>>,
    pub(crate) by_key: Tree<KeyBucket<K, V>>,
    pub(crate) all_values: Tree<Registered<V>>,
}

impl<K, V> Views<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            by_value: Tree::new(),
            by_key: Tree::new(),
            all_values: Tree::new(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.by_value.len()
    }

    /// Structural copy sharing every handle with `self`. Never calls user code.
    pub(crate) fn fork(&self) -> Self {
        Self {
            by_value: self.by_value.clone(),
            by_key: self.by_key.clone(),
            all_values: self.all_values.clone(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.by_value.clear();
        self.by_key.clear();
        self.all_values.clear();
    }

    /// Some entry filed under `key_bucket`.
    ///
    /// Which one is unspecified; currently the oldest entry with the smallest
    /// value.
    pub(crate) fn any_entry_of(&self, key_bucket: NodeId) -> Option<NodeId> {
        let values = &self.by_key.get(key_bucket).values;
        let members = &values.get(values.first()?).members;
        members.first().copied()
    }

    /// Removes an entry from all three views.
    ///
    /// Works from the identifiers stored in the entry, so it never compares
    /// and never panics for a linked `entry`.
    pub(crate) fn transactional_remove(&mut self, entry: NodeId) {
        let slot = self.by_value.get(entry).slot;

        let registered = self.all_values.get_mut(slot.registered);
        registered.references -= 1;
        if registered.references == 0 {
            self.all_values.unlink(slot.registered);
        }

        let values = &mut self.by_key.get_mut(slot.key_bucket).values;
        let members = &mut values.get_mut(slot.value_bucket).members;
        members.remove(&entry);
        if members.is_empty() {
            values.unlink(slot.value_bucket);
        }
        if values.is_empty() {
            self.by_key.unlink(slot.key_bucket);
        }

        self.by_value.unlink(entry);
    }

    /// Takes back one journaled step.
    pub(crate) fn undo(&mut self, step: Undo) {
        match step {
            Undo::Entry(entry) => {
                self.by_value.unlink(entry);
            }
            Undo::KeyBucket(key_bucket) => {
                self.by_key.unlink(key_bucket);
            }
            Undo::ValueBucket {
                key_bucket,
                value_bucket,
            } => {
                self.by_key.get_mut(key_bucket).values.unlink(value_bucket);
            }
            Undo::Member {
                key_bucket,
                value_bucket,
                entry,
            } => {
                self.by_key
                    .get_mut(key_bucket)
                    .values
                    .get_mut(value_bucket)
                    .members
                    .remove(&entry);
            }
            Undo::Registered(registered) => {
                self.all_values.unlink(registered);
            }
            Undo::Reference(registered) => {
                self.all_values.get_mut(registered).references -= 1;
            }
        }
    }
}

impl<K: Ord, V: Ord> Views<K, V> {
    /// Locates the key bucket for `key`.
    pub(crate) fn find_key<Q>(&self, key: &Q) -> Option<NodeId>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.by_key
            .search(|bucket| key.cmp(<K as Borrow<Q>>::borrow(&bucket.key)))
            .ok()
    }

    /// Adds an entry to all three views, or to none of them.
    ///
    /// All comparisons happen in a locate pass that mutates nothing. The link
    /// pass then attaches the entry at the positions found, recording each
    /// step in a [`Journal`] so that an unwind before the commit takes the
    /// partial insert back.
    pub(crate) fn transactional_insert(&mut self, key: Handle<K>, value: Handle<V>) -> NodeId {
        let key_bucket = self.by_key.search(|bucket| key.cmp(&bucket.key));
        let registered = self.all_values.search(|known| value.cmp(&known.value));

        let key = match key_bucket {
            Ok(found) => self.by_key.get(found).key.clone(),
            Err(_) => key,
        };
        let value = match registered {
            Ok(found) => self.all_values.get(found).value.clone(),
            Err(_) => value,
        };
        let value_bucket = match key_bucket {
            Ok(found) => self
                .by_key
                .get(found)
                .values
                .search(|bucket| value.cmp(&bucket.value)),
            Err(_) => Err(Position::EMPTY),
        };
        let position = self
            .by_value
            .upper_bound(|entry| compare_entries(&key, &value, entry));

        let mut journal = Journal::begin(self);
        let entry = journal.link_entry(position, key.clone(), value.clone());
        let key_bucket = match key_bucket {
            Ok(found) => found,
            Err(position) => journal.link_key_bucket(position, key),
        };
        let value_bucket = match value_bucket {
            Ok(found) => found,
            Err(position) => journal.link_value_bucket(key_bucket, position, value.clone()),
        };
        journal.add_member(key_bucket, value_bucket, entry);
        let registered = match registered {
            Ok(found) => {
                journal.add_reference(found);
                found
            }
            Err(position) => journal.link_registered(position, value),
        };
        journal.file_entry(
            entry,
            Slot {
                key_bucket,
                value_bucket,
                registered,
            },
        );
        journal.commit();

        entry
    }
}

impl<K: Clone, V: Clone> Views<K, V> {
    /// Copy that owns fresh clones of every distinct key and value.
    ///
    /// Each stored object is cloned exactly once and the copy keeps the
    /// sharing structure of `self`. A panicking `Clone` drops the partial
    /// copy; `self` is never touched.
    pub(crate) fn deep_copy(&self) -> Self {
        tracing::trace!(entries = self.len(), "deep-copying queue");
        let mut copy = self.fork();
        let Self {
            by_value,
            by_key,
            all_values,
        } = &mut copy;

        for (_, registered) in all_values.items_mut() {
            registered.value = Handle::new(V::clone(&registered.value));
        }
        for (_, bucket) in by_key.items_mut() {
            bucket.key = Handle::new(K::clone(&bucket.key));
            for (_, value_bucket) in bucket.values.items_mut() {
                if let Some(&sample) = value_bucket.members.first() {
                    let registered = by_value.get(sample).slot.registered;
                    value_bucket.value = all_values.get(registered).value.clone();
                }
            }
        }
        for (_, entry) in by_value.items_mut() {
            entry.key = by_key.get(entry.slot.key_bucket).key.clone();
            entry.value = all_values.get(entry.slot.registered).value.clone();
        }

        copy
    }
}

// =============================================================================
// Consistency Checks
// =============================================================================

#[cfg(test)]
impl<K: Ord + std::fmt::Debug, V: Ord + std::fmt::Debug> Views<K, V> {
    /// Panics unless every cross-view invariant holds.
    pub(crate) fn check_invariants(&self) {
        let mut filed = 0;
        for bucket in self.by_key.iter() {
            assert!(!bucket.values.is_empty(), "empty key bucket {:?}", bucket.key);
            for value_bucket in bucket.values.iter() {
                assert!(!value_bucket.members.is_empty(), "empty value bucket");
                filed += value_bucket.members.len();
            }
        }
        assert_eq!(filed, self.by_value.len(), "key index and primary order disagree");

        let referenced: usize = self.all_values.iter().map(|known| known.references).sum();
        assert_eq!(referenced, self.by_value.len(), "registry counts disagree");

        let entries: Vec<&Entry<K, V>> = self.by_value.iter().collect();
        for pair in entries.windows(2) {
            let ordering = pair[0]
                .value
                .cmp(&pair[1].value)
                .then_with(|| pair[0].key.cmp(&pair[1].key));
            assert_ne!(ordering, Ordering::Greater, "primary order out of order");
        }

        let mut previous: Option<NodeId> = None;
        let mut cursor = self.by_value.first();
        while let Some(id) = cursor {
            let entry = self.by_value.get(id);
            let slot = entry.slot;
            assert_ne!(slot, Slot::PENDING, "entry was never filed");

            let bucket = self.by_key.get(slot.key_bucket);
            assert!(bucket.key.ptr_eq(&entry.key), "key handle not shared");
            let value_bucket = bucket.values.get(slot.value_bucket);
            assert!(value_bucket.value.ptr_eq(&entry.value), "value handle not shared");
            assert!(value_bucket.members.contains(&id), "entry missing from bucket");

            let registered = self.all_values.get(slot.registered);
            assert!(registered.value.ptr_eq(&entry.value), "registry handle not shared");

            assert_eq!(self.by_value.predecessor(id), previous);
            previous = Some(id);
            cursor = self.by_value.successor(id);
        }
        assert_eq!(self.by_value.last(), previous);
    }
}
