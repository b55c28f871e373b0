//! Undo log for a transactional insert.
//!
//! Every linking step of [`Views::transactional_insert`] goes through a
//! [`Journal`], which applies the step and records how to take it back.
//! Dropping the journal without [`Journal::commit`] (normally because a panic
//! is unwinding) replays the recorded steps in reverse order. Undoing only
//! ever unlinks by node identifier, so it never calls user code.
//!
//! [`Views::transactional_insert`]: super::views::Views::transactional_insert

use arrayvec::ArrayVec;

use super::tree::{NodeId, Position};
use super::views::{Entry, KeyBucket, Registered, Slot, ValueBucket, Views};
use crate::handle::Handle;

/// Upper bound on recorded steps: entry, key bucket, value bucket, member,
/// registry.
const MAX_STEPS: usize = 5;

/// How to take back one applied step.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Undo {
    /// Unlink an entry from the primary order.
    Entry(NodeId),
    /// Unlink a key bucket from the key index.
    KeyBucket(NodeId),
    /// Unlink a value bucket from its key bucket.
    ValueBucket { key_bucket: NodeId, value_bucket: NodeId },
    /// Remove an entry from a value bucket's member set.
    Member {
        key_bucket: NodeId,
        value_bucket: NodeId,
        entry: NodeId,
    },
    /// Unlink a value from the registry.
    Registered(NodeId),
    /// Give back one reference on a registered value.
    Reference(NodeId),
}

/// Applies linking steps to [`Views`] and rolls them back unless committed.
pub(crate) struct Journal<'a, K, V> {
    views: &'a mut Views<K, V>,
    steps: ArrayVec<Undo, MAX_STEPS>,
    committed: bool,
}

impl<'a, K, V> Journal<'a, K, V> {
    pub(crate) fn begin(views: &'a mut Views<K, V>) -> Self {
        Self {
            views,
            steps: ArrayVec::new(),
            committed: false,
        }
    }

    /// Keeps every recorded step.
    pub(crate) fn commit(mut self) {
        self.committed = true;
    }

    fn record(&mut self, undo: Undo) {
        self.steps.push(undo);
    }

    pub(crate) fn link_entry(
        &mut self,
        position: Position,
        key: Handle<K>,
        value: Handle<V>,
    ) -> NodeId {
        let entry = self.views.by_value.link(
            position,
            Entry {
                key,
                value,
                slot: Slot::PENDING,
            },
        );
        self.record(Undo::Entry(entry));
        entry
    }

    pub(crate) fn link_key_bucket(&mut self, position: Position, key: Handle<K>) -> NodeId {
        let key_bucket = self.views.by_key.link(position, KeyBucket::new(key));
        self.record(Undo::KeyBucket(key_bucket));
        key_bucket
    }

    pub(crate) fn link_value_bucket(
        &mut self,
        key_bucket: NodeId,
        position: Position,
        value: Handle<V>,
    ) -> NodeId {
        let value_bucket = self
            .views
            .by_key
            .get_mut(key_bucket)
            .values
            .link(position, ValueBucket::new(value));
        self.record(Undo::ValueBucket {
            key_bucket,
            value_bucket,
        });
        value_bucket
    }

    pub(crate) fn add_member(&mut self, key_bucket: NodeId, value_bucket: NodeId, entry: NodeId) {
        self.views
            .by_key
            .get_mut(key_bucket)
            .values
            .get_mut(value_bucket)
            .members
            .insert(entry);
        self.record(Undo::Member {
            key_bucket,
            value_bucket,
            entry,
        });
    }

    pub(crate) fn link_registered(&mut self, position: Position, value: Handle<V>) -> NodeId {
        let registered = self.views.all_values.link(
            position,
            Registered {
                value,
                references: 1,
            },
        );
        self.record(Undo::Registered(registered));
        registered
    }

    pub(crate) fn add_reference(&mut self, registered: NodeId) {
        self.views.all_values.get_mut(registered).references += 1;
        self.record(Undo::Reference(registered));
    }

    /// Stores where `entry` is filed. Undone together with the entry itself.
    pub(crate) fn file_entry(&mut self, entry: NodeId, slot: Slot) {
        self.views.by_value.get_mut(entry).slot = slot;
    }
}

impl<K, V> Drop for Journal<'_, K, V> {
    fn drop(&mut self) {
        if self.committed || self.steps.is_empty() {
            return;
        }
        tracing::debug!(steps = self.steps.len(), "rolling back unfinished insert");
        while let Some(step) = self.steps.pop() {
            self.views.undo(step);
        }
    }
}
