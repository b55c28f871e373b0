//! Priority queue of key-value pairs with duplicate support.
//!
//! This module provides [`PriorityQueue`], a container of `(key, value)` pairs
//! ordered by value (the priority), with the key as a tiebreak. Keys and
//! values may repeat, and the same pair may be stored more than once.
//!
//! # Panic Safety
//!
//! Every operation either completes or leaves the queue exactly as it was.
//! If a key or value type panics in `Ord::cmp` or `Clone::clone`, the queue
//! restores its previous contents before the panic leaves the call, so a
//! caller that catches the unwind sees the same pairs, in the same order, as
//! before.
//!
//! # Time Complexity
//!
//! | Operation        | Complexity         |
//! |------------------|--------------------|
//! | `min_value` etc. | O(1)               |
//! | `insert`         | O(log n) expected  |
//! | `delete_min`     | O(log n) expected  |
//! | `delete_max`     | O(log n) expected  |
//! | `change_value`   | O(log n) expected  |
//! | `merge`          | O(n + m log(n+m))  |
//! | `swap`           | O(1)               |
//! | `clone`          | O(n)               |
//!
//! # Examples
//!
//! ```rust
//! use kvqueue::PriorityQueue;
//!
//! let mut queue = PriorityQueue::new();
//! queue.insert("backup", 3);
//! queue.insert("deploy", 1);
//! queue.insert("review", 2);
//!
//! assert_eq!(queue.min_key(), Ok(&"deploy"));
//! queue.delete_min();
//! assert_eq!(queue.min_key(), Ok(&"review"));
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::iter::FusedIterator;

use crate::error::QueueError;
use crate::handle::Handle;
use crate::index::Views;
use crate::index::tree;
use crate::index::views::Entry;

// =============================================================================
// PriorityQueue Definition
// =============================================================================

/// A priority queue of `(key, value)` pairs that allows duplicates.
///
/// Pairs are kept in ascending order of value, then key. Equal pairs keep
/// their insertion order among themselves.
///
/// # Type Parameters
///
/// - `K`: the key type. Needs `Ord` for insertion and lookup.
/// - `V`: the value (priority) type. Needs `Ord` for insertion.
///
/// `Clone` on the queue additionally needs `K: Clone` and `V: Clone`, and
/// clones each distinct key and value once.
///
/// # Examples
///
/// ```rust
/// use kvqueue::PriorityQueue;
///
/// let mut queue = PriorityQueue::new();
/// queue.insert(1, 10);
/// queue.insert(1, 10);
/// queue.insert(2, 5);
///
/// assert_eq!(queue.len(), 3);
/// assert_eq!(queue.min_value(), Ok(&5));
/// assert_eq!(queue.max_key(), Ok(&1));
/// ```
pub struct PriorityQueue<K, V> {
    views: Views<K, V>,
}

#[cfg(not(feature = "arc"))]
static_assertions::assert_not_impl_any!(PriorityQueue<i32, i32>: Send, Sync);

#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(PriorityQueue<i32, String>: Send, Sync);

impl<K, V> PriorityQueue<K, V> {
    /// Creates a new empty queue.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvqueue::PriorityQueue;
    ///
    /// let queue: PriorityQueue<String, u32> = PriorityQueue::new();
    /// assert!(queue.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            views: Views::new(),
        }
    }

    /// Returns the number of stored pairs, duplicates included.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Returns `true` if the queue holds no pairs.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.len() == 0
    }

    fn entry(&self, id: tree::NodeId) -> (&K, &V) {
        let entry = self.views.by_value.get(id);
        (&*entry.key, &*entry.value)
    }

    /// Returns the pair with the smallest value, if any.
    ///
    /// Among pairs with the smallest value, the one with the smallest key is
    /// returned.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvqueue::PriorityQueue;
    ///
    /// let mut queue = PriorityQueue::new();
    /// assert_eq!(queue.peek_min(), None);
    ///
    /// queue.insert('b', 1);
    /// queue.insert('a', 1);
    /// assert_eq!(queue.peek_min(), Some((&'a', &1)));
    /// ```
    #[must_use]
    pub fn peek_min(&self) -> Option<(&K, &V)> {
        self.views.by_value.first().map(|id| self.entry(id))
    }

    /// Returns the pair with the largest value, if any.
    ///
    /// Among pairs with the largest value, the one with the largest key is
    /// returned.
    #[must_use]
    pub fn peek_max(&self) -> Option<(&K, &V)> {
        self.views.by_value.last().map(|id| self.entry(id))
    }

    /// Returns the smallest stored value.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::EmptyQueue`] if the queue is empty.
    pub fn min_value(&self) -> Result<&V, QueueError> {
        self.peek_min()
            .map(|(_, value)| value)
            .ok_or(QueueError::EmptyQueue)
    }

    /// Returns the largest stored value.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::EmptyQueue`] if the queue is empty.
    pub fn max_value(&self) -> Result<&V, QueueError> {
        self.peek_max()
            .map(|(_, value)| value)
            .ok_or(QueueError::EmptyQueue)
    }

    /// Returns the key of the pair holding the smallest value.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::EmptyQueue`] if the queue is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvqueue::{PriorityQueue, QueueError};
    ///
    /// let mut queue = PriorityQueue::new();
    /// assert_eq!(queue.min_key(), Err(QueueError::EmptyQueue));
    ///
    /// queue.insert("low", 1);
    /// queue.insert("high", 9);
    /// assert_eq!(queue.min_key(), Ok(&"low"));
    /// ```
    pub fn min_key(&self) -> Result<&K, QueueError> {
        self.peek_min()
            .map(|(key, _)| key)
            .ok_or(QueueError::EmptyQueue)
    }

    /// Returns the key of the pair holding the largest value.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::EmptyQueue`] if the queue is empty.
    pub fn max_key(&self) -> Result<&K, QueueError> {
        self.peek_max()
            .map(|(key, _)| key)
            .ok_or(QueueError::EmptyQueue)
    }

    /// Removes one pair with the smallest value. Does nothing on an empty
    /// queue.
    ///
    /// Never calls `Ord` or `Clone` on the stored types, so it cannot panic
    /// through them.
    pub fn delete_min(&mut self) {
        if let Some(entry) = self.views.by_value.first() {
            self.views.transactional_remove(entry);
        }
    }

    /// Removes one pair with the largest value. Does nothing on an empty
    /// queue.
    pub fn delete_max(&mut self) {
        if let Some(entry) = self.views.by_value.last() {
            self.views.transactional_remove(entry);
        }
    }

    /// Exchanges the contents of two queues in constant time.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvqueue::PriorityQueue;
    ///
    /// let mut left = PriorityQueue::new();
    /// left.insert(1, 1);
    /// let mut right = PriorityQueue::new();
    ///
    /// left.swap(&mut right);
    /// assert!(left.is_empty());
    /// assert_eq!(right.len(), 1);
    /// ```
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.views, &mut other.views);
    }

    /// Removes every pair.
    pub fn clear(&mut self) {
        self.views.clear();
    }

    /// Returns an iterator over the pairs in ascending order of value, then
    /// key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvqueue::PriorityQueue;
    ///
    /// let queue: PriorityQueue<_, _> = [(3, 'a'), (1, 'b'), (2, 'a')].into_iter().collect();
    /// let pairs: Vec<_> = queue.iter().collect();
    /// assert_eq!(pairs, vec![(&2, &'a'), (&3, &'a'), (&1, &'b')]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.views.by_value.iter(),
        }
    }
}

impl<K: Ord, V: Ord> PriorityQueue<K, V> {
    /// Adds a pair.
    ///
    /// If a panic escapes from `K::cmp` or `V::cmp`, the queue is left
    /// unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvqueue::PriorityQueue;
    ///
    /// let mut queue = PriorityQueue::new();
    /// queue.insert("job", 4);
    /// queue.insert("job", 4);
    /// assert_eq!(queue.len(), 2);
    /// ```
    pub fn insert(&mut self, key: K, value: V) {
        self.views
            .transactional_insert(Handle::new(key), Handle::new(value));
    }

    /// Replaces the value of one pair stored under `key`.
    ///
    /// When several pairs share `key`, which of them is changed is
    /// unspecified. Exactly one pair is affected and the length is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::KeyNotFound`] if no pair has the given key. The
    /// queue is not modified in that case.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvqueue::{PriorityQueue, QueueError};
    ///
    /// let mut queue = PriorityQueue::new();
    /// queue.insert("task", 5);
    /// queue.insert("other", 3);
    ///
    /// queue.change_value("task", 1).unwrap();
    /// assert_eq!(queue.min_key(), Ok(&"task"));
    /// assert_eq!(queue.change_value("missing", 0), Err(QueueError::KeyNotFound));
    /// ```
    pub fn change_value<Q>(&mut self, key: &Q, value: V) -> Result<(), QueueError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let old = self
            .views
            .find_key(key)
            .and_then(|key_bucket| self.views.any_entry_of(key_bucket))
            .ok_or(QueueError::KeyNotFound)?;
        let key = self.views.by_value.get(old).key.clone();

        self.views.transactional_insert(key, Handle::new(value));
        self.views.transactional_remove(old);
        Ok(())
    }

    /// Moves every pair of `other` into `self`, leaving `other` empty.
    ///
    /// The pairs are inserted into a working copy of `self` that replaces
    /// `self` only once every insertion has succeeded. If a comparison
    /// panics, both queues are left unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvqueue::PriorityQueue;
    ///
    /// let mut left = PriorityQueue::new();
    /// left.insert(1, 10);
    /// let mut right = PriorityQueue::new();
    /// right.insert(2, 20);
    /// right.insert(3, 30);
    ///
    /// left.merge(&mut right);
    /// assert_eq!(left.len(), 3);
    /// assert_eq!(left.max_value(), Ok(&30));
    /// assert!(right.is_empty());
    /// ```
    pub fn merge(&mut self, other: &mut Self) {
        if other.is_empty() {
            return;
        }
        tracing::trace!(
            incoming = other.len(),
            existing = self.len(),
            "merging queues"
        );

        let mut merged = self.views.fork();
        for entry in other.views.by_value.iter() {
            merged.transactional_insert(entry.key.clone(), entry.value.clone());
        }

        self.views = merged;
        other.views.clear();
    }

    /// Returns the value of one pair stored under `key`.
    ///
    /// When several pairs share `key`, the smallest of their values is
    /// returned.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvqueue::PriorityQueue;
    ///
    /// let mut queue = PriorityQueue::new();
    /// queue.insert(String::from("a"), 7);
    /// queue.insert(String::from("a"), 2);
    ///
    /// assert_eq!(queue.get("a"), Some(&2));
    /// assert_eq!(queue.get("b"), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let values = &self.views.by_key.get(self.views.find_key(key)?).values;
        Some(&*values.get(values.first()?).value)
    }

    /// Returns `true` if at least one pair has the given key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.views.find_key(key).is_some()
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K: Clone, V: Clone> Clone for PriorityQueue<K, V> {
    /// Copies the queue, cloning each distinct key and value once.
    ///
    /// If a `Clone` panics, the partial copy is dropped and `self` is not
    /// affected.
    fn clone(&self) -> Self {
        Self {
            views: self.views.deep_copy(),
        }
    }
}

impl<K, V> Default for PriorityQueue<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for PriorityQueue<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}

impl<K: fmt::Display, V: fmt::Display> fmt::Display for PriorityQueue<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "[")?;
        let mut first = true;
        for (key, value) in self {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{key}: {value}")?;
        }
        write!(formatter, "]")
    }
}

impl<K: Ord, V: Ord> FromIterator<(K, V)> for PriorityQueue<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut queue = Self::new();
        queue.extend(iter);
        queue
    }
}

impl<K: Ord, V: Ord> Extend<(K, V)> for PriorityQueue<K, V> {
    /// Inserts each pair in turn. A panic keeps the pairs inserted before it.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'a, K, V> IntoIterator for &'a PriorityQueue<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over the pairs of a [`PriorityQueue`], in ascending order of
/// value, then key.
///
/// Created by [`PriorityQueue::iter`].
pub struct Iter<'a, K, V> {
    inner: tree::Iter<'a, Entry<K, V>>,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|entry| (&*entry.key, &*entry.value))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner
            .next_back()
            .map(|entry| (&*entry.key, &*entry.value))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn queue_of(pairs: &[(i32, i32)]) -> PriorityQueue<i32, i32> {
        pairs.iter().copied().collect()
    }

    fn pairs(queue: &PriorityQueue<i32, i32>) -> Vec<(i32, i32)> {
        queue.iter().map(|(key, value)| (*key, *value)).collect()
    }

    #[rstest]
    fn test_insert_keeps_views_consistent() {
        let queue = queue_of(&[(3, 1), (1, 3), (2, 2), (1, 3), (3, 2)]);

        assert_eq!(queue.len(), 5);
        queue.views.check_invariants();
    }

    #[rstest]
    #[case(&[], None, None)]
    #[case(&[(1, 5)], Some((1, 5)), Some((1, 5)))]
    #[case(&[(4, 2), (1, 2), (9, 7), (0, 7)], Some((1, 2)), Some((9, 7)))]
    fn test_peek_extremes(
        #[case] input: &[(i32, i32)],
        #[case] minimum: Option<(i32, i32)>,
        #[case] maximum: Option<(i32, i32)>,
    ) {
        let queue = queue_of(input);

        assert_eq!(queue.peek_min().map(|(k, v)| (*k, *v)), minimum);
        assert_eq!(queue.peek_max().map(|(k, v)| (*k, *v)), maximum);
    }

    #[rstest]
    fn test_delete_min_and_max_on_empty_queue_do_nothing() {
        let mut queue: PriorityQueue<i32, i32> = PriorityQueue::new();
        queue.delete_min();
        queue.delete_max();

        assert!(queue.is_empty());
    }

    #[rstest]
    fn test_delete_removes_one_duplicate_at_a_time() {
        let mut queue = queue_of(&[(1, 1), (1, 1), (2, 2)]);

        queue.delete_min();
        assert_eq!(pairs(&queue), vec![(1, 1), (2, 2)]);
        queue.delete_max();
        assert_eq!(pairs(&queue), vec![(1, 1)]);
        queue.views.check_invariants();
    }

    #[rstest]
    fn test_change_value_replaces_exactly_one_pair() {
        let mut queue = queue_of(&[(1, 4), (1, 6), (2, 5)]);

        queue.change_value(&1, 9).unwrap();

        assert_eq!(queue.len(), 3);
        let under_one: Vec<i32> = queue
            .iter()
            .filter(|(key, _)| **key == 1)
            .map(|(_, value)| *value)
            .collect();
        assert_eq!(under_one.len(), 2);
        assert!(under_one.contains(&9));
        assert!(under_one.contains(&4) || under_one.contains(&6));
        queue.views.check_invariants();
    }

    #[rstest]
    fn test_change_value_to_same_value_keeps_queue() {
        let mut queue = queue_of(&[(1, 4), (2, 4)]);

        queue.change_value(&2, 4).unwrap();

        assert_eq!(pairs(&queue), vec![(1, 4), (2, 4)]);
        queue.views.check_invariants();
    }

    #[rstest]
    fn test_change_value_on_missing_key_leaves_queue_alone() {
        let mut queue = queue_of(&[(1, 4)]);

        assert_eq!(queue.change_value(&2, 0), Err(QueueError::KeyNotFound));
        assert_eq!(pairs(&queue), vec![(1, 4)]);
    }

    #[rstest]
    fn test_merge_shares_handles_with_source() {
        let mut left = queue_of(&[(1, 10)]);
        let mut right = queue_of(&[(1, 10), (2, 20)]);

        left.merge(&mut right);

        assert_eq!(pairs(&left), vec![(1, 10), (1, 10), (2, 20)]);
        assert!(right.is_empty());
        assert_eq!(left.views.by_key.len(), 2);
        assert_eq!(left.views.all_values.len(), 2);
        left.views.check_invariants();
        right.views.check_invariants();
    }

    #[rstest]
    fn test_merge_with_empty_queue_keeps_contents() {
        let mut left = queue_of(&[(1, 10)]);
        let mut right = PriorityQueue::new();

        left.merge(&mut right);
        right.merge(&mut left);

        assert!(left.is_empty());
        assert_eq!(pairs(&right), vec![(1, 10)]);
    }

    #[rstest]
    fn test_clone_is_independent() {
        let original = queue_of(&[(1, 1), (2, 2)]);
        let mut copy = original.clone();
        copy.delete_min();

        assert_eq!(original.len(), 2);
        assert_eq!(copy.len(), 1);
        copy.views.check_invariants();
    }

    #[rstest]
    fn test_get_returns_smallest_value_for_key() {
        let queue = queue_of(&[(1, 8), (1, 3), (2, 1)]);

        assert_eq!(queue.get(&1), Some(&3));
        assert!(queue.contains_key(&2));
        assert!(!queue.contains_key(&3));
    }

    #[rstest]
    fn test_iter_is_double_ended_and_exact() {
        let queue = queue_of(&[(1, 3), (2, 1), (3, 2)]);
        let mut iter = queue.iter();

        assert_eq!(iter.len(), 3);
        assert_eq!(iter.next(), Some((&2, &1)));
        assert_eq!(iter.next_back(), Some((&1, &3)));
        assert_eq!(iter.len(), 1);
        assert_eq!(iter.next(), Some((&3, &2)));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next_back(), None);
    }

    #[rstest]
    fn test_display_and_debug() {
        let queue = queue_of(&[(2, 20), (1, 10)]);

        assert_eq!(format!("{queue}"), "[1: 10, 2: 20]");
        assert_eq!(format!("{queue:?}"), "[(1, 10), (2, 20)]");
    }
}
