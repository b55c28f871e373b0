//! Slab-backed ordered tree with stable node identifiers.
//!
//! [`Tree`] is the building block of every index in the queue. It splits the
//! usual "insert" into two halves:
//!
//! - [`Tree::search`] / [`Tree::upper_bound`] walk the tree with a probe
//!   closure and return either the matching node or a vacant [`Position`].
//!   This is the only place user comparison runs.
//! - [`Tree::link`] attaches an item at a previously found position and
//!   [`Tree::unlink`] detaches a node by identifier. Neither calls the probe
//!   or any user code.
//!
//! A failed search therefore leaves the tree untouched, and anything that was
//! linked can be taken back by identifier without comparing again.
//!
//! # Internal Structure
//!
//! The tree is a treap: a binary search tree on the items that is also a
//! max-heap on random node priorities, which keeps the expected height at
//! O(log N). Nodes live in a [`Slab`] and refer to each other by index, so
//! identifiers stay valid until the node is unlinked. The first and last
//! nodes are cached for O(1) access to the extremities.

use std::cmp::Ordering;
use std::fmt;
use std::iter::FusedIterator;

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use slab::Slab;

/// Stable identifier of a node inside one [`Tree`].
pub(crate) type NodeId = usize;

const PRIORITY_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

// =============================================================================
// Node Definition
// =============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Side {
    Left,
    Right,
}

#[derive(Clone)]
struct Node<T> {
    item: T,
    priority: u64,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

/// A vacant child slot found by a search.
///
/// Only valid for the tree it came from, and only until that tree is next
/// mutated.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct Position {
    parent: Option<NodeId>,
    side: Side,
    /// The search never turned right, so the slot precedes every node.
    leftmost: bool,
    /// The search never turned left, so the slot follows every node.
    rightmost: bool,
}

impl Position {
    /// The only vacant slot of an empty tree.
    pub(crate) const EMPTY: Self = Self {
        parent: None,
        side: Side::Left,
        leftmost: true,
        rightmost: true,
    };
}

// =============================================================================
// Tree Definition
// =============================================================================

/// An ordered collection of `T` addressed by stable [`NodeId`]s.
///
/// The tree does not know how items are ordered; callers supply the order
/// through probe closures at search time and must use the same order for
/// every search on a given tree.
///
/// # Time Complexity
///
/// | Operation            | Complexity        |
/// |----------------------|-------------------|
/// | `search`             | O(log N) expected |
/// | `upper_bound`        | O(log N) expected |
/// | `link`               | O(log N) expected |
/// | `unlink`             | O(log N) expected |
/// | `first`/`last`       | O(1)              |
/// | `get`/`get_mut`      | O(1)              |
/// | `len`                | O(1)              |
#[derive(Clone)]
pub(crate) struct Tree<T> {
    nodes: Slab<Node<T>>,
    root: Option<NodeId>,
    first: Option<NodeId>,
    last: Option<NodeId>,
    priorities: SmallRng,
}

impl<T> Tree<T> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Slab::new(),
            root: None,
            first: None,
            last: None,
            priorities: SmallRng::seed_from_u64(PRIORITY_SEED),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Identifier of the smallest node.
    #[inline]
    pub(crate) const fn first(&self) -> Option<NodeId> {
        self.first
    }

    /// Identifier of the largest node.
    #[inline]
    pub(crate) const fn last(&self) -> Option<NodeId> {
        self.last
    }

    /// # Panics
    ///
    /// Panics if `id` is not linked in this tree.
    #[inline]
    pub(crate) fn get(&self, id: NodeId) -> &T {
        &self.nodes[id].item
    }

    /// Mutable access to an item.
    ///
    /// The caller must not change anything the tree's order depends on.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not linked in this tree.
    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut T {
        &mut self.nodes[id].item
    }

    /// Mutable access to every item, in no particular order.
    ///
    /// Same restriction as [`Tree::get_mut`].
    pub(crate) fn items_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut T)> {
        self.nodes.iter_mut().map(|(id, node)| (id, &mut node.item))
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.first = None;
        self.last = None;
    }

    /// Items in ascending order.
    pub(crate) fn iter(&self) -> Iter<'_, T> {
        Iter {
            tree: self,
            front: self.first,
            back: self.last,
            remaining: self.len(),
        }
    }

    /// Looks for a node the probe reports as `Equal`.
    ///
    /// `probe` returns how the sought item orders relative to the node item
    /// it is given.
    pub(crate) fn search<F>(&self, mut probe: F) -> Result<NodeId, Position>
    where
        F: FnMut(&T) -> Ordering,
    {
        self.descend(|item| match probe(item) {
            Ordering::Equal => None,
            ordering => Some(ordering),
        })
    }

    /// Finds the slot after every node the probe reports as `Equal`.
    ///
    /// Linking there keeps equal items in insertion order.
    pub(crate) fn upper_bound<F>(&self, mut probe: F) -> Position
    where
        F: FnMut(&T) -> Ordering,
    {
        match self.descend(|item| match probe(item) {
            Ordering::Less => Some(Ordering::Less),
            Ordering::Equal | Ordering::Greater => Some(Ordering::Greater),
        }) {
            Ok(_) => unreachable!("upper_bound never stops on a node"),
            Err(position) => position,
        }
    }

    /// Walks down from the root; `step` returns `None` to stop on a node.
    fn descend<F>(&self, mut step: F) -> Result<NodeId, Position>
    where
        F: FnMut(&T) -> Option<Ordering>,
    {
        let mut position = Position::EMPTY;
        let mut cursor = self.root;

        while let Some(id) = cursor {
            let node = &self.nodes[id];
            position.parent = Some(id);
            match step(&node.item) {
                None => return Ok(id),
                Some(Ordering::Less) => {
                    position.side = Side::Left;
                    position.rightmost = false;
                    cursor = node.left;
                }
                Some(_) => {
                    position.side = Side::Right;
                    position.leftmost = false;
                    cursor = node.right;
                }
            }
        }

        Err(position)
    }

    /// Attaches `item` at `position` and returns its identifier.
    pub(crate) fn link(&mut self, position: Position, item: T) -> NodeId {
        let priority = self.priorities.next_u64();
        let id = self.nodes.insert(Node {
            item,
            priority,
            parent: position.parent,
            left: None,
            right: None,
        });

        match position.parent {
            None => self.root = Some(id),
            Some(parent) => match position.side {
                Side::Left => self.nodes[parent].left = Some(id),
                Side::Right => self.nodes[parent].right = Some(id),
            },
        }
        if position.leftmost {
            self.first = Some(id);
        }
        if position.rightmost {
            self.last = Some(id);
        }

        while let Some(parent) = self.nodes[id].parent {
            if self.nodes[parent].priority >= priority {
                break;
            }
            self.rotate_up(id);
        }

        id
    }

    /// Detaches the node `id` and returns its item.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not linked in this tree.
    pub(crate) fn unlink(&mut self, id: NodeId) -> T {
        if self.first == Some(id) {
            self.first = self.successor(id);
        }
        if self.last == Some(id) {
            self.last = self.predecessor(id);
        }

        // Rotate the node down until it has at most one child.
        while let (Some(left), Some(right)) = (self.nodes[id].left, self.nodes[id].right) {
            let heavier = if self.nodes[left].priority > self.nodes[right].priority {
                left
            } else {
                right
            };
            self.rotate_up(heavier);
        }

        let node = self.nodes.remove(id);
        let child = node.left.or(node.right);
        if let Some(child) = child {
            self.nodes[child].parent = node.parent;
        }
        self.replace_child(node.parent, id, child);

        node.item
    }

    /// In-order successor of `id`.
    pub(crate) fn successor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(mut cursor) = self.nodes[id].right {
            while let Some(left) = self.nodes[cursor].left {
                cursor = left;
            }
            return Some(cursor);
        }

        let mut child = id;
        while let Some(parent) = self.nodes[child].parent {
            if self.nodes[parent].left == Some(child) {
                return Some(parent);
            }
            child = parent;
        }
        None
    }

    /// In-order predecessor of `id`.
    pub(crate) fn predecessor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(mut cursor) = self.nodes[id].left {
            while let Some(right) = self.nodes[cursor].right {
                cursor = right;
            }
            return Some(cursor);
        }

        let mut child = id;
        while let Some(parent) = self.nodes[child].parent {
            if self.nodes[parent].right == Some(child) {
                return Some(parent);
            }
            child = parent;
        }
        None
    }

    /// Rotates `id` above its parent. In-order sequence is unchanged.
    fn rotate_up(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id].parent else {
            return;
        };
        let grandparent = self.nodes[parent].parent;

        if self.nodes[parent].left == Some(id) {
            let inner = self.nodes[id].right;
            self.nodes[parent].left = inner;
            self.nodes[id].right = Some(parent);
            if let Some(inner) = inner {
                self.nodes[inner].parent = Some(parent);
            }
        } else {
            let inner = self.nodes[id].left;
            self.nodes[parent].right = inner;
            self.nodes[id].left = Some(parent);
            if let Some(inner) = inner {
                self.nodes[inner].parent = Some(parent);
            }
        }

        self.nodes[parent].parent = Some(id);
        self.nodes[id].parent = grandparent;
        self.replace_child(grandparent, parent, Some(id));
    }

    fn replace_child(&mut self, parent: Option<NodeId>, old: NodeId, new: Option<NodeId>) {
        match parent {
            None => self.root = new,
            Some(parent) => {
                let node = &mut self.nodes[parent];
                if node.left == Some(old) {
                    node.left = new;
                } else {
                    node.right = new;
                }
            }
        }
    }
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Tree<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// In-order iterator over the items of a [`Tree`].
pub(crate) struct Iter<'a, T> {
    tree: &'a Tree<T>,
    front: Option<NodeId>,
    back: Option<NodeId>,
    remaining: usize,
}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            front: self.front,
            back: self.back,
            remaining: self.remaining,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.front?;
        self.remaining -= 1;
        self.front = self.tree.successor(id);
        Some(self.tree.get(id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.back?;
        self.remaining -= 1;
        self.back = self.tree.predecessor(id);
        Some(self.tree.get(id))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<T> FusedIterator for Iter<'_, T> {}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn insert_unique(tree: &mut Tree<i32>, value: i32) -> NodeId {
        match tree.search(|item| value.cmp(item)) {
            Ok(id) => id,
            Err(position) => tree.link(position, value),
        }
    }

    fn insert_multi(tree: &mut Tree<(i32, u32)>, value: i32, tag: u32) -> NodeId {
        let position = tree.upper_bound(|item| value.cmp(&item.0));
        tree.link(position, (value, tag))
    }

    /// Checks links, ordering, heap property and cached extremities.
    fn assert_well_formed<T: Ord>(tree: &Tree<T>) {
        let mut count = 0;
        if let Some(root) = tree.root {
            assert_eq!(tree.nodes[root].parent, None);
        }
        for (id, node) in &tree.nodes {
            count += 1;
            for child in [node.left, node.right].into_iter().flatten() {
                assert_eq!(tree.nodes[child].parent, Some(id));
                assert!(tree.nodes[child].priority <= node.priority);
            }
        }
        assert_eq!(count, tree.len());

        let items: Vec<&T> = tree.iter().collect();
        assert_eq!(items.len(), tree.len());
        assert!(items.windows(2).all(|pair| pair[0] <= pair[1]));

        let reversed: Vec<&T> = tree.iter().rev().collect();
        assert!(reversed.iter().rev().eq(items.iter()));

        match (tree.first, tree.last) {
            (Some(first), Some(last)) => {
                assert_eq!(tree.predecessor(first), None);
                assert_eq!(tree.successor(last), None);
            }
            (None, None) => assert!(tree.is_empty()),
            _ => panic!("first and last must be set together"),
        }
    }

    #[rstest]
    fn test_new_tree_is_empty() {
        let tree: Tree<i32> = Tree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.first(), None);
        assert_eq!(tree.last(), None);
        assert_eq!(tree.iter().next(), None);
    }

    #[rstest]
    fn test_link_keeps_items_sorted() {
        let mut tree = Tree::new();
        for value in [50, 20, 80, 10, 30, 70, 90, 60, 40] {
            insert_unique(&mut tree, value);
        }

        assert_well_formed(&tree);
        let items: Vec<i32> = tree.iter().copied().collect();
        assert_eq!(items, vec![10, 20, 30, 40, 50, 60, 70, 80, 90]);
    }

    #[rstest]
    fn test_search_finds_existing_item() {
        let mut tree = Tree::new();
        let id = insert_unique(&mut tree, 7);
        insert_unique(&mut tree, 3);
        insert_unique(&mut tree, 11);

        assert_eq!(tree.search(|item| 7.cmp(item)), Ok(id));
        assert!(tree.search(|item| 8.cmp(item)).is_err());
    }

    #[rstest]
    fn test_first_and_last_track_extremities() {
        let mut tree = Tree::new();
        let middle = insert_unique(&mut tree, 5);
        assert_eq!(tree.first(), Some(middle));
        assert_eq!(tree.last(), Some(middle));

        let low = insert_unique(&mut tree, 1);
        let high = insert_unique(&mut tree, 9);
        assert_eq!(tree.first(), Some(low));
        assert_eq!(tree.last(), Some(high));

        tree.unlink(low);
        assert_eq!(tree.first(), Some(middle));
        tree.unlink(high);
        assert_eq!(tree.last(), Some(middle));
        tree.unlink(middle);
        assert_eq!(tree.first(), None);
        assert_eq!(tree.last(), None);
    }

    #[rstest]
    fn test_upper_bound_keeps_equal_items_in_insertion_order() {
        let mut tree = Tree::new();
        for (tag, value) in [3, 1, 3, 2, 3, 1].into_iter().enumerate() {
            insert_multi(&mut tree, value, u32::try_from(tag).unwrap());
        }

        assert_well_formed(&tree);
        let items: Vec<(i32, u32)> = tree.iter().copied().collect();
        assert_eq!(items, vec![(1, 1), (1, 5), (2, 3), (3, 0), (3, 2), (3, 4)]);
    }

    #[rstest]
    fn test_unlink_returns_item_and_keeps_order() {
        let mut tree = Tree::new();
        let ids: Vec<NodeId> = (0..64).map(|value| insert_unique(&mut tree, value)).collect();

        for (value, id) in ids.iter().enumerate().filter(|(value, _)| value % 3 == 0) {
            assert_eq!(tree.unlink(*id), i32::try_from(value).unwrap());
            assert_well_formed(&tree);
        }

        let items: Vec<i32> = tree.iter().copied().collect();
        let expected: Vec<i32> = (0..64).filter(|value| value % 3 != 0).collect();
        assert_eq!(items, expected);
    }

    #[rstest]
    fn test_identifiers_survive_unrelated_mutation() {
        let mut tree = Tree::new();
        let kept = insert_unique(&mut tree, 42);
        for value in 0..32 {
            insert_unique(&mut tree, value);
        }
        for value in 0..16 {
            let id = tree.search(|item| value.cmp(item)).unwrap();
            tree.unlink(id);
        }

        assert_eq!(*tree.get(kept), 42);
        assert_well_formed(&tree);
    }

    #[rstest]
    fn test_link_then_unlink_restores_sequence() {
        let mut tree = Tree::new();
        for value in [4, 8, 15, 16, 23, 42] {
            insert_unique(&mut tree, value);
        }
        let before: Vec<i32> = tree.iter().copied().collect();

        let position = tree.search(|item| 20.cmp(item)).unwrap_err();
        let id = tree.link(position, 20);
        tree.unlink(id);

        let after: Vec<i32> = tree.iter().copied().collect();
        assert_eq!(before, after);
        assert_well_formed(&tree);
    }

    #[rstest]
    fn test_iterator_is_double_ended_and_exact() {
        let mut tree = Tree::new();
        for value in 1..=5 {
            insert_unique(&mut tree, value);
        }

        let mut iter = tree.iter();
        assert_eq!(iter.len(), 5);
        assert_eq!(iter.next(), Some(&1));
        assert_eq!(iter.next_back(), Some(&5));
        assert_eq!(iter.len(), 3);
        let middle: Vec<&i32> = iter.collect();
        assert_eq!(middle, vec![&2, &3, &4]);
    }

    #[rstest]
    fn test_clear_empties_tree() {
        let mut tree = Tree::new();
        for value in 0..10 {
            insert_unique(&mut tree, value);
        }
        tree.clear();

        assert!(tree.is_empty());
        assert_eq!(tree.first(), None);
        insert_unique(&mut tree, 1);
        assert_well_formed(&tree);
    }

    #[rstest]
    fn test_large_sequential_workload_stays_well_formed() {
        let mut tree = Tree::new();
        let mut ids = Vec::new();
        for value in 0..2_000 {
            ids.push(insert_unique(&mut tree, value));
        }
        for id in ids.iter().step_by(2) {
            tree.unlink(*id);
        }

        assert_eq!(tree.len(), 1_000);
        assert_well_formed(&tree);
    }
}
