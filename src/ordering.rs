//! Comparison traits for [`PriorityQueue`].
//!
//! Two queues compare by their pairs in primary order, element by element,
//! with each pair ranked by value first and key second. A shorter queue that
//! is a prefix of a longer one ranks lower.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use crate::queue::PriorityQueue;

impl<K: PartialEq, V: PartialEq> PartialEq for PriorityQueue<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Eq, V: Eq> Eq for PriorityQueue<K, V> {}

impl<K: PartialOrd, V: PartialOrd> PartialOrd for PriorityQueue<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter()
            .map(|(key, value)| (value, key))
            .partial_cmp(other.iter().map(|(key, value)| (value, key)))
    }
}

impl<K: Ord, V: Ord> Ord for PriorityQueue<K, V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter()
            .map(|(key, value)| (value, key))
            .cmp(other.iter().map(|(key, value)| (value, key)))
    }
}

impl<K: Hash, V: Hash> Hash for PriorityQueue<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for (key, value) in self {
            key.hash(state);
            value.hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::hash_map::DefaultHasher;

    fn queue_of(pairs: &[(i32, i32)]) -> PriorityQueue<i32, i32> {
        pairs.iter().copied().collect()
    }

    fn hash_of(queue: &PriorityQueue<i32, i32>) -> u64 {
        let mut hasher = DefaultHasher::new();
        queue.hash(&mut hasher);
        hasher.finish()
    }

    #[rstest]
    #[case(&[(1, 10)], &[(1, 20)], Ordering::Less)]
    #[case(&[(1, 10), (2, 5)], &[(1, 10), (2, 10)], Ordering::Less)]
    #[case(&[(2, 1)], &[(1, 2)], Ordering::Less)]
    #[case(&[(1, 1)], &[(1, 1), (1, 1)], Ordering::Less)]
    #[case(&[(3, 3), (1, 1)], &[(1, 1), (3, 3)], Ordering::Equal)]
    #[case(&[(2, 7)], &[(1, 7)], Ordering::Greater)]
    fn test_queues_compare_by_value_then_key(
        #[case] left: &[(i32, i32)],
        #[case] right: &[(i32, i32)],
        #[case] expected: Ordering,
    ) {
        let left = queue_of(left);
        let right = queue_of(right);

        assert_eq!(left.cmp(&right), expected);
        assert_eq!(left.partial_cmp(&right), Some(expected));
        assert_eq!(right.cmp(&left), expected.reverse());
        assert_eq!(left == right, expected == Ordering::Equal);
    }

    #[rstest]
    fn test_equal_queues_hash_equal() {
        let left = queue_of(&[(1, 2), (3, 4), (1, 2)]);
        let right = queue_of(&[(3, 4), (1, 2), (1, 2)]);

        assert_eq!(left, right);
        assert_eq!(hash_of(&left), hash_of(&right));
    }

    #[rstest]
    fn test_empty_queues_are_equal() {
        assert_eq!(queue_of(&[]), queue_of(&[]));
        assert!(queue_of(&[]) < queue_of(&[(0, 0)]));
    }
}
