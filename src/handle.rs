//! Shared-ownership handles around user keys and values.
//!
//! A single stored key or value is referenced from several index nodes at
//! once (the primary order, the key index and the value registry). Handles
//! make that sharing a reference-count increment instead of a user `Clone`,
//! and let the coordinator drop a reference during rollback without ever
//! reconstructing the wrapped object.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

// =============================================================================
// Handle Definition
// =============================================================================

/// Immutable shared handle to a key or value stored in a queue.
///
/// Comparison dereferences to the wrapped value, so a handle orders exactly
/// like `T` and panics exactly when `T`'s comparison panics.
pub(crate) struct Handle<T>(ReferenceCounter<T>);

impl<T> Handle<T> {
    /// Wraps `value` in a fresh handle.
    #[inline]
    pub(crate) fn new(value: T) -> Self {
        Self(ReferenceCounter::new(value))
    }

    /// Returns `true` if both handles point at the same allocation.
    #[cfg(test)]
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        ReferenceCounter::ptr_eq(&self.0, &other.0)
    }

    #[cfg(test)]
    pub(crate) fn strong_count(&self) -> usize {
        ReferenceCounter::strong_count(&self.0)
    }
}

impl<T> Clone for Handle<T> {
    /// Shares the wrapped value. Never calls `T::clone`.
    #[inline]
    fn clone(&self) -> Self {
        Self(ReferenceCounter::clone(&self.0))
    }
}

impl<T> Deref for Handle<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: PartialEq> PartialEq for Handle<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl<T: Eq> Eq for Handle<T> {}

impl<T: PartialOrd> PartialOrd for Handle<T> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        (**self).partial_cmp(&**other)
    }
}

impl<T: Ord> Ord for Handle<T> {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        (**self).cmp(&**other)
    }
}

impl<T: fmt::Debug> fmt::Debug for Handle<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(formatter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_clone_shares_allocation() {
        let handle = Handle::new(String::from("shared"));
        let copy = handle.clone();

        assert!(handle.ptr_eq(&copy));
        assert_eq!(handle.strong_count(), 2);
    }

    #[rstest]
    fn test_equal_values_in_distinct_handles_compare_equal() {
        let left = Handle::new(7);
        let right = Handle::new(7);

        assert!(!left.ptr_eq(&right));
        assert_eq!(left, right);
        assert_eq!(left.cmp(&right), Ordering::Equal);
    }

    #[rstest]
    #[case(1, 2, Ordering::Less)]
    #[case(2, 1, Ordering::Greater)]
    #[case(3, 3, Ordering::Equal)]
    fn test_ordering_follows_wrapped_value(
        #[case] left: i32,
        #[case] right: i32,
        #[case] expected: Ordering,
    ) {
        assert_eq!(Handle::new(left).cmp(&Handle::new(right)), expected);
    }

    #[rstest]
    fn test_dropping_a_copy_releases_one_reference() {
        let handle = Handle::new(1_u8);
        let copy = handle.clone();
        drop(copy);

        assert_eq!(handle.strong_count(), 1);
    }
}
