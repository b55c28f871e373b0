//! Error type for queue operations.
//!
//! Only the container's own failures are represented here. A panic raised by
//! a key or value type (in `Ord` or `Clone`) is not converted: it unwinds out
//! of the call unchanged, after the queue has been restored to its state
//! before the call.

/// Represents errors returned by [`PriorityQueue`](crate::PriorityQueue)
/// operations.
///
/// # Examples
///
/// ```rust
/// use kvqueue::{PriorityQueue, QueueError};
///
/// let queue: PriorityQueue<i32, i32> = PriorityQueue::new();
/// assert_eq!(queue.min_value(), Err(QueueError::EmptyQueue));
/// assert_eq!(
///     format!("{}", QueueError::EmptyQueue),
///     "priority queue is empty"
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueError {
    /// A minimum or maximum was requested from an empty queue.
    EmptyQueue,
    /// No pair in the queue has the requested key.
    KeyNotFound,
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyQueue => write!(formatter, "priority queue is empty"),
            Self::KeyNotFound => write!(
                formatter,
                "could not find an element in the priority queue with the specified key"
            ),
        }
    }
}

impl std::error::Error for QueueError {}
