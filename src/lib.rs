//! # kvqueue
//!
//! A priority queue of key-value pairs that allows duplicates and stays
//! unchanged when a key or value type panics.
//!
//! ## Overview
//!
//! [`PriorityQueue`] stores `(key, value)` pairs ordered by value, with the key
//! as a tiebreak. Besides the usual minimum and maximum extraction it can
//! look up and replace the value held under any key, and merge with another
//! queue.
//!
//! Internally the queue keeps three views of its contents:
//!
//! - **Primary order**: every pair, by value then key.
//! - **Key index**: pairs grouped by key, then by value.
//! - **Value registry**: each distinct value with the number of pairs
//!   holding it.
//!
//! Equal keys and equal values are stored once and shared between the views.
//!
//! ## Panic Safety
//!
//! User `Ord` and `Clone` implementations are allowed to panic. Every
//! operation either completes or leaves the queue exactly as it was before
//! the call; the panic then continues to unwind to the caller.
//!
//! ## Feature Flags
//!
//! - `arc`: share keys and values through `Arc` instead of `Rc`, making the
//!   queue `Send` and `Sync` when its key and value types are.
//!
//! ## Example
//!
//! ```rust
//! use kvqueue::prelude::*;
//!
//! let mut queue = PriorityQueue::new();
//! queue.insert("alpha", 3);
//! queue.insert("beta", 1);
//! queue.insert("alpha", 2);
//!
//! assert_eq!(queue.min_key(), Ok(&"beta"));
//! queue.change_value("beta", 5)?;
//! assert_eq!(queue.min_value(), Ok(&2));
//! assert_eq!(queue.max_key(), Ok(&"beta"));
//! # Ok::<(), QueueError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// ```rust
/// use kvqueue::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::QueueError;
    pub use crate::queue::PriorityQueue;
}

mod error;
mod handle;
mod index;
mod ordering;
mod queue;

pub use error::QueueError;
pub use queue::{Iter, PriorityQueue};
