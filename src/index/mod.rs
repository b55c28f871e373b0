//! Multi-index coordination engine.
//!
//! [`views::Views`] keeps the primary order, the key index and the value
//! registry consistent. Every index is a [`tree::Tree`], and every mutation of
//! the views goes through [`views::Views::transactional_insert`] or
//! [`views::Views::transactional_remove`].

pub(crate) mod journal;
pub(crate) mod tree;
pub(crate) mod views;

pub(crate) use views::Views;
