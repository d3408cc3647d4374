//! Query-time locking for sqlport.
//!
//! `sqlport-query` resolves lock requests against a dialect's capabilities and runs
//! locking selects.
//!
//! # Role In The Architecture
//!
//! - **Resolution**: [`LockStrategy::resolve`] maps a [`LockRequest`] to a table hint,
//!   a trailing locking clause, or the select-then-lock fallback. It is pure.
//! - **Execution**: [`LockingQuery`] applies the strategy to a select and, for the
//!   fallback, locks every returned row through the root table of a `Lockable`.

pub mod lock;

pub use lock::{LockMode, LockRequest, LockStrategy, LockTimeout, LockingQuery};
