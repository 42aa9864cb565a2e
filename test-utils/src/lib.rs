//! Tangle test utilities.
//!
//! An in-memory [`MockDag`](dag::MockDag) store and small helpers, shared by
//! the tests of the other crates. Not for production use.

pub mod dag;

pub use dag::{tx_id, MockDag};
