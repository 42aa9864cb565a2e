//! Tangle DAG traversal.
//!
//! This crate resolves the root-snapshot indexes of transactions by walking
//! the DAG upwards through an abstract [`DagStore`]. The store itself is
//! external; it is only reached through the request/response enums in
//! [`tangle_types::dag`].

mod oracle;
pub mod store;

pub use oracle::{IndexOracle, OracleError};
pub use store::DagStore;
