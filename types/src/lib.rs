//! Tangle shared data types.
//!
//! This crate holds the types passed between the DAG store, the tip-selection
//! core and the REST layer. It contains no logic beyond construction,
//! formatting and the [`dag`] service interface enums.

mod metadata;
mod milestone;
mod snapshot;
mod tier;
mod transaction;

pub mod dag;

pub use metadata::TxMetadata;
pub use milestone::{MilestoneIndex, RootSnapshotIndexes};
pub use snapshot::SnapshotInfo;
pub use tier::{TipClass, TipTier};
pub use transaction::{InvalidTxIdError, TxId, TX_ID_LEN};
