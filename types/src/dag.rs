//! DAG store [`tower::Service`](https://docs.rs/tower) interface.
//!
//! This module contains the request and response enums of the abstract DAG
//! store the tip-selection core reads from. The storage engine itself lives
//! outside the core and is only reached through these types.

use crate::{SnapshotInfo, TxId, TxMetadata};

/// A read request to the DAG store.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DagReadRequest {
    /// A request for the metadata of the transaction with the given hash.
    TxMetadata(TxId),

    /// Does the given hash refer to a solid entry point?
    ///
    /// Solid entry points are ancestors that pre-date the local snapshot and
    /// are treated as already confirmed.
    IsSolidEntryPoint(TxId),

    /// A request for the local snapshot information.
    SnapshotInfo,
}

/// A response from the DAG store.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DagReadResponse {
    /// Response to [`DagReadRequest::TxMetadata`].
    ///
    /// [`None`] if the transaction is not known locally.
    TxMetadata(Option<TxMetadata>),

    /// Response to [`DagReadRequest::IsSolidEntryPoint`].
    IsSolidEntryPoint(bool),

    /// Response to [`DagReadRequest::SnapshotInfo`].
    ///
    /// [`None`] means the local database is corrupt; the core refuses to
    /// serve when it sees this.
    SnapshotInfo(Option<SnapshotInfo>),
}
