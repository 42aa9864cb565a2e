//! The [`DagStore`] trait and typed request helpers.

use tower::{Service, ServiceExt};

use tangle_types::{
    dag::{DagReadRequest, DagReadResponse},
    SnapshotInfo, TxId, TxMetadata,
};

/// The abstract DAG store the core reads from.
///
/// Blanket-implemented for any matching [`tower::Service`]; the storage
/// engine carries its own locking, the core treats every read as a scoped
/// borrow for the duration of one request.
pub trait DagStore:
    Service<DagReadRequest, Response = DagReadResponse, Error = tower::BoxError>
{
}

impl<T: Service<DagReadRequest, Response = DagReadResponse, Error = tower::BoxError>> DagStore
    for T
{
}

/// Reads the metadata of a transaction, [`None`] if it is unknown locally.
pub async fn tx_metadata<D: DagStore>(
    store: &mut D,
    tx_id: TxId,
) -> Result<Option<TxMetadata>, tower::BoxError> {
    let DagReadResponse::TxMetadata(meta) = store
        .ready()
        .await?
        .call(DagReadRequest::TxMetadata(tx_id))
        .await?
    else {
        unreachable!("DAG store returned wrong response for request");
    };

    Ok(meta)
}

/// Whether the given hash is a solid entry point of the local snapshot.
pub async fn is_solid_entry_point<D: DagStore>(
    store: &mut D,
    tx_id: TxId,
) -> Result<bool, tower::BoxError> {
    let DagReadResponse::IsSolidEntryPoint(is_sep) = store
        .ready()
        .await?
        .call(DagReadRequest::IsSolidEntryPoint(tx_id))
        .await?
    else {
        unreachable!("DAG store returned wrong response for request");
    };

    Ok(is_sep)
}

/// Reads the local snapshot information.
pub async fn snapshot_info<D: DagStore>(
    store: &mut D,
) -> Result<Option<SnapshotInfo>, tower::BoxError> {
    let DagReadResponse::SnapshotInfo(info) = store
        .ready()
        .await?
        .call(DagReadRequest::SnapshotInfo)
        .await?
    else {
        unreachable!("DAG store returned wrong response for request");
    };

    Ok(info)
}
