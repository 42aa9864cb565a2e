//! An in-memory DAG store.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, RwLock},
    task::{Context, Poll},
};

use futures::{future::BoxFuture, FutureExt};
use tower::{BoxError, Service};

use tangle_types::{
    dag::{DagReadRequest, DagReadResponse},
    MilestoneIndex, SnapshotInfo, TxId, TxMetadata, TX_ID_LEN,
};

/// Builds a deterministic [`TxId`] from a counter.
pub fn tx_id(n: u64) -> TxId {
    let mut bytes = [0; TX_ID_LEN];
    bytes[0..8].copy_from_slice(&n.to_le_bytes());
    TxId(bytes)
}

#[derive(Debug, Default)]
struct MockDagInner {
    txs: HashMap<TxId, TxMetadata>,
    seps: HashSet<TxId>,
    snapshot: Option<SnapshotInfo>,
}

/// An in-memory DAG store implementing the [`DagReadRequest`] service.
///
/// It is not safe to run consensus on, but good enough to exercise the walk,
/// classification and pool logic.
#[derive(Clone, Debug)]
pub struct MockDag {
    inner: Arc<RwLock<MockDagInner>>,
}

impl MockDag {
    /// A store seeded at the given entry point index, with a single solid
    /// entry point `tx_id(0)`.
    pub fn new(entry_point_index: MilestoneIndex) -> Self {
        let this = Self {
            inner: Arc::new(RwLock::new(MockDagInner {
                snapshot: Some(SnapshotInfo { entry_point_index }),
                ..Default::default()
            })),
        };
        this.add_sep(tx_id(0));
        this
    }

    /// A store with no snapshot info, simulating a corrupt database.
    pub fn corrupt() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MockDagInner::default())),
        }
    }

    pub fn add_sep(&self, id: TxId) {
        self.inner.write().unwrap().seps.insert(id);
    }

    /// Inserts a solid, unconfirmed, non-conflicting tail transaction.
    pub fn add_tail(&self, id: TxId, trunk: TxId, branch: TxId) {
        self.insert(
            id,
            TxMetadata {
                trunk,
                branch,
                is_solid: true,
                is_tail: true,
                conflicting: false,
                confirmed: None,
            },
        );
    }

    /// Inserts a solid, unconfirmed non-tail transaction.
    pub fn add_non_tail(&self, id: TxId, trunk: TxId, branch: TxId) {
        self.insert(
            id,
            TxMetadata {
                trunk,
                branch,
                is_solid: true,
                is_tail: false,
                conflicting: false,
                confirmed: None,
            },
        );
    }

    pub fn insert(&self, id: TxId, meta: TxMetadata) {
        self.inner.write().unwrap().txs.insert(id, meta);
    }

    /// Marks a transaction as confirmed by the milestone with this index.
    pub fn confirm(&self, id: TxId, index: MilestoneIndex) {
        self.update(id, |meta| meta.confirmed = Some(index));
    }

    pub fn set_conflicting(&self, id: TxId) {
        self.update(id, |meta| meta.conflicting = true);
    }

    pub fn set_unsolid(&self, id: TxId) {
        self.update(id, |meta| meta.is_solid = false);
    }

    /// Removes a transaction, simulating pruning or a gossip gap.
    pub fn remove(&self, id: TxId) {
        self.inner.write().unwrap().txs.remove(&id);
    }

    fn update(&self, id: TxId, f: impl FnOnce(&mut TxMetadata)) {
        let mut inner = self.inner.write().unwrap();
        let meta = inner
            .txs
            .get_mut(&id)
            .expect("mock transaction must exist before updating it");
        f(meta);
    }
}

impl Service<DagReadRequest> for MockDag {
    type Response = DagReadResponse;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: DagReadRequest) -> Self::Future {
        let inner = Arc::clone(&self.inner);

        async move {
            let inner = inner.read().unwrap();

            Ok(match req {
                DagReadRequest::TxMetadata(id) => {
                    DagReadResponse::TxMetadata(inner.txs.get(&id).copied())
                }
                DagReadRequest::IsSolidEntryPoint(id) => {
                    DagReadResponse::IsSolidEntryPoint(inner.seps.contains(&id))
                }
                DagReadRequest::SnapshotInfo => DagReadResponse::SnapshotInfo(inner.snapshot),
            })
        }
        .boxed()
    }
}
