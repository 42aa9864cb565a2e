//! The index oracle.
//!
//! [`IndexOracle`] resolves, for any solid transaction, its
//! [`RootSnapshotIndexes`]: the oldest and youngest confirming milestone
//! index over the already-confirmed boundary reachable by walking parents.

use std::{collections::HashSet, sync::Arc};

use dashmap::DashMap;
use tokio::sync::Mutex;

use tangle_types::{MilestoneIndex, RootSnapshotIndexes, TxId};

use crate::store::{self, DagStore};

/// An error resolving root-snapshot indexes.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The walk hit a missing or non-solid transaction.
    ///
    /// Callers must treat this as "skip and retry later", never as a
    /// classification.
    #[error("transaction cone is not fully solid")]
    Indeterminate,

    /// The store has no snapshot information.
    ///
    /// The local database is unusable; the core refuses to serve.
    #[error("snapshot info missing from the DAG store")]
    SnapshotInfoMissing,

    /// The DAG store failed.
    #[error("DAG store error: {0}")]
    Store(#[from] tower::BoxError),
}

/// Resolves and memoises root-snapshot indexes.
///
/// Results are cached by [`TxId`] only: the indexes are a property of the
/// already-confirmed past of a transaction, so a cached value stays correct
/// when the LSMI advances. Pruning invalidates affected entries through
/// [`IndexOracle::invalidate_below`].
pub struct IndexOracle<D> {
    store: D,
    cache: Arc<DashMap<TxId, RootSnapshotIndexes>>,
    /// Per-key compute gates so concurrent lookups of the same transaction
    /// perform a single walk.
    compute_gates: Arc<DashMap<TxId, Arc<Mutex<()>>>>,
}

impl<D: Clone> Clone for IndexOracle<D> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cache: Arc::clone(&self.cache),
            compute_gates: Arc::clone(&self.compute_gates),
        }
    }
}

impl<D> IndexOracle<D>
where
    D: DagStore + Clone + Send + 'static,
    D::Future: Send + 'static,
{
    pub fn new(store: D) -> Self {
        Self {
            store,
            cache: Arc::new(DashMap::new()),
            compute_gates: Arc::new(DashMap::new()),
        }
    }

    /// Resolves `(YTRSI, OTRSI)` for the given transaction.
    ///
    /// Confirmations younger than `lsmi` are ignored, so the result is a
    /// deterministic function of `(tx_id, lsmi)` and the confirmed past.
    pub async fn indexes(
        &self,
        tx_id: TxId,
        lsmi: MilestoneIndex,
    ) -> Result<RootSnapshotIndexes, OracleError> {
        if let Some(hit) = self.cache.get(&tx_id) {
            return Ok(*hit);
        }

        let gate = self
            .compute_gates
            .entry(tx_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = gate.lock().await;

        // Another task may have finished the walk while we waited on the gate.
        if let Some(hit) = self.cache.get(&tx_id) {
            return Ok(*hit);
        }

        let res = self.walk(tx_id, lsmi).await;

        if let Ok(indexes) = &res {
            self.cache.insert(tx_id, *indexes);
        }

        drop(_guard);
        // Racy removal at worst costs a duplicate walk.
        self.compute_gates.remove(&tx_id);

        res
    }

    /// Drops cached entries whose oldest bound is at or below `index`.
    ///
    /// Called when transactions at or below a milestone index are pruned.
    pub fn invalidate_below(&self, index: MilestoneIndex) {
        self.cache.retain(|_, indexes| indexes.otrsi > index);
        tracing::debug!("Invalidated oracle cache entries at or below {index}");
    }

    /// Bounded upward walk from `root` to the confirmed boundary.
    async fn walk(
        &self,
        root: TxId,
        lsmi: MilestoneIndex,
    ) -> Result<RootSnapshotIndexes, OracleError> {
        fn merge(
            index: MilestoneIndex,
            ytrsi: &mut Option<MilestoneIndex>,
            otrsi: &mut Option<MilestoneIndex>,
        ) {
            *ytrsi = Some(ytrsi.map_or(index, |cur| cur.max(index)));
            *otrsi = Some(otrsi.map_or(index, |cur| cur.min(index)));
        }

        let mut store = self.store.clone();

        let mut ytrsi: Option<MilestoneIndex> = None;
        let mut otrsi: Option<MilestoneIndex> = None;

        let mut entry_point_index: Option<MilestoneIndex> = None;
        let mut visited = HashSet::new();
        let mut stack = vec![root];

        while let Some(tx_id) = stack.pop() {
            if !visited.insert(tx_id) {
                continue;
            }

            // Interior vertices may already be memoised; their bounds cover
            // their whole past cone.
            if tx_id != root {
                if let Some(hit) = self.cache.get(&tx_id) {
                    merge(hit.ytrsi, &mut ytrsi, &mut otrsi);
                    merge(hit.otrsi, &mut ytrsi, &mut otrsi);
                    continue;
                }
            }

            if store::is_solid_entry_point(&mut store, tx_id).await? {
                let epi = match entry_point_index {
                    Some(epi) => epi,
                    None => {
                        let info = store::snapshot_info(&mut store)
                            .await?
                            .ok_or(OracleError::SnapshotInfoMissing)?;
                        entry_point_index = Some(info.entry_point_index);
                        info.entry_point_index
                    }
                };
                merge(epi, &mut ytrsi, &mut otrsi);
                continue;
            }

            let Some(meta) = store::tx_metadata(&mut store, tx_id).await? else {
                return Err(OracleError::Indeterminate);
            };
            if !meta.is_solid {
                return Err(OracleError::Indeterminate);
            }

            match meta.confirmed {
                Some(at) if at <= lsmi => merge(at, &mut ytrsi, &mut otrsi),
                _ => {
                    stack.push(meta.trunk);
                    stack.push(meta.branch);
                }
            }
        }

        let (Some(ytrsi), Some(otrsi)) = (ytrsi, otrsi) else {
            // Nothing confirmed is reachable, the cone cannot be scored yet.
            return Err(OracleError::Indeterminate);
        };

        Ok(RootSnapshotIndexes { ytrsi, otrsi })
    }
}
