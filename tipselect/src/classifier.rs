//! Tip laziness classification.
//!
//! A tip is scored by its root-snapshot indexes relative to the current
//! LSMI. The checks run in a fixed order: below-max-depth first, then the
//! YTRSI delta, then the per-parent OTRSI scan; the first breach decides.

use std::sync::Arc;

use tangle_dag::{store, DagStore, IndexOracle, OracleError};
use tangle_types::{MilestoneIndex, RootSnapshotIndexes, TipClass, TxId};

use crate::TipSelectConfig;

/// Classifies root-snapshot indexes against the configured thresholds.
pub fn classify(
    indexes: RootSnapshotIndexes,
    parent_otrsis: &[MilestoneIndex],
    lsmi: MilestoneIndex,
    config: &TipSelectConfig,
) -> TipClass {
    if lsmi.delta(indexes.otrsi) > config.below_max_depth {
        return TipClass::Lazy;
    }

    if lsmi.delta(indexes.ytrsi) > config.max_delta_tx_youngest_root_snapshot_index_to_lsmi {
        return TipClass::Lazy;
    }

    if parent_otrsis.iter().any(|otrsi| {
        lsmi.delta(*otrsi) > config.max_delta_tx_approvees_oldest_root_snapshot_index_to_lsmi
    }) {
        return TipClass::SemiLazy;
    }

    TipClass::NonLazy
}

/// The promotion/reattachment advice for an externally supplied tail.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TipInfo {
    /// The tail is confirmed by a milestone (and not conflicting).
    pub confirmed: bool,
    /// The tail's ledger effect clashes with an earlier confirmed one.
    pub conflicting: bool,
    /// The tail should be promoted to stay referenceable.
    pub should_promote: bool,
    /// The tail fell below max depth and has to be reattached.
    pub should_reattach: bool,
}

/// An error answering a tip-info query. All variants but [`Store`](Self::Store)
/// are faults of the supplied tail.
#[derive(Debug, thiserror::Error)]
pub enum TipInfoError {
    #[error("unknown tail transaction")]
    UnknownTransaction,
    #[error("transaction is not a tail")]
    NotATail,
    #[error("transaction is not solid")]
    NotSolid,
    #[error("DAG store error: {0}")]
    Store(tower::BoxError),
}

impl From<OracleError> for TipInfoError {
    fn from(e: OracleError) -> Self {
        match e {
            // A gap in the cone means the tail cannot be scored yet.
            OracleError::Indeterminate => Self::NotSolid,
            OracleError::SnapshotInfoMissing => Self::Store(e.to_string().into()),
            OracleError::Store(e) => Self::Store(e),
        }
    }
}

/// Scores candidate tips through the index oracle.
pub struct Classifier<D> {
    store: D,
    oracle: IndexOracle<D>,
    config: Arc<TipSelectConfig>,
}

impl<D: Clone> Clone for Classifier<D> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            oracle: self.oracle.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<D> Classifier<D>
where
    D: DagStore + Clone + Send + 'static,
    D::Future: Send + 'static,
{
    pub fn new(store: D, oracle: IndexOracle<D>, config: Arc<TipSelectConfig>) -> Self {
        Self {
            store,
            oracle,
            config,
        }
    }

    /// Classifies the given tip at `lsmi`.
    pub async fn classify(
        &self,
        tx_id: TxId,
        lsmi: MilestoneIndex,
    ) -> Result<TipClass, OracleError> {
        self.classify_with_indexes(tx_id, lsmi)
            .await
            .map(|(class, _)| class)
    }

    /// Classifies the given tip at `lsmi`, also returning its indexes.
    pub async fn classify_with_indexes(
        &self,
        tx_id: TxId,
        lsmi: MilestoneIndex,
    ) -> Result<(TipClass, RootSnapshotIndexes), OracleError> {
        let mut store = self.store.clone();

        let indexes = self.oracle.indexes(tx_id, lsmi).await?;

        let Some(meta) = store::tx_metadata(&mut store, tx_id).await? else {
            return Err(OracleError::Indeterminate);
        };

        let mut parent_otrsis = [MilestoneIndex::default(); 2];
        for (slot, parent) in parent_otrsis.iter_mut().zip(meta.parents()) {
            *slot = self.parent_otrsi(&mut store, parent, lsmi).await?;
        }

        Ok((classify(indexes, &parent_otrsis, lsmi, &self.config), indexes))
    }

    /// Answers a tip-info query for an externally supplied tail.
    ///
    /// The order of the checks is fixed: client faults first, then the
    /// confirmation state (a conflicting confirmation is reported as
    /// conflicting only, for backwards compatibility), then the threshold
    /// tests in classification order.
    pub async fn tip_info(
        &self,
        tail: TxId,
        lsmi: MilestoneIndex,
    ) -> Result<TipInfo, TipInfoError> {
        let mut store = self.store.clone();

        let Some(meta) = store::tx_metadata(&mut store, tail)
            .await
            .map_err(TipInfoError::Store)?
        else {
            return Err(TipInfoError::UnknownTransaction);
        };

        if !meta.is_tail {
            return Err(TipInfoError::NotATail);
        }
        if !meta.is_solid {
            return Err(TipInfoError::NotSolid);
        }

        let conflicting = meta.conflicting;
        let confirmed = meta.confirmed.is_some() && !conflicting;
        if confirmed || conflicting {
            return Ok(TipInfo {
                confirmed,
                conflicting,
                ..TipInfo::default()
            });
        }

        let indexes = self.oracle.indexes(tail, lsmi).await?;

        if lsmi.delta(indexes.otrsi) > self.config.below_max_depth {
            return Ok(TipInfo {
                should_reattach: true,
                ..TipInfo::default()
            });
        }

        if lsmi.delta(indexes.ytrsi)
            > self.config.max_delta_tx_youngest_root_snapshot_index_to_lsmi
        {
            return Ok(TipInfo {
                should_promote: true,
                ..TipInfo::default()
            });
        }

        for parent in meta.parents() {
            let otrsi = self.parent_otrsi(&mut store, parent, lsmi).await?;
            if lsmi.delta(otrsi)
                > self.config.max_delta_tx_approvees_oldest_root_snapshot_index_to_lsmi
            {
                return Ok(TipInfo {
                    should_promote: true,
                    ..TipInfo::default()
                });
            }
        }

        Ok(TipInfo::default())
    }

    /// The OTRSI a parent contributes; a solid entry point contributes the
    /// entry point index.
    async fn parent_otrsi(
        &self,
        store: &mut D,
        parent: TxId,
        lsmi: MilestoneIndex,
    ) -> Result<MilestoneIndex, OracleError> {
        if store::is_solid_entry_point(store, parent).await? {
            let info = store::snapshot_info(store)
                .await?
                .ok_or(OracleError::SnapshotInfoMissing)?;
            return Ok(info.entry_point_index);
        }

        Ok(self.oracle.indexes(parent, lsmi).await?.otrsi)
    }
}
