//! Uniform random tip selection.

use std::sync::Arc;

use arc_swap::ArcSwap;
use rand::{thread_rng, Rng};
use tokio::time::timeout;

use tangle_dag::DagStore;
use tangle_types::{TipTier, TxId};

use crate::{
    classifier::Classifier, pool::PoolSnapshot, sync::SyncStatus, TipSelectConfig, TipSelectError,
};

/// Selects tips to be used as parents of new messages.
///
/// Cheap to clone. Selection reads the atomically published pool snapshot
/// and re-validates each pick against the DAG, so it never blocks the event
/// router and never mutates pool state.
pub struct TipSelector<D> {
    snapshot: Arc<ArcSwap<PoolSnapshot>>,
    classifier: Classifier<D>,
    sync: SyncStatus,
    config: Arc<TipSelectConfig>,
}

impl<D: Clone> Clone for TipSelector<D> {
    fn clone(&self) -> Self {
        Self {
            snapshot: Arc::clone(&self.snapshot),
            classifier: self.classifier.clone(),
            sync: self.sync.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<D> TipSelector<D>
where
    D: DagStore + Clone + Send + 'static,
    D::Future: Send + 'static,
{
    pub(crate) fn new(
        snapshot: Arc<ArcSwap<PoolSnapshot>>,
        classifier: Classifier<D>,
        sync: SyncStatus,
        config: Arc<TipSelectConfig>,
    ) -> Self {
        Self {
            snapshot,
            classifier,
            sync,
            config,
        }
    }

    /// Selects two tips `(trunk, branch)` suitable as parents of a new
    /// message.
    ///
    /// Non-lazy tips are preferred; the semi-lazy tier only serves when the
    /// non-lazy tier is empty. Both tips are drawn from the same tier, and
    /// are only equal when that tier holds a single tip.
    pub async fn select_tips(&self) -> Result<(TxId, TxId), TipSelectError> {
        timeout(self.config.select_timeout(), self.select_inner())
            .await
            .unwrap_or(Err(TipSelectError::SelectTimeout))
    }

    /// Like [`select_tips`](Self::select_tips), but overrides the branch
    /// with the supplied reference.
    ///
    /// No liveness check is performed on the reference; that is the
    /// caller's responsibility.
    pub async fn select_tips_with_reference(
        &self,
        reference: TxId,
    ) -> Result<(TxId, TxId), TipSelectError> {
        let (trunk, _) = self.select_tips().await?;
        Ok((trunk, reference))
    }

    async fn select_inner(&self) -> Result<(TxId, TxId), TipSelectError> {
        if !self.sync.is_synced_within(self.config.sync_threshold) {
            return Err(TipSelectError::NodeNotSynced);
        }

        let trunk = self.select_one(None).await?;
        let branch = self.select_one(Some(trunk)).await?;
        Ok((trunk, branch))
    }

    /// One walk-back round: pick, re-validate, retry on staleness.
    async fn select_one(&self, exclude: Option<TxId>) -> Result<TxId, TipSelectError> {
        for _ in 0..self.config.max_retries {
            let snapshot = self.snapshot.load_full();
            let Some((candidate, tier)) = pick(&snapshot, exclude) else {
                return Err(TipSelectError::NoTipsAvailable);
            };

            // The pool may have moved on since the snapshot was taken; the
            // pick must still classify for its tier and still be a member.
            match self.classifier.classify(candidate, snapshot.lsmi).await {
                Ok(class) if class.within(tier) => {
                    let current = self.snapshot.load();
                    if current.lsmi == snapshot.lsmi && current.contains(&candidate) {
                        return Ok(candidate);
                    }
                    tracing::trace!("Tip {candidate} went stale mid-selection, retrying");
                }
                Ok(_) => {
                    tracing::trace!("Tip {candidate} no longer classifies for its tier");
                }
                Err(e) => {
                    tracing::trace!("Could not re-validate tip {candidate}: {e}");
                }
            }
        }

        Err(TipSelectError::NoTipsAvailable)
    }
}

/// Uniform pick from the freshest non-empty tier.
fn pick(snapshot: &PoolSnapshot, exclude: Option<TxId>) -> Option<(TxId, TipTier)> {
    let (tips, tier) = if snapshot.non_lazy.is_empty() {
        (&snapshot.semi_lazy, TipTier::SemiLazy)
    } else {
        (&snapshot.non_lazy, TipTier::NonLazy)
    };

    if tips.is_empty() {
        return None;
    }

    // A single-tip tier serves the same tip for both picks.
    if tips.len() == 1 {
        return tips.get_index(0).map(|id| (*id, tier));
    }

    let mut index = thread_rng().gen_range(0..tips.len());
    if exclude.is_some_and(|ex| tips.get_index(index) == Some(&ex)) {
        index = (index + 1) % tips.len();
    }

    tips.get_index(index).map(|id| (*id, tier))
}
