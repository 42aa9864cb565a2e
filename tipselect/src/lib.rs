//! # Tangle tip selection
//!
//! Uniform random tip selection (URTS) with laziness classification.
//!
//! The pool of candidate tips is owned by the [`TipPoolManager`], a spawned
//! task fed [`TangleEvent`]s through the [`TipPoolService`] handle. Every
//! mutation flows through that single task; consumers select tips through a
//! [`TipSelector`], which reads an atomically published snapshot of the pool
//! and re-validates its picks against the DAG, so selection never blocks
//! ingest.
//!
//! Tips are classified by their distance (in milestone indexes) from the
//! confirmed frontier:
//!
//! - *non-lazy* tips are fresh and preferred for selection.
//! - *semi-lazy* tips directly reference a stale subtangle and only serve as
//!   a fallback.
//! - *lazy* tips are too far behind to be worth extending and are evicted.

use std::time::Duration;

use serde::Deserialize;

use tangle_types::{MilestoneIndex, TxId};

pub mod classifier;
mod manager;
mod pool;
mod selector;
mod sync;

#[cfg(test)]
mod tests;

pub use classifier::{Classifier, TipInfo, TipInfoError};
pub use manager::{
    start_tip_pool_manager, TangleEvent, TipPoolManager, TipPoolService, TipPoolShutDown,
    TipSelectHandle,
};
pub use selector::TipSelector;
pub use sync::{LatestMilestoneHandle, SyncStatus};

/// An event on the tip pool, for downstream subscribers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TipSelectEvent {
    /// A tip was admitted to the pool.
    TipAdded(TxId),
    /// A tip was evicted from the pool.
    TipRemoved(TxId),
    /// A milestone was confirmed and the pool refreshed for it.
    MilestoneConfirmed(MilestoneIndex),
}

/// An error selecting tips.
///
/// All variants are transient; callers should retry after a backoff.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TipSelectError {
    /// The LSMI lags too far behind the newest known milestone.
    #[error("node not synced")]
    NodeNotSynced,
    /// Both tiers are empty, or every pick went stale during re-validation.
    #[error("no tips available")]
    NoTipsAvailable,
    /// The selection deadline expired.
    #[error("tip selection timed out")]
    SelectTimeout,
}

/// The tip selection config.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct TipSelectConfig {
    /// The maximum `LSMI - OTRSI` delta before a tip is lazy and has to be
    /// reattached.
    pub below_max_depth: u32,

    /// The maximum `LSMI - YTRSI` delta before a tip is lazy and has to be
    /// promoted.
    #[serde(rename = "maxDeltaTxYoungestRootSnapshotIndexToLSMI")]
    pub max_delta_tx_youngest_root_snapshot_index_to_lsmi: u32,

    /// The maximum `LSMI - OTRSI` delta of a tip's parents before the tip
    /// counts as semi-lazy.
    #[serde(rename = "maxDeltaTxApproveesOldestRootSnapshotIndexToLSMI")]
    pub max_delta_tx_approvees_oldest_root_snapshot_index_to_lsmi: u32,

    /// Soft capacity of each tier; the oldest tips are evicted beyond it.
    pub max_tips: usize,

    /// Maximum age of a tip before it is evicted.
    pub max_age_seconds: u64,

    /// Number of solid children after which a tip is no longer a useful
    /// leaf and is evicted.
    pub retention_rules_tips_limit: u32,

    /// How often a stale pick is retried before selection gives up.
    pub max_retries: usize,

    /// The maximum milestone gap between the newest known milestone and the
    /// LSMI before the selector refuses to serve.
    pub sync_threshold: u32,

    /// Deadline of a single selection or tip-info call.
    pub select_timeout_millis: u64,
}

impl Default for TipSelectConfig {
    fn default() -> Self {
        Self {
            below_max_depth: 15,
            max_delta_tx_youngest_root_snapshot_index_to_lsmi: 2,
            max_delta_tx_approvees_oldest_root_snapshot_index_to_lsmi: 7,
            max_tips: 10_000,
            max_age_seconds: 180,
            retention_rules_tips_limit: 2,
            max_retries: 40,
            sync_threshold: 2,
            select_timeout_millis: 2_000,
        }
    }
}

impl TipSelectConfig {
    pub const fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_seconds)
    }

    pub const fn select_timeout(&self) -> Duration {
        Duration::from_millis(self.select_timeout_millis)
    }
}
