//! Node sync status.

use tokio::sync::watch;

use tangle_types::MilestoneIndex;

/// A read-only view of the node's sync state.
///
/// The LSMI side is written by the tip pool manager when milestones solidify;
/// the newest-known side is written by the milestone processor through a
/// [`LatestMilestoneHandle`].
#[derive(Clone, Debug)]
pub struct SyncStatus {
    lsmi: watch::Receiver<MilestoneIndex>,
    latest: watch::Receiver<MilestoneIndex>,
}

impl SyncStatus {
    /// The latest solid milestone index.
    pub fn lsmi(&self) -> MilestoneIndex {
        *self.lsmi.borrow()
    }

    /// The newest milestone index seen on the network.
    pub fn latest_milestone_index(&self) -> MilestoneIndex {
        *self.latest.borrow()
    }

    /// Whether the LSMI lags the newest known milestone by at most
    /// `threshold` indexes.
    pub fn is_synced_within(&self, threshold: u32) -> bool {
        self.latest_milestone_index().delta(self.lsmi()) <= threshold
    }
}

/// Handle used by the milestone processor to report the newest milestone
/// index seen on the network.
#[derive(Debug)]
pub struct LatestMilestoneHandle(watch::Sender<MilestoneIndex>);

impl LatestMilestoneHandle {
    /// Raises the newest known milestone index. Older indexes are ignored.
    pub fn update(&self, index: MilestoneIndex) {
        self.0.send_if_modified(|cur| {
            if index > *cur {
                *cur = index;
                true
            } else {
                false
            }
        });
    }
}

pub(crate) fn sync_status(
    lsmi: watch::Receiver<MilestoneIndex>,
) -> (SyncStatus, LatestMilestoneHandle) {
    let (latest_tx, latest_rx) = watch::channel(MilestoneIndex::default());

    (
        SyncStatus {
            lsmi,
            latest: latest_rx,
        },
        LatestMilestoneHandle(latest_tx),
    )
}
