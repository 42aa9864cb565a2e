use core::fmt;
use std::ops::Add;

use serde::{Deserialize, Serialize};

/// The index of a milestone.
///
/// Milestone indexes increase monotonically; the latest solid milestone index
/// (LSMI) is the highest index whose cone is fully validated locally.
#[derive(
    Copy, Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MilestoneIndex(pub u32);

impl MilestoneIndex {
    /// The distance from `self` down to an older index, saturating at zero.
    pub const fn delta(self, older: Self) -> u32 {
        self.0.saturating_sub(older.0)
    }
}

impl fmt::Display for MilestoneIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Add<u32> for MilestoneIndex {
    type Output = Self;

    fn add(self, rhs: u32) -> Self {
        Self(self.0 + rhs)
    }
}

/// The root-snapshot indexes of a transaction.
///
/// The bounds of the confirmation boundary reachable from a transaction by
/// walking parents: `otrsi` is the oldest (smallest) confirming milestone
/// index over that boundary, `ytrsi` the youngest (largest).
///
/// For a transaction whose cone is fully solid, `otrsi <= ytrsi <= LSMI`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RootSnapshotIndexes {
    /// Youngest root-snapshot index.
    pub ytrsi: MilestoneIndex,
    /// Oldest root-snapshot index.
    pub otrsi: MilestoneIndex,
}
