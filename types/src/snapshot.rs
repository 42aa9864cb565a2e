use crate::MilestoneIndex;

/// Information about the snapshot the local database was seeded from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SnapshotInfo {
    /// The milestone index at which the local database was seeded.
    ///
    /// Solid entry points are treated as confirmed at this index.
    pub entry_point_index: MilestoneIndex,
}
