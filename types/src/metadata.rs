use crate::{MilestoneIndex, TxId};

/// The metadata of a transaction, as handed out by the DAG store.
///
/// This is a read-only view; the tip-selection core never owns or mutates
/// transaction state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TxMetadata {
    /// The first parent reference.
    pub trunk: TxId,
    /// The second parent reference.
    pub branch: TxId,
    /// Whether every ancestor of this transaction is present locally.
    pub is_solid: bool,
    /// Whether this transaction is the tail of its bundle.
    ///
    /// Only tails are eligible tips.
    pub is_tail: bool,
    /// Whether this transaction's ledger effect clashes with an earlier
    /// confirmed one.
    pub conflicting: bool,
    /// The index of the confirming milestone, if any.
    pub confirmed: Option<MilestoneIndex>,
}

impl TxMetadata {
    /// The parent references `(trunk, branch)`.
    pub const fn parents(&self) -> [TxId; 2] {
        [self.trunk, self.branch]
    }
}
