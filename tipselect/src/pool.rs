//! The tip pool.
//!
//! Two FIFO-ordered tiers of candidate tips. The pool is a plain data
//! structure; the manager task owns it exclusively and publishes
//! [`PoolSnapshot`]s for the selectors.

use std::time::Instant;

use indexmap::{IndexMap, IndexSet};
use tokio_util::time::delay_queue;

use tangle_types::{MilestoneIndex, RootSnapshotIndexes, TipClass, TipTier, TxId};

/// A candidate tip and its bookkeeping.
#[derive(Debug)]
pub(crate) struct TipEntry {
    pub id: TxId,
    pub tier: TipTier,
    pub inserted_at: Instant,
    /// Number of solid children known to reference this tip.
    pub child_count: u32,
    pub last_ytrsi: MilestoneIndex,
    pub last_otrsi: MilestoneIndex,
    /// The LSMI the scores were last computed at.
    pub refresh_milestone: MilestoneIndex,
    /// Key of this entry's max-age timer.
    pub ttl_key: delay_queue::Key,
}

/// The result of re-scoring one entry.
pub(crate) enum RefreshOutcome {
    Unchanged,
    /// The entry moved to the other tier.
    Retiered,
    /// The entry went lazy and left the pool.
    Evicted(TipEntry),
}

/// A read-only view of the pool tiers, atomically swapped on every change.
#[derive(Clone, Debug, Default)]
pub(crate) struct PoolSnapshot {
    pub non_lazy: IndexSet<TxId>,
    pub semi_lazy: IndexSet<TxId>,
    /// The LSMI the tiers were last refreshed at.
    pub lsmi: MilestoneIndex,
}

impl PoolSnapshot {
    pub fn contains(&self, id: &TxId) -> bool {
        self.non_lazy.contains(id) || self.semi_lazy.contains(id)
    }
}

pub(crate) struct TipPool {
    non_lazy: IndexMap<TxId, TipEntry>,
    semi_lazy: IndexMap<TxId, TipEntry>,
    max_tips: usize,
    retention_child_limit: u32,
}

impl TipPool {
    pub fn new(max_tips: usize, retention_child_limit: u32) -> Self {
        Self {
            non_lazy: IndexMap::new(),
            semi_lazy: IndexMap::new(),
            max_tips,
            retention_child_limit,
        }
    }

    fn tier_mut(&mut self, tier: TipTier) -> &mut IndexMap<TxId, TipEntry> {
        match tier {
            TipTier::NonLazy => &mut self.non_lazy,
            TipTier::SemiLazy => &mut self.semi_lazy,
        }
    }

    pub fn len(&self, tier: TipTier) -> usize {
        match tier {
            TipTier::NonLazy => self.non_lazy.len(),
            TipTier::SemiLazy => self.semi_lazy.len(),
        }
    }

    pub fn contains(&self, id: &TxId) -> bool {
        self.non_lazy.contains_key(id) || self.semi_lazy.contains_key(id)
    }

    fn get_mut(&mut self, id: &TxId) -> Option<&mut TipEntry> {
        self.non_lazy
            .get_mut(id)
            .or_else(|| self.semi_lazy.get_mut(id))
    }

    /// Inserts a new tip, returning the entries evicted to stay within the
    /// per-tier capacity (oldest first).
    pub fn insert(&mut self, entry: TipEntry) -> Vec<TipEntry> {
        debug_assert!(!self.contains(&entry.id), "tips are unique by id");

        let max_tips = self.max_tips;
        let tier = self.tier_mut(entry.tier);
        tier.insert(entry.id, entry);

        let mut evicted = Vec::new();
        while tier.len() > max_tips {
            let (_, oldest) = tier.shift_remove_index(0).expect("tier is not empty");
            evicted.push(oldest);
        }
        evicted
    }

    pub fn remove(&mut self, id: &TxId) -> Option<TipEntry> {
        self.non_lazy
            .shift_remove(id)
            .or_else(|| self.semi_lazy.shift_remove(id))
    }

    /// Bumps the child count of a pool member; evicts and returns it once it
    /// has accumulated `retention_child_limit` children.
    pub fn register_child(&mut self, parent: &TxId) -> Option<TipEntry> {
        let limit = self.retention_child_limit;
        let entry = self.get_mut(parent)?;
        entry.child_count += 1;

        if entry.child_count >= limit {
            return Some(self.remove(parent).expect("entry was just looked up"));
        }
        None
    }

    /// Tips whose scores were computed before `lsmi`.
    pub fn refresh_candidates(&self, lsmi: MilestoneIndex) -> Vec<TxId> {
        self.non_lazy
            .values()
            .chain(self.semi_lazy.values())
            .filter(|entry| entry.refresh_milestone < lsmi)
            .map(|entry| entry.id)
            .collect()
    }

    /// Applies a recomputed classification to an entry.
    ///
    /// Entries that keep their tier keep their FIFO position; re-tiered
    /// entries join the back of their new tier.
    pub fn apply_refresh(
        &mut self,
        id: &TxId,
        class: TipClass,
        indexes: RootSnapshotIndexes,
        lsmi: MilestoneIndex,
    ) -> RefreshOutcome {
        let Some(new_tier) = class.tier() else {
            return match self.remove(id) {
                Some(entry) => RefreshOutcome::Evicted(entry),
                None => RefreshOutcome::Unchanged,
            };
        };

        let Some(entry) = self.get_mut(id) else {
            return RefreshOutcome::Unchanged;
        };
        entry.last_ytrsi = indexes.ytrsi;
        entry.last_otrsi = indexes.otrsi;
        entry.refresh_milestone = lsmi;

        if entry.tier == new_tier {
            return RefreshOutcome::Unchanged;
        }

        let mut entry = self.remove(id).expect("entry was just looked up");
        entry.tier = new_tier;
        self.tier_mut(new_tier).insert(entry.id, entry);
        RefreshOutcome::Retiered
    }

    pub fn snapshot(&self, lsmi: MilestoneIndex) -> PoolSnapshot {
        PoolSnapshot {
            non_lazy: self.non_lazy.keys().copied().collect(),
            semi_lazy: self.semi_lazy.keys().copied().collect(),
            lsmi,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tokio_util::time::DelayQueue;

    use super::*;

    fn entry(n: u64, tier: TipTier, timers: &mut DelayQueue<TxId>) -> TipEntry {
        let id = tangle_test_utils::tx_id(n);
        TipEntry {
            id,
            tier,
            inserted_at: Instant::now(),
            child_count: 0,
            last_ytrsi: MilestoneIndex(1),
            last_otrsi: MilestoneIndex(1),
            refresh_milestone: MilestoneIndex(1),
            ttl_key: timers.insert(id, std::time::Duration::from_secs(180)),
        }
    }

    const fn rsi(index: u32) -> RootSnapshotIndexes {
        RootSnapshotIndexes {
            ytrsi: MilestoneIndex(index),
            otrsi: MilestoneIndex(index),
        }
    }

    #[tokio::test]
    async fn capacity_eviction_is_fifo() {
        let mut timers = DelayQueue::new();
        let mut pool = TipPool::new(2, 2);

        assert!(pool.insert(entry(1, TipTier::NonLazy, &mut timers)).is_empty());
        assert!(pool.insert(entry(2, TipTier::NonLazy, &mut timers)).is_empty());

        let evicted = pool.insert(entry(3, TipTier::NonLazy, &mut timers));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, tangle_test_utils::tx_id(1));
        assert_eq!(pool.len(TipTier::NonLazy), 2);
    }

    #[tokio::test]
    async fn tiers_have_separate_capacity() {
        let mut timers = DelayQueue::new();
        let mut pool = TipPool::new(1, 2);

        assert!(pool.insert(entry(1, TipTier::NonLazy, &mut timers)).is_empty());
        assert!(pool.insert(entry(2, TipTier::SemiLazy, &mut timers)).is_empty());
        assert_eq!(pool.len(TipTier::NonLazy), 1);
        assert_eq!(pool.len(TipTier::SemiLazy), 1);
    }

    #[tokio::test]
    async fn retention_limit_evicts_exactly_once() {
        let mut timers = DelayQueue::new();
        let mut pool = TipPool::new(10, 2);
        let id = tangle_test_utils::tx_id(1);

        pool.insert(entry(1, TipTier::NonLazy, &mut timers));

        assert!(pool.register_child(&id).is_none());
        let evicted = pool.register_child(&id).expect("limit reached");
        assert_eq!(evicted.child_count, 2);

        // The tip is gone, further children are no-ops.
        assert!(pool.register_child(&id).is_none());
        assert!(!pool.contains(&id));
    }

    #[tokio::test]
    async fn refresh_moves_and_evicts() {
        let mut timers = DelayQueue::new();
        let mut pool = TipPool::new(10, 2);
        let id = tangle_test_utils::tx_id(1);

        pool.insert(entry(1, TipTier::NonLazy, &mut timers));

        assert!(matches!(
            pool.apply_refresh(&id, TipClass::SemiLazy, rsi(2), MilestoneIndex(2)),
            RefreshOutcome::Retiered
        ));
        assert_eq!(pool.len(TipTier::NonLazy), 0);
        assert_eq!(pool.len(TipTier::SemiLazy), 1);

        assert!(matches!(
            pool.apply_refresh(&id, TipClass::Lazy, rsi(3), MilestoneIndex(3)),
            RefreshOutcome::Evicted(_)
        ));
        assert!(!pool.contains(&id));
    }

    #[tokio::test]
    async fn refresh_candidates_skips_fresh_entries() {
        let mut timers = DelayQueue::new();
        let mut pool = TipPool::new(10, 2);

        pool.insert(entry(1, TipTier::NonLazy, &mut timers));
        pool.apply_refresh(
            &tangle_test_utils::tx_id(1),
            TipClass::NonLazy,
            rsi(5),
            MilestoneIndex(5),
        );
        pool.insert(entry(2, TipTier::NonLazy, &mut timers));

        let candidates = pool.refresh_candidates(MilestoneIndex(5));
        assert_eq!(candidates, vec![tangle_test_utils::tx_id(2)]);
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Insert(u64, bool),
        Child(u64),
        Refresh(u64, u8),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..16u64, any::<bool>()).prop_map(|(n, non_lazy)| Op::Insert(n, non_lazy)),
            (0..16u64).prop_map(Op::Child),
            (0..16u64, 0..3u8).prop_map(|(n, class)| Op::Refresh(n, class)),
        ]
    }

    proptest! {
        /// Tier disjointness, the capacity bound and the retention bound hold
        /// after any sequence of operations.
        #[test]
        fn pool_invariants_hold(ops in prop::collection::vec(arb_op(), 1..64)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();

            rt.block_on(async move {
                let mut timers = DelayQueue::new();
                let mut pool = TipPool::new(4, 2);

                for op in ops {
                    match op {
                        Op::Insert(n, non_lazy) => {
                            let tier = if non_lazy { TipTier::NonLazy } else { TipTier::SemiLazy };
                            if !pool.contains(&tangle_test_utils::tx_id(n)) {
                                pool.insert(entry(n, tier, &mut timers));
                            }
                        }
                        Op::Child(n) => {
                            pool.register_child(&tangle_test_utils::tx_id(n));
                        }
                        Op::Refresh(n, class) => {
                            let class = match class {
                                0 => TipClass::NonLazy,
                                1 => TipClass::SemiLazy,
                                _ => TipClass::Lazy,
                            };
                            pool.apply_refresh(
                                &tangle_test_utils::tx_id(n),
                                class,
                                rsi(2),
                                MilestoneIndex(2),
                            );
                        }
                    }

                    prop_assert!(pool.len(TipTier::NonLazy) <= 4);
                    prop_assert!(pool.len(TipTier::SemiLazy) <= 4);

                    for entry in pool.non_lazy.values() {
                        prop_assert!(!pool.semi_lazy.contains_key(&entry.id));
                        prop_assert!(entry.child_count < 2);
                        prop_assert_eq!(entry.tier, TipTier::NonLazy);
                    }
                    for entry in pool.semi_lazy.values() {
                        prop_assert!(entry.child_count < 2);
                        prop_assert_eq!(entry.tier, TipTier::SemiLazy);
                    }
                }
                Ok(())
            })?;
        }
    }
}
