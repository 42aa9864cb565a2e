use std::{sync::Arc, time::Duration};

use arc_swap::ArcSwap;
use indexmap::IndexSet;
use tokio::sync::{broadcast::error::TryRecvError, watch};

use tangle_dag::IndexOracle;
use tangle_test_utils::tx_id;
use tangle_types::MilestoneIndex;

use crate::{
    classifier::Classifier,
    pool::PoolSnapshot,
    selector::TipSelector,
    sync::sync_status,
    tests::{relaxed_config, send, setup, StalledDag},
    TangleEvent, TipInfo, TipInfoError, TipSelectError, TipSelectEvent,
};

#[tokio::test]
async fn empty_pool_has_no_tips() {
    let (handle, _dag) = setup(relaxed_config());

    assert_eq!(
        handle.selector.select_tips().await,
        Err(TipSelectError::NoTipsAvailable)
    );
}

#[tokio::test]
async fn single_tip_serves_both_picks() {
    let (mut handle, dag) = setup(relaxed_config());

    dag.add_tail(tx_id(1), tx_id(0), tx_id(0));
    send(&mut handle.pool, TangleEvent::TransactionSolid(tx_id(1))).await;

    assert_eq!(handle.selector.select_tips().await, Ok((tx_id(1), tx_id(1))));
}

#[tokio::test]
async fn children_retire_their_parent() {
    let (mut handle, dag) = setup(relaxed_config());

    dag.add_tail(tx_id(1), tx_id(0), tx_id(0));
    send(&mut handle.pool, TangleEvent::TransactionSolid(tx_id(1))).await;
    assert_eq!(handle.events.try_recv(), Ok(TipSelectEvent::TipAdded(tx_id(1))));

    // First child: the tip stays selectable.
    dag.add_non_tail(tx_id(2), tx_id(1), tx_id(0));
    send(&mut handle.pool, TangleEvent::TransactionSolid(tx_id(2))).await;
    assert_eq!(handle.selector.select_tips().await, Ok((tx_id(1), tx_id(1))));

    // Second child reaches the retention limit.
    dag.add_non_tail(tx_id(3), tx_id(1), tx_id(0));
    send(&mut handle.pool, TangleEvent::TransactionSolid(tx_id(3))).await;

    assert_eq!(
        handle.selector.select_tips().await,
        Err(TipSelectError::NoTipsAvailable)
    );
    assert_eq!(
        handle.events.try_recv(),
        Ok(TipSelectEvent::TipRemoved(tx_id(1)))
    );

    // A third child must not evict (or emit) a second time.
    dag.add_non_tail(tx_id(4), tx_id(1), tx_id(0));
    send(&mut handle.pool, TangleEvent::TransactionSolid(tx_id(4))).await;
    assert_eq!(handle.events.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn below_max_depth_breach_evicts_and_advises_reattach() {
    let config = crate::TipSelectConfig {
        below_max_depth: 15,
        ..relaxed_config()
    };
    let (mut handle, dag) = setup(config);

    dag.add_tail(tx_id(1), tx_id(0), tx_id(0));
    dag.confirm(tx_id(1), MilestoneIndex(80));
    send(&mut handle.pool, TangleEvent::MilestoneSolid(MilestoneIndex(80))).await;

    dag.add_tail(tx_id(2), tx_id(1), tx_id(1));
    send(&mut handle.pool, TangleEvent::TransactionSolid(tx_id(2))).await;
    assert_eq!(handle.selector.select_tips().await, Ok((tx_id(2), tx_id(2))));

    // 96 - 80 > 15: the tip falls below max depth.
    send(&mut handle.pool, TangleEvent::MilestoneSolid(MilestoneIndex(96))).await;

    assert_eq!(
        handle.selector.select_tips().await,
        Err(TipSelectError::NoTipsAvailable)
    );

    let info = handle
        .classifier
        .tip_info(tx_id(2), handle.sync.lsmi())
        .await
        .unwrap();
    assert_eq!(
        info,
        TipInfo {
            should_reattach: true,
            ..TipInfo::default()
        }
    );
}

#[tokio::test]
async fn semi_lazy_tier_is_served_as_fallback() {
    let config = crate::TipSelectConfig {
        below_max_depth: 20,
        max_delta_tx_approvees_oldest_root_snapshot_index_to_lsmi: 13,
        ..relaxed_config()
    };
    let (mut handle, dag) = setup(config);

    // A stale and a fresh confirmed parent.
    dag.add_tail(tx_id(1), tx_id(0), tx_id(0));
    dag.confirm(tx_id(1), MilestoneIndex(5));
    dag.add_tail(tx_id(2), tx_id(0), tx_id(0));
    dag.confirm(tx_id(2), MilestoneIndex(20));
    send(&mut handle.pool, TangleEvent::MilestoneSolid(MilestoneIndex(20))).await;

    // Both tips reference the stale parent: 20 - 5 > 13 makes them semi-lazy.
    dag.add_tail(tx_id(3), tx_id(1), tx_id(2));
    dag.add_tail(tx_id(4), tx_id(1), tx_id(2));
    send(&mut handle.pool, TangleEvent::TransactionSolid(tx_id(3))).await;
    send(&mut handle.pool, TangleEvent::TransactionSolid(tx_id(4))).await;

    let (trunk, branch) = handle.selector.select_tips().await.unwrap();
    assert_ne!(trunk, branch);
    assert!([tx_id(3), tx_id(4)].contains(&trunk));
    assert!([tx_id(3), tx_id(4)].contains(&branch));
}

#[tokio::test]
async fn reference_overrides_the_branch() {
    let (mut handle, dag) = setup(relaxed_config());

    dag.add_tail(tx_id(1), tx_id(0), tx_id(0));
    send(&mut handle.pool, TangleEvent::TransactionSolid(tx_id(1))).await;

    assert_eq!(
        handle
            .selector
            .select_tips_with_reference(tx_id(99))
            .await,
        Ok((tx_id(1), tx_id(99)))
    );
}

#[tokio::test]
async fn conflicting_masks_confirmed_in_tip_info() {
    let (mut handle, dag) = setup(relaxed_config());

    dag.add_tail(tx_id(1), tx_id(0), tx_id(0));
    dag.confirm(tx_id(1), MilestoneIndex(5));
    dag.set_conflicting(tx_id(1));
    dag.add_tail(tx_id(2), tx_id(0), tx_id(0));
    dag.confirm(tx_id(2), MilestoneIndex(5));
    send(&mut handle.pool, TangleEvent::MilestoneSolid(MilestoneIndex(5))).await;

    let info = handle
        .classifier
        .tip_info(tx_id(1), handle.sync.lsmi())
        .await
        .unwrap();
    assert_eq!(
        info,
        TipInfo {
            conflicting: true,
            ..TipInfo::default()
        }
    );

    let info = handle
        .classifier
        .tip_info(tx_id(2), handle.sync.lsmi())
        .await
        .unwrap();
    assert_eq!(
        info,
        TipInfo {
            confirmed: true,
            ..TipInfo::default()
        }
    );
}

#[tokio::test]
async fn tip_info_rejects_bad_tails() {
    let (handle, dag) = setup(relaxed_config());
    let lsmi = handle.sync.lsmi();

    assert!(matches!(
        handle.classifier.tip_info(tx_id(9), lsmi).await,
        Err(TipInfoError::UnknownTransaction)
    ));

    dag.add_non_tail(tx_id(1), tx_id(0), tx_id(0));
    assert!(matches!(
        handle.classifier.tip_info(tx_id(1), lsmi).await,
        Err(TipInfoError::NotATail)
    ));

    dag.add_tail(tx_id(2), tx_id(0), tx_id(0));
    dag.set_unsolid(tx_id(2));
    assert!(matches!(
        handle.classifier.tip_info(tx_id(2), lsmi).await,
        Err(TipInfoError::NotSolid)
    ));
}

#[tokio::test]
async fn milestone_advance_is_idempotent() {
    let (mut handle, dag) = setup(relaxed_config());

    dag.add_tail(tx_id(1), tx_id(0), tx_id(0));
    send(&mut handle.pool, TangleEvent::TransactionSolid(tx_id(1))).await;
    send(&mut handle.pool, TangleEvent::MilestoneSolid(MilestoneIndex(5))).await;
    send(&mut handle.pool, TangleEvent::MilestoneSolid(MilestoneIndex(5))).await;

    assert_eq!(handle.events.try_recv(), Ok(TipSelectEvent::TipAdded(tx_id(1))));
    assert_eq!(
        handle.events.try_recv(),
        Ok(TipSelectEvent::MilestoneConfirmed(MilestoneIndex(5)))
    );
    // The repeated milestone is a no-op.
    assert_eq!(handle.events.try_recv(), Err(TryRecvError::Empty));

    assert_eq!(handle.sync.lsmi(), MilestoneIndex(5));
    assert_eq!(handle.selector.select_tips().await, Ok((tx_id(1), tx_id(1))));
}

#[tokio::test]
async fn lagging_lsmi_refuses_selection() {
    let (mut handle, dag) = setup(relaxed_config());

    dag.add_tail(tx_id(1), tx_id(0), tx_id(0));
    send(&mut handle.pool, TangleEvent::TransactionSolid(tx_id(1))).await;

    handle.latest_milestone.update(MilestoneIndex(10));

    assert_eq!(
        handle.selector.select_tips().await,
        Err(TipSelectError::NodeNotSynced)
    );
}

#[tokio::test(start_paused = true)]
async fn aged_tips_are_evicted() {
    let (mut handle, dag) = setup(relaxed_config());

    dag.add_tail(tx_id(1), tx_id(0), tx_id(0));
    send(&mut handle.pool, TangleEvent::TransactionSolid(tx_id(1))).await;
    assert_eq!(handle.events.try_recv(), Ok(TipSelectEvent::TipAdded(tx_id(1))));

    tokio::time::sleep(Duration::from_secs(181)).await;

    assert_eq!(
        handle.selector.select_tips().await,
        Err(TipSelectError::NoTipsAvailable)
    );
    assert_eq!(
        handle.events.try_recv(),
        Ok(TipSelectEvent::TipRemoved(tx_id(1)))
    );
}

#[tokio::test]
async fn cached_scores_survive_an_advance() {
    let (mut handle, dag) = setup(relaxed_config());

    dag.add_tail(tx_id(1), tx_id(0), tx_id(0));
    dag.confirm(tx_id(1), MilestoneIndex(5));
    send(&mut handle.pool, TangleEvent::MilestoneSolid(MilestoneIndex(5))).await;

    dag.add_tail(tx_id(2), tx_id(1), tx_id(1));
    send(&mut handle.pool, TangleEvent::TransactionSolid(tx_id(2))).await;

    // Even with the parent gone from the store, selection keeps working off
    // the memoised scores.
    dag.remove(tx_id(1));
    send(&mut handle.pool, TangleEvent::MilestoneSolid(MilestoneIndex(6))).await;
    assert_eq!(handle.selector.select_tips().await, Ok((tx_id(2), tx_id(2))));
}

#[tokio::test]
async fn pruning_invalidates_cached_scores() {
    let (mut handle, dag) = setup(relaxed_config());

    dag.add_tail(tx_id(1), tx_id(0), tx_id(0));
    dag.confirm(tx_id(1), MilestoneIndex(5));
    send(&mut handle.pool, TangleEvent::MilestoneSolid(MilestoneIndex(5))).await;

    dag.add_tail(tx_id(2), tx_id(1), tx_id(1));
    send(&mut handle.pool, TangleEvent::TransactionSolid(tx_id(2))).await;

    // Pruning drops the cached scores; with the parent gone the pick can no
    // longer be re-validated.
    send(&mut handle.pool, TangleEvent::Pruned(MilestoneIndex(5))).await;
    dag.remove(tx_id(1));

    assert_eq!(
        handle.selector.select_tips().await,
        Err(TipSelectError::NoTipsAvailable)
    );
}

#[tokio::test(start_paused = true)]
async fn stalled_store_times_out_selection() {
    let config = Arc::new(relaxed_config());

    let oracle = IndexOracle::new(StalledDag);
    let classifier = Classifier::new(StalledDag, oracle, Arc::clone(&config));

    let (_lsmi_tx, lsmi_rx) = watch::channel(MilestoneIndex(0));
    let (sync, _latest) = sync_status(lsmi_rx);

    let snapshot = PoolSnapshot {
        non_lazy: IndexSet::from([tx_id(1)]),
        semi_lazy: IndexSet::new(),
        lsmi: MilestoneIndex(0),
    };
    let selector = TipSelector::new(
        Arc::new(ArcSwap::from_pointee(snapshot)),
        classifier,
        sync,
        config,
    );

    assert_eq!(
        selector.select_tips().await,
        Err(TipSelectError::SelectTimeout)
    );
}
