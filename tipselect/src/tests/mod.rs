mod urts;

use std::task::{Context, Poll};

use futures::{future::BoxFuture, FutureExt};
use tower::{Service, ServiceExt};

use tangle_test_utils::MockDag;
use tangle_types::{
    dag::{DagReadRequest, DagReadResponse},
    MilestoneIndex,
};

use crate::{start_tip_pool_manager, TangleEvent, TipPoolService, TipSelectConfig, TipSelectHandle};

/// A config with every threshold wide open; individual tests tighten what
/// they exercise.
pub(crate) fn relaxed_config() -> TipSelectConfig {
    TipSelectConfig {
        below_max_depth: 100,
        max_delta_tx_youngest_root_snapshot_index_to_lsmi: 100,
        max_delta_tx_approvees_oldest_root_snapshot_index_to_lsmi: 100,
        max_tips: 100,
        max_age_seconds: 180,
        retention_rules_tips_limit: 2,
        max_retries: 8,
        sync_threshold: 2,
        select_timeout_millis: 1_000,
    }
}

pub(crate) fn setup(config: TipSelectConfig) -> (TipSelectHandle<MockDag>, MockDag) {
    let dag = MockDag::new(MilestoneIndex(0));
    let handle = start_tip_pool_manager(16, dag.clone(), config);
    (handle, dag)
}

/// Routes one event and waits until its mutation is visible.
pub(crate) async fn send(pool: &mut TipPoolService, event: TangleEvent) {
    pool.ready()
        .await
        .expect("tip pool is running")
        .call(event)
        .await
        .expect("tip pool is running");
}

/// A DAG store whose reads never complete.
#[derive(Clone, Debug)]
pub(crate) struct StalledDag;

impl Service<DagReadRequest> for StalledDag {
    type Response = DagReadResponse;
    type Error = tower::BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _: DagReadRequest) -> Self::Future {
        futures::future::pending().boxed()
    }
}
