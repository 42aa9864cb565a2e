//! The tip pool manager.
//!
//! [`TipPoolManager`] is the single writer of the tip pool. DAG mutation
//! sources (gossip solidifier, milestone processor, pruner) route their
//! events through a [`TipPoolService`]; the manager applies them in order
//! and publishes a fresh [`PoolSnapshot`] after every membership change, so
//! selectors always observe a pool that is fully refreshed for one LSMI.

use std::{
    sync::Arc,
    task::{Context, Poll},
    time::Instant,
};

use arc_swap::ArcSwap;
use futures::{future::BoxFuture, FutureExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::{sync::PollSender, time::DelayQueue};
use tower::Service;
use tracing::Instrument;

use tangle_dag::{store, DagStore, IndexOracle, OracleError};
use tangle_types::{MilestoneIndex, TxId};

use crate::{
    classifier::Classifier,
    pool::{PoolSnapshot, RefreshOutcome, TipEntry, TipPool},
    selector::TipSelector,
    sync::{sync_status, LatestMilestoneHandle, SyncStatus},
    TipSelectConfig, TipSelectEvent,
};

/// Capacity of the subscriber event channel.
const EVENT_CHANNEL_CAPACITY: usize = 128;

/// A DAG mutation routed into the tip pool.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TangleEvent {
    /// This transaction and all of its ancestors are present and
    /// well-formed locally.
    TransactionSolid(TxId),
    /// A milestone became solid, advancing the LSMI.
    MilestoneSolid(MilestoneIndex),
    /// Transactions confirmed at or below this index were removed.
    Pruned(MilestoneIndex),
}

/// The tip pool manager task has exited.
#[derive(Copy, Clone, Debug, thiserror::Error)]
#[error("the tip pool was shut down")]
pub struct TipPoolShutDown;

/// Handle for routing [`TangleEvent`]s into the manager.
///
/// Events from one producer are applied in the order they are sent; the
/// returned future resolves once the mutation is visible to selectors.
#[derive(Clone)]
pub struct TipPoolService {
    tx: PollSender<(TangleEvent, oneshot::Sender<()>)>,
}

impl Service<TangleEvent> for TipPoolService {
    type Response = ();
    type Error = TipPoolShutDown;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.tx.poll_reserve(cx).map_err(|_| TipPoolShutDown)
    }

    fn call(&mut self, event: TangleEvent) -> Self::Future {
        let (tx, rx) = oneshot::channel();

        let res = self
            .tx
            .send_item((event, tx))
            .map_err(|_| TipPoolShutDown);

        async move {
            res?;
            rx.await.map_err(|_| TipPoolShutDown)
        }
        .boxed()
    }
}

/// Everything needed to drive and consume tip selection.
pub struct TipSelectHandle<D> {
    /// Event sink for the DAG mutation sources.
    pub pool: TipPoolService,
    /// Tip selection for message construction and the REST layer.
    pub selector: TipSelector<D>,
    /// Classification and tip-info queries.
    pub classifier: Classifier<D>,
    /// Read-only sync state.
    pub sync: SyncStatus,
    /// Handle for reporting the newest milestone index seen on the network.
    pub latest_milestone: LatestMilestoneHandle,
    /// Pool membership and milestone events.
    pub events: broadcast::Receiver<TipSelectEvent>,
}

/// Spawns the [`TipPoolManager`] and returns its handles.
pub fn start_tip_pool_manager<D>(
    buffer_size: usize,
    dag_store: D,
    config: TipSelectConfig,
) -> TipSelectHandle<D>
where
    D: DagStore + Clone + Send + Sync + 'static,
    D::Future: Send + 'static,
{
    let config = Arc::new(config);

    let (event_tx, event_rx) = mpsc::channel(buffer_size);
    let (lsmi_tx, lsmi_rx) = watch::channel(MilestoneIndex::default());
    let (events_tx, events_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let snapshot = Arc::new(ArcSwap::from_pointee(PoolSnapshot::default()));

    let oracle = IndexOracle::new(dag_store.clone());
    let classifier = Classifier::new(dag_store.clone(), oracle.clone(), Arc::clone(&config));
    let (sync, latest_milestone) = sync_status(lsmi_rx);

    let selector = TipSelector::new(
        Arc::clone(&snapshot),
        classifier.clone(),
        sync.clone(),
        Arc::clone(&config),
    );

    let manager = TipPoolManager {
        store: dag_store,
        oracle,
        classifier: classifier.clone(),
        pool: TipPool::new(config.max_tips, config.retention_rules_tips_limit),
        ttl_timers: DelayQueue::new(),
        snapshot,
        lsmi_tx,
        events_tx,
        config,
    };

    let span = tracing::debug_span!("tip_pool");
    tokio::spawn(manager.run(event_rx).instrument(span));

    TipSelectHandle {
        pool: TipPoolService {
            tx: PollSender::new(event_tx),
        },
        selector,
        classifier,
        sync,
        latest_milestone,
        events: events_rx,
    }
}

/// The tip pool manager.
///
/// Owns the pool and serialises every mutation through its event loop.
pub struct TipPoolManager<D> {
    store: D,
    oracle: IndexOracle<D>,
    classifier: Classifier<D>,
    pool: TipPool,
    /// Max-age timers of the current pool entries.
    ttl_timers: DelayQueue<TxId>,
    snapshot: Arc<ArcSwap<PoolSnapshot>>,
    lsmi_tx: watch::Sender<MilestoneIndex>,
    events_tx: broadcast::Sender<TipSelectEvent>,
    config: Arc<TipSelectConfig>,
}

impl<D> TipPoolManager<D>
where
    D: DagStore + Clone + Send + 'static,
    D::Future: Send + 'static,
{
    /// Runs the manager until all event producers are gone or the DAG store
    /// turns out to be unusable.
    pub(crate) async fn run(
        mut self,
        mut rx: mpsc::Receiver<(TangleEvent, oneshot::Sender<()>)>,
    ) {
        tracing::debug!("Starting tip pool manager, config: {:?}", self.config);

        loop {
            tokio::select! {
                // biased so expired tips leave before new events touch them.
                biased;
                Some(expired) = self.ttl_timers.next() => {
                    let tx_id = expired.into_inner();
                    tracing::debug!("Tip {tx_id} exceeded its max age, evicting");

                    if self.pool.remove(&tx_id).is_some() {
                        self.emit(TipSelectEvent::TipRemoved(tx_id));
                        self.publish_snapshot();
                    }
                }
                event = rx.recv() => {
                    let Some((event, ack)) = event else {
                        tracing::debug!("All event producers gone, shutting down tip pool");
                        return;
                    };

                    let res = self.handle_event(event).await;
                    let _ = ack.send(());

                    if let Err(e) = res {
                        tracing::error!("DAG store is unusable, shutting down tip pool: {e}");
                        return;
                    }
                }
            }
        }
    }

    fn lsmi(&self) -> MilestoneIndex {
        *self.lsmi_tx.borrow()
    }

    /// Handles one event. Only fatal store conditions bubble up; anything
    /// recoverable is skipped and retried on a later event.
    async fn handle_event(&mut self, event: TangleEvent) -> Result<(), OracleError> {
        match event {
            TangleEvent::TransactionSolid(tx_id) => self.handle_transaction_solid(tx_id).await,
            TangleEvent::MilestoneSolid(index) => self.handle_milestone_solid(index).await,
            TangleEvent::Pruned(index) => {
                self.oracle.invalidate_below(index);
                Ok(())
            }
        }
    }

    async fn handle_transaction_solid(&mut self, tx_id: TxId) -> Result<(), OracleError> {
        let mut dag = self.store.clone();

        let meta = match store::tx_metadata(&mut dag, tx_id).await {
            Ok(Some(meta)) => meta,
            Ok(None) => {
                tracing::trace!("Solid transaction {tx_id} disappeared before handling");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!("Could not read metadata of {tx_id}: {e}");
                return Ok(());
            }
        };

        let mut changed = false;

        // The new transaction makes its parents one child closer to useless
        // as leaves.
        let [trunk, branch] = meta.parents();
        for parent in [Some(trunk), (trunk != branch).then_some(branch)]
            .into_iter()
            .flatten()
        {
            if let Some(evicted) = self.pool.register_child(&parent) {
                tracing::debug!(
                    "Tip {} reached {} children, evicting",
                    evicted.id,
                    evicted.child_count
                );
                self.ttl_timers.remove(&evicted.ttl_key);
                self.emit(TipSelectEvent::TipRemoved(evicted.id));
                changed = true;
            }
        }

        if meta.is_tail && !meta.conflicting && !self.pool.contains(&tx_id) {
            changed |= self.admit(tx_id).await?;
        }

        if changed {
            self.publish_snapshot();
        }
        Ok(())
    }

    /// Classifies and inserts a new candidate tip. Returns whether the pool
    /// membership changed.
    async fn admit(&mut self, tx_id: TxId) -> Result<bool, OracleError> {
        let lsmi = self.lsmi();

        let (class, indexes) = match self.classifier.classify_with_indexes(tx_id, lsmi).await {
            Ok(res) => res,
            Err(OracleError::Indeterminate) => {
                tracing::trace!("Cannot score candidate tip {tx_id} yet, skipping");
                return Ok(false);
            }
            Err(OracleError::Store(e)) => {
                tracing::warn!("DAG store error scoring candidate tip {tx_id}: {e}");
                return Ok(false);
            }
            Err(e @ OracleError::SnapshotInfoMissing) => return Err(e),
        };

        let Some(tier) = class.tier() else {
            tracing::trace!("Candidate tip {tx_id} is already lazy, dropping");
            return Ok(false);
        };

        let entry = TipEntry {
            id: tx_id,
            tier,
            inserted_at: Instant::now(),
            child_count: 0,
            last_ytrsi: indexes.ytrsi,
            last_otrsi: indexes.otrsi,
            refresh_milestone: lsmi,
            ttl_key: self.ttl_timers.insert(tx_id, self.config.max_age()),
        };

        for evicted in self.pool.insert(entry) {
            tracing::debug!(
                "Tip pool over capacity, evicting {} after {:?}",
                evicted.id,
                evicted.inserted_at.elapsed()
            );
            self.ttl_timers.remove(&evicted.ttl_key);
            self.emit(TipSelectEvent::TipRemoved(evicted.id));
        }

        tracing::debug!("Added {tier:?} tip {tx_id}");
        self.emit(TipSelectEvent::TipAdded(tx_id));
        Ok(true)
    }

    async fn handle_milestone_solid(&mut self, index: MilestoneIndex) -> Result<(), OracleError> {
        if index <= self.lsmi() {
            tracing::trace!("Milestone {index} does not advance the LSMI, ignoring");
            return Ok(());
        }
        self.lsmi_tx.send_replace(index);

        for tx_id in self.pool.refresh_candidates(index) {
            let (class, indexes) = match self.classifier.classify_with_indexes(tx_id, index).await
            {
                Ok(res) => res,
                Err(OracleError::Indeterminate) => {
                    tracing::trace!("Deferring refresh of tip {tx_id}, cone has a gap");
                    continue;
                }
                Err(OracleError::Store(e)) => {
                    tracing::warn!("DAG store error refreshing tip {tx_id}: {e}");
                    continue;
                }
                Err(e @ OracleError::SnapshotInfoMissing) => return Err(e),
            };

            match self.pool.apply_refresh(&tx_id, class, indexes, index) {
                RefreshOutcome::Evicted(entry) => {
                    tracing::debug!("Tip {} went lazy at milestone {index}, evicting", entry.id);
                    self.ttl_timers.remove(&entry.ttl_key);
                    self.emit(TipSelectEvent::TipRemoved(entry.id));
                }
                RefreshOutcome::Retiered => {
                    tracing::debug!("Tip {tx_id} changed tiers at milestone {index}");
                }
                RefreshOutcome::Unchanged => {}
            }
        }

        // One snapshot swap per milestone: selection never observes a
        // half-refreshed pool.
        self.publish_snapshot();
        self.emit(TipSelectEvent::MilestoneConfirmed(index));
        Ok(())
    }

    fn publish_snapshot(&self) {
        self.snapshot.store(Arc::new(self.pool.snapshot(self.lsmi())));
    }

    fn emit(&self, event: TipSelectEvent) {
        // Dropped subscribers are fine.
        let _ = self.events_tx.send(event);
    }
}
