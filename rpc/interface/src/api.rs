use std::sync::Arc;

use tangle_tipselect::{Classifier, SyncStatus, TipSelectConfig, TipSelector};

/// Shared state of the tip-selection REST handlers.
pub struct TipApi<D> {
    pub(crate) selector: TipSelector<D>,
    pub(crate) classifier: Classifier<D>,
    pub(crate) sync: SyncStatus,
    pub(crate) config: Arc<TipSelectConfig>,
    /// Whether tip selection is enabled on this node at all.
    ///
    /// Handlers refuse to serve when it is not; plugin lifecycle management
    /// stays outside the core.
    pub(crate) enabled: bool,
}

impl<D: Clone> Clone for TipApi<D> {
    fn clone(&self) -> Self {
        Self {
            selector: self.selector.clone(),
            classifier: self.classifier.clone(),
            sync: self.sync.clone(),
            config: Arc::clone(&self.config),
            enabled: self.enabled,
        }
    }
}

impl<D> TipApi<D> {
    pub fn new(
        selector: TipSelector<D>,
        classifier: Classifier<D>,
        sync: SyncStatus,
        config: TipSelectConfig,
        enabled: bool,
    ) -> Self {
        Self {
            selector,
            classifier,
            sync,
            config: Arc::new(config),
            enabled,
        }
    }
}
