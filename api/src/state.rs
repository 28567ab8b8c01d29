use std::sync::Arc;

use common::lifecycle::ReminderLifecycleManager;
use common::users::OwnerRegistry;
use metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<ReminderLifecycleManager>,
    pub owners: Arc<OwnerRegistry>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new AppState instance
    pub fn new(
        lifecycle: Arc<ReminderLifecycleManager>,
        owners: Arc<OwnerRegistry>,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            lifecycle,
            owners,
            metrics_handle,
        }
    }
}
