use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use ripple_store::FailoverStore;

/// Background task that keeps checking the remote store so a degraded
/// server returns to it once it answers again. `probe` logs transitions.
pub async fn run_probe_loop(store: Arc<FailoverStore>, every: Duration) {
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;

        let reachable = store.probe().await;
        debug!("Store probe: remote reachable = {}", reachable);
    }
}
