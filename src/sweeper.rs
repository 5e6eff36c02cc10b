use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::service::ChatService;

/// Spawn the periodic expiry sweep. The interval comes from the service's
/// config and is validated there to sit strictly below the smallest
/// allowed message duration. Abort the returned handle on shutdown.
pub fn spawn(service: Arc<ChatService>) -> JoinHandle<()> {
    let period = service.config().sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick fires immediately; harmless, the store is empty
        // or the sweep is idempotent anyway
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now().timestamp_millis();
            let removed = service.sweep(now);
            if removed > 0 {
                debug!("Sweep tick removed {} messages", removed);
            }
        }
    })
}
