//! Shutdown signalling shared by the long-running tasks

use std::time::Duration;
use tokio::sync::watch;

/// Resolve once shutdown is signalled. A dropped sender counts as shutdown.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Sleep for `delay` unless shutdown comes first. Returns `true` on shutdown.
pub async fn sleep_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = wait_for_shutdown(shutdown) => true,
        _ = tokio::time::sleep(delay) => false,
    }
}
