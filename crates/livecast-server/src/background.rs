//! Background tasks for the Livecast server.
//!
//! Includes:
//! - Returning cooled-down API keys to rotation.

use livecast_voice::CredentialRotator;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Starts the credential sweep task.
///
/// `acquire()` already promotes expired cooldowns lazily; the sweep keeps the
/// status endpoint accurate while no generation is running. Runs until the
/// runtime shuts down.
pub async fn start_credential_sweep_task(rotator: Arc<CredentialRotator>, interval_seconds: u64) {
    if interval_seconds == 0 {
        tracing::warn!("credential sweep task disabled (interval=0)");
        return;
    }
    let interval = Duration::from_secs(interval_seconds);

    tracing::info!(interval_seconds, keys = rotator.len(), "starting credential sweep task");

    loop {
        sleep(interval).await;

        let promoted = rotator.sweep();
        if promoted > 0 {
            tracing::info!(count = promoted, "api keys returned to rotation after cooldown");
        }
    }
}
