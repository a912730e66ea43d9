use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use backend_domain::RoomStore;

use crate::realtime::ConnectionGateway;
use crate::Metrics;

/// Notices rooms that expired in the store while this process still has
/// sockets in them, and sends those sockets `chat:destroy`. Only local
/// connections are told, so every process notifies its own sockets once.
pub struct ExpiryWatcher {
    store: Arc<dyn RoomStore>,
    gateway: Arc<ConnectionGateway>,
    metrics: Arc<Metrics>,
    period: Duration,
}

impl ExpiryWatcher {
    pub fn new(
        store: Arc<dyn RoomStore>,
        gateway: Arc<ConnectionGateway>,
        metrics: Arc<Metrics>,
        period: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            metrics,
            period,
        }
    }

    /// One pass over the locally joined rooms. Returns how many were found
    /// expired.
    pub async fn sweep(&self) -> usize {
        let mut expired = 0;
        for room_id in self.gateway.joined_rooms() {
            match self.store.room_exists(&room_id).await {
                Ok(true) => {}
                Ok(false) => {
                    let notified = self.gateway.emit_local_destroy(&room_id).await;
                    self.metrics.record_room_expired();
                    info!("room {} expired, notified {} local connections", room_id, notified);
                    expired += 1;
                }
                Err(err) => warn!("expiry check for room {} failed: {:#}", room_id, err),
            }
        }
        expired
    }

    /// Starts the periodic sweep. A zero period disables the watcher.
    pub fn spawn(self: Arc<Self>) -> Option<JoinHandle<()>> {
        if self.period.is_zero() {
            info!("room expiry watcher disabled");
            return None;
        }
        Some(tokio::spawn(async move { self.run().await }))
    }

    async fn run(&self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            self.sweep().await;
        }
    }
}
