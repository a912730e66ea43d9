use std::sync::Arc;

use async_trait::async_trait;
use backend_domain::ports::HealthCheckService;
use backend_domain::{MessageBus, RoomStore};

pub struct DefaultHealthService {
    bus: Arc<dyn MessageBus>,
    store: Arc<dyn RoomStore>,
}

impl DefaultHealthService {
    pub fn new(bus: Arc<dyn MessageBus>, store: Arc<dyn RoomStore>) -> Self {
        Self { bus, store }
    }
}

#[async_trait]
impl HealthCheckService for DefaultHealthService {
    async fn check_bus(&self) -> anyhow::Result<bool> {
        self.bus.ping().await.map(|_| true).map_err(Into::into)
    }

    async fn check_store(&self) -> anyhow::Result<bool> {
        self.store.ping().await.map(|_| true)
    }
}
