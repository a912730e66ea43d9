use std::sync::Arc;
use std::time::Duration;

use backend_domain::ports::HealthCheckService;
use backend_domain::{MessageBus, RoomStore, RuntimeConfig, SchemaRegistry};

use crate::realtime::{ConnectionGateway, FanoutBridge, MembershipHooks, SeatReleaseHooks};
use crate::rooms::{AdmissionController, ExpiryWatcher, RoomLifecycle};
use crate::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: RuntimeConfig,
    pub store: Arc<dyn RoomStore>,
    pub registry: Arc<SchemaRegistry>,
    pub bridge: Arc<FanoutBridge>,
    pub gateway: Arc<ConnectionGateway>,
    pub admission: Arc<AdmissionController>,
    pub lifecycle: Arc<RoomLifecycle>,
    pub health: Arc<dyn HealthCheckService>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Wires the core with the seat-releasing leave hook.
    pub fn new(
        config: RuntimeConfig,
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn RoomStore>,
        health: Arc<dyn HealthCheckService>,
    ) -> anyhow::Result<Self> {
        let hooks = Arc::new(SeatReleaseHooks::new(store.clone()));
        Self::with_hooks(config, bus, store, health, hooks)
    }

    pub fn with_hooks(
        config: RuntimeConfig,
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn RoomStore>,
        health: Arc<dyn HealthCheckService>,
        hooks: Arc<dyn MembershipHooks>,
    ) -> anyhow::Result<Self> {
        let metrics = Arc::new(Metrics::default());
        let registry = Arc::new(SchemaRegistry::default());
        let bridge = Arc::new(FanoutBridge::new(bus, registry.clone(), metrics.clone()));
        let gateway = Arc::new(ConnectionGateway::new(
            bridge.clone(),
            hooks,
            metrics.clone(),
            config.connection_buffer,
        ));
        let admission = Arc::new(AdmissionController::new(
            store.clone(),
            metrics.clone(),
            config.room_capacity,
        )?);
        let lifecycle = Arc::new(RoomLifecycle::new(
            store.clone(),
            bridge.clone(),
            metrics.clone(),
            config.room_ttl_seconds,
        ));
        Ok(Self {
            config,
            store,
            registry,
            bridge,
            gateway,
            admission,
            lifecycle,
            health,
            metrics,
        })
    }

    pub fn expiry_watcher(&self) -> ExpiryWatcher {
        ExpiryWatcher::new(
            self.store.clone(),
            self.gateway.clone(),
            self.metrics.clone(),
            Duration::from_secs(self.config.expiry_sweep_seconds),
        )
    }
}
