use std::sync::Arc;

use anyhow::Result;

use backend_application::AppState;
use backend_infrastructure::{connect_backends, AppConfig, DefaultHealthService};

pub struct AppContext {
    pub config: AppConfig,
    pub state: AppState,
}

impl AppContext {
    pub async fn load() -> Result<Self> {
        Self::new(AppConfig::load().await?).await
    }

    pub async fn new(config: AppConfig) -> Result<Self> {
        let backends = connect_backends(&config.to_bus_config()).await?;
        let health = Arc::new(DefaultHealthService::new(
            backends.bus.clone(),
            backends.store.clone(),
        ));
        let state = AppState::new(config.to_runtime_config(), backends.bus, backends.store, health)?;
        Ok(Self { config, state })
    }
}
