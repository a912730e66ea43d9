use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use backend_domain::{BusConfig, MessageBus, RoomStore};

use crate::bus::{MemoryBusHub, RedisBus};
use crate::config::bus_scheme;
use crate::store::{MemoryStore, RedisStore};

/// Bus and store handles for one relay process.
#[derive(Clone)]
pub struct Backends {
    pub bus: Arc<dyn MessageBus>,
    pub store: Arc<dyn RoomStore>,
}

impl Backends {
    /// Single-process backends. Rooms and messages live only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            bus: Arc::new(MemoryBusHub::new().connect()),
            store: Arc::new(MemoryStore::new()),
        }
    }
}

pub async fn connect_backends(config: &BusConfig) -> Result<Backends> {
    match bus_scheme(&config.bus_url)? {
        "memory" => {
            info!("using in-process bus and store");
            Ok(Backends::in_memory())
        }
        _ => {
            let reconnect = Duration::from_secs(config.bus_reconnect_seconds.max(1));
            let bus = RedisBus::connect(&config.bus_url, reconnect).await?;
            let store = RedisStore::connect(&config.bus_url).await?;
            info!("using redis bus and store at {}", redact_url(&config.bus_url));
            Ok(Backends {
                bus: Arc::new(bus),
                store: Arc::new(store),
            })
        }
    }
}

/// Strips credentials from a connection url before it is logged.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
