use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::broadcast;

use backend_domain::{BusError, BusEvent, BusMessage, MessageBus};

const EVENT_BUFFER: usize = 1024;

/// In-process stand-in for the shared bus. Every [`MemoryBus`] handle made by
/// [`MemoryBusHub::connect`] behaves like one relay process's connection.
#[derive(Clone, Default)]
pub struct MemoryBusHub {
    inner: Arc<Mutex<HubState>>,
}

struct HubState {
    available: bool,
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
}

impl Default for HubState {
    fn default() -> Self {
        Self {
            available: true,
            next_id: 0,
            subscribers: HashMap::new(),
        }
    }
}

struct Subscriber {
    channels: HashSet<String>,
    tx: broadcast::Sender<BusEvent>,
}

impl MemoryBusHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self) -> MemoryBus {
        let (tx, _rx) = broadcast::channel(EVENT_BUFFER);
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.subscribers.insert(
            id,
            Subscriber {
                channels: HashSet::new(),
                tx: tx.clone(),
            },
        );
        MemoryBus {
            hub: self.clone(),
            id,
            events: tx,
        }
    }

    /// Toggles simulated connectivity. While unavailable every operation
    /// fails with [`BusError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Drops every subscription and tells each handle it reconnected.
    pub fn simulate_reconnect(&self) {
        let mut state = self.lock();
        for subscriber in state.subscribers.values_mut() {
            subscriber.channels.clear();
            let _ = subscriber.tx.send(BusEvent::Reconnected);
        }
    }

    pub fn subscription_count(&self, channel: &str) -> usize {
        self.lock()
            .subscribers
            .values()
            .filter(|subscriber| subscriber.channels.contains(channel))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct MemoryBus {
    hub: MemoryBusHub,
    id: u64,
    events: broadcast::Sender<BusEvent>,
}

impl MemoryBus {
    fn ensure_available(state: &HubState) -> Result<(), BusError> {
        if state.available {
            Ok(())
        } else {
            Err(BusError::Unavailable("memory bus offline".to_string()))
        }
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
        let state = self.hub.lock();
        Self::ensure_available(&state)?;
        for subscriber in state.subscribers.values() {
            if subscriber.channels.contains(channel) {
                let _ = subscriber.tx.send(BusEvent::Message(BusMessage {
                    channel: channel.to_string(),
                    payload: payload.to_string(),
                }));
            }
        }
        Ok(())
    }

    async fn subscribe(&self, channels: &[String]) -> Result<(), BusError> {
        let mut state = self.hub.lock();
        Self::ensure_available(&state)?;
        if let Some(subscriber) = state.subscribers.get_mut(&self.id) {
            subscriber.channels.extend(channels.iter().cloned());
        }
        Ok(())
    }

    async fn unsubscribe(&self, channels: &[String]) -> Result<(), BusError> {
        let mut state = self.hub.lock();
        Self::ensure_available(&state)?;
        if let Some(subscriber) = state.subscribers.get_mut(&self.id) {
            for channel in channels {
                subscriber.channels.remove(channel);
            }
        }
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<BusEvent> {
        self.events.subscribe()
    }

    async fn ping(&self) -> Result<(), BusError> {
        Self::ensure_available(&self.hub.lock())
    }
}

impl Drop for MemoryBus {
    fn drop(&mut self) {
        self.hub.lock().subscribers.remove(&self.id);
    }
}
