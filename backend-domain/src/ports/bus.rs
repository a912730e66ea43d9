use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::errors::BusError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub channel: String,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Message(BusMessage),
    /// The subscriber connection was re-established; previous subscriptions
    /// are gone.
    Reconnected,
}

/// Publish/subscribe transport shared by every relay process.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError>;
    async fn subscribe(&self, channels: &[String]) -> Result<(), BusError>;
    async fn unsubscribe(&self, channels: &[String]) -> Result<(), BusError>;
    fn events(&self) -> broadcast::Receiver<BusEvent>;
    async fn ping(&self) -> Result<(), BusError>;
}
