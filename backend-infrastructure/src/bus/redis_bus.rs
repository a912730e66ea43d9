use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::{ConnectionManager, PubSub};
use redis::AsyncCommands;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use backend_domain::{BusError, BusEvent, BusMessage, MessageBus};

const EVENT_BUFFER: usize = 1024;

enum SubscriberCommand {
    Subscribe(Vec<String>, oneshot::Sender<Result<(), BusError>>),
    Unsubscribe(Vec<String>, oneshot::Sender<Result<(), BusError>>),
}

impl SubscriberCommand {
    fn reject(self, reason: &str) {
        let (Self::Subscribe(_, reply) | Self::Unsubscribe(_, reply)) = self;
        let _ = reply.send(Err(BusError::Unavailable(reason.to_string())));
    }
}

enum Next {
    Message(Option<redis::Msg>),
    Command(Option<SubscriberCommand>),
}

enum ServeOutcome {
    ConnectionLost,
    Closed,
}

/// Redis pub/sub bus. Publishing goes through a [`ConnectionManager`]; a
/// background task owns the subscriber connection and reconnects it.
pub struct RedisBus {
    publisher: ConnectionManager,
    commands: mpsc::UnboundedSender<SubscriberCommand>,
    events: broadcast::Sender<BusEvent>,
}

impl RedisBus {
    pub async fn connect(url: &str, reconnect_delay: Duration) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let publisher = ConnectionManager::new(client.clone()).await?;
        let pubsub = client.get_async_pubsub().await?;
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, _rx) = broadcast::channel(EVENT_BUFFER);

        tokio::spawn(run_subscriber(
            client,
            pubsub,
            command_rx,
            events.clone(),
            reconnect_delay,
        ));
        info!("redis bus connected");

        Ok(Self {
            publisher,
            commands,
            events,
        })
    }

    async fn send_command(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<(), BusError>>) -> SubscriberCommand,
    ) -> Result<(), BusError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| BusError::Unavailable("subscriber task stopped".to_string()))?;
        response
            .await
            .map_err(|_| BusError::Unavailable("subscriber task stopped".to_string()))?
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
        let mut conn = self.publisher.clone();
        let _: () = conn
            .publish(channel, payload)
            .await
            .map_err(|err| BusError::Unavailable(err.to_string()))?;
        Ok(())
    }

    async fn subscribe(&self, channels: &[String]) -> Result<(), BusError> {
        if channels.is_empty() {
            return Ok(());
        }
        let channels = channels.to_vec();
        self.send_command(|reply| SubscriberCommand::Subscribe(channels, reply))
            .await
    }

    async fn unsubscribe(&self, channels: &[String]) -> Result<(), BusError> {
        if channels.is_empty() {
            return Ok(());
        }
        let channels = channels.to_vec();
        self.send_command(|reply| SubscriberCommand::Unsubscribe(channels, reply))
            .await
    }

    fn events(&self) -> broadcast::Receiver<BusEvent> {
        self.events.subscribe()
    }

    async fn ping(&self) -> Result<(), BusError> {
        let mut conn = self.publisher.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|err| BusError::Unavailable(err.to_string()))?;
        Ok(())
    }
}

async fn run_subscriber(
    client: redis::Client,
    mut pubsub: PubSub,
    mut commands: mpsc::UnboundedReceiver<SubscriberCommand>,
    events: broadcast::Sender<BusEvent>,
    reconnect_delay: Duration,
) {
    loop {
        match serve(&mut pubsub, &mut commands, &events).await {
            ServeOutcome::Closed => {
                debug!("redis subscriber stopped");
                return;
            }
            ServeOutcome::ConnectionLost => {
                warn!("redis subscriber connection lost, reconnecting");
            }
        }

        loop {
            tokio::select! {
                _ = sleep(reconnect_delay) => {}
                command = commands.recv() => match command {
                    Some(command) => {
                        command.reject("redis subscriber reconnecting");
                        continue;
                    }
                    None => return,
                },
            }
            match client.get_async_pubsub().await {
                Ok(fresh) => {
                    pubsub = fresh;
                    info!("redis subscriber reconnected");
                    let _ = events.send(BusEvent::Reconnected);
                    break;
                }
                Err(err) => warn!("redis subscriber reconnect failed: {}", err),
            }
        }
    }
}

async fn serve(
    pubsub: &mut PubSub,
    commands: &mut mpsc::UnboundedReceiver<SubscriberCommand>,
    events: &broadcast::Sender<BusEvent>,
) -> ServeOutcome {
    loop {
        let next = {
            let mut stream = pubsub.on_message();
            tokio::select! {
                message = stream.next() => Next::Message(message),
                command = commands.recv() => Next::Command(command),
            }
        };

        match next {
            Next::Message(Some(message)) => {
                let payload: String = match message.get_payload() {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(
                            "dropping non-text bus payload on {}: {}",
                            message.get_channel_name(),
                            err
                        );
                        continue;
                    }
                };
                let _ = events.send(BusEvent::Message(BusMessage {
                    channel: message.get_channel_name().to_string(),
                    payload,
                }));
            }
            Next::Message(None) => return ServeOutcome::ConnectionLost,
            Next::Command(None) => return ServeOutcome::Closed,
            Next::Command(Some(SubscriberCommand::Subscribe(channels, reply))) => {
                let result = pubsub
                    .subscribe(channels.as_slice())
                    .await
                    .map_err(|err| BusError::Unavailable(err.to_string()));
                let _ = reply.send(result);
            }
            Next::Command(Some(SubscriberCommand::Unsubscribe(channels, reply))) => {
                let result = pubsub
                    .unsubscribe(channels.as_slice())
                    .await
                    .map_err(|err| BusError::Unavailable(err.to_string()));
                let _ = reply.send(result);
            }
        }
    }
}
