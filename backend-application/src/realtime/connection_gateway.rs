use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use backend_domain::{
    BusChannel, BusEvent, BusMessage, ChatDestroy, ChatEvent, ConnectionId, EventKind,
    MembershipToken, RoomId,
};

use super::{FanoutBridge, MembershipHooks, RoomMember};
use crate::{AppError, Metrics};

/// Server-to-client socket frame: `{"event": "chat:message", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundFrame {
    pub event: String,
    pub data: Value,
}

impl OutboundFrame {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            event: "error".to_string(),
            data: json!({ "message": message.into() }),
        }
    }
}

struct ConnectionEntry {
    sender: mpsc::Sender<OutboundFrame>,
    token: Option<MembershipToken>,
    rooms: HashSet<RoomId>,
}

#[derive(Default)]
struct LocalGroups {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
}

impl LocalGroups {
    /// Removes `connection_id` from the room's group. Returns true when the
    /// group became empty and was dropped.
    fn detach(&mut self, room_id: &RoomId, connection_id: ConnectionId) -> bool {
        let Some(members) = self.rooms.get_mut(room_id) else {
            return false;
        };
        members.remove(&connection_id);
        if members.is_empty() {
            self.rooms.remove(room_id);
            return true;
        }
        false
    }

    /// Drops the whole room group, returning the members that left it.
    fn take_room(&mut self, room_id: &RoomId) -> Vec<RoomMember> {
        let Some(ids) = self.rooms.remove(room_id) else {
            return Vec::new();
        };
        ids.into_iter()
            .filter_map(|connection_id| {
                let entry = self.connections.get_mut(&connection_id)?;
                entry.rooms.remove(room_id);
                Some(RoomMember {
                    connection_id,
                    room_id: room_id.clone(),
                    token: entry.token.clone(),
                })
            })
            .collect()
    }
}

/// Owns this process's live socket connections and their room groups.
///
/// Group bookkeeping happens under a plain mutex that is never held across an
/// await; hooks and bus calls run after the lock is released.
pub struct ConnectionGateway {
    bridge: Arc<FanoutBridge>,
    hooks: Arc<dyn MembershipHooks>,
    metrics: Arc<Metrics>,
    buffer: usize,
    groups: Mutex<LocalGroups>,
}

impl ConnectionGateway {
    pub fn new(
        bridge: Arc<FanoutBridge>,
        hooks: Arc<dyn MembershipHooks>,
        metrics: Arc<Metrics>,
        buffer: usize,
    ) -> Self {
        Self {
            bridge,
            hooks,
            metrics,
            buffer: buffer.max(1),
            groups: Mutex::new(LocalGroups::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LocalGroups> {
        self.groups.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a connection. `token` is the membership cookie presented at
    /// upgrade, used to decide who may see a message's owner marker.
    pub fn connect(&self, token: Option<MembershipToken>) -> (ConnectionId, mpsc::Receiver<OutboundFrame>) {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let connection_id = ConnectionId::new();
        self.lock().connections.insert(
            connection_id,
            ConnectionEntry {
                sender,
                token,
                rooms: HashSet::new(),
            },
        );
        self.metrics.connection_opened();
        info!("connection {} opened", connection_id);
        (connection_id, receiver)
    }

    /// Adds the connection to the room group, runs the join hook, then makes
    /// sure this process listens on the room's bus channels. Returns false
    /// when the connection was already in the room.
    pub async fn join(&self, connection_id: ConnectionId, room_id: RoomId) -> Result<bool, AppError> {
        let member = {
            let mut guard = self.lock();
            let groups = &mut *guard;
            let Some(entry) = groups.connections.get_mut(&connection_id) else {
                return Err(AppError::NotFound(format!("connection {}", connection_id)));
            };
            if !entry.rooms.insert(room_id.clone()) {
                return Ok(false);
            }
            let token = entry.token.clone();
            groups
                .rooms
                .entry(room_id.clone())
                .or_default()
                .insert(connection_id);
            RoomMember {
                connection_id,
                room_id,
                token,
            }
        };
        info!("connection {} joined room {}", connection_id, member.room_id);

        if let Err(err) = self.hooks.on_join(&member).await {
            self.metrics.record_hook_failure();
            warn!("join hook failed for room {}: {:#}", member.room_id, err);
        }
        self.bridge.ensure_room_subscribed(&member.room_id).await?;
        Ok(true)
    }

    /// Explicit leave. Returns false when the connection was not in the room.
    pub async fn leave(&self, connection_id: ConnectionId, room_id: &RoomId) -> bool {
        let (member, emptied) = {
            let mut guard = self.lock();
            let groups = &mut *guard;
            let Some(entry) = groups.connections.get_mut(&connection_id) else {
                return false;
            };
            if !entry.rooms.remove(room_id) {
                return false;
            }
            let member = RoomMember {
                connection_id,
                room_id: room_id.clone(),
                token: entry.token.clone(),
            };
            let emptied = groups.detach(room_id, connection_id);
            (member, emptied)
        };
        self.finish_leave(&member, emptied).await;
        true
    }

    /// Tears a connection down, leaving every room it still occupies. The
    /// entry is removed under the lock, so each room's leave fires once even
    /// if an explicit leave races with the disconnect.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> usize {
        let departures: Vec<(RoomMember, bool)> = {
            let mut guard = self.lock();
            let groups = &mut *guard;
            let Some(entry) = groups.connections.remove(&connection_id) else {
                return 0;
            };
            let token = entry.token;
            entry
                .rooms
                .into_iter()
                .map(|room_id| {
                    let emptied = groups.detach(&room_id, connection_id);
                    let member = RoomMember {
                        connection_id,
                        room_id,
                        token: token.clone(),
                    };
                    (member, emptied)
                })
                .collect()
        };
        self.metrics.connection_closed();
        info!(
            "connection {} closed, leaving {} rooms",
            connection_id,
            departures.len()
        );

        for (member, emptied) in &departures {
            self.finish_leave(member, *emptied).await;
        }
        departures.len()
    }

    async fn finish_leave(&self, member: &RoomMember, emptied: bool) {
        debug!("connection {} left room {}", member.connection_id, member.room_id);
        if let Err(err) = self.hooks.on_leave(member).await {
            self.metrics.record_hook_failure();
            warn!("leave hook failed for room {}: {:#}", member.room_id, err);
        }
        if emptied {
            self.release_if_idle(&member.room_id).await;
        }
    }

    async fn release_if_idle(&self, room_id: &RoomId) {
        let _ = self.bridge.release_room(room_id).await;
        // A join may have slipped in while the channels were being released.
        if self.room_size(room_id) > 0 {
            if let Err(err) = self.bridge.ensure_room_subscribed(room_id).await {
                warn!("room {} resubscribe after release failed: {}", room_id, err);
            }
        }
    }

    /// Removes every local connection from the room, firing the leave hook
    /// once per connection.
    pub async fn evict_room(&self, room_id: &RoomId) -> usize {
        let members = self.lock().take_room(room_id);
        self.finish_eviction(room_id, members).await
    }

    async fn finish_eviction(&self, room_id: &RoomId, members: Vec<RoomMember>) -> usize {
        if members.is_empty() {
            return 0;
        }
        for member in &members {
            self.finish_leave(member, false).await;
        }
        self.release_if_idle(room_id).await;
        info!("evicted {} connections from room {}", members.len(), room_id);
        members.len()
    }

    /// Sends the event to the local connections the channel addresses:
    /// the room's group for room-scoped channels, everyone otherwise.
    pub fn deliver(&self, channel: &BusChannel, event: &ChatEvent) -> usize {
        let groups = self.lock();
        self.send_frames(&groups, channel, event)
    }

    fn send_frames(&self, groups: &LocalGroups, channel: &BusChannel, event: &ChatEvent) -> usize {
        let targets: Vec<(&ConnectionId, &ConnectionEntry)> = match &channel.room_id {
            Some(room_id) => groups
                .rooms
                .get(room_id)
                .map(|members| {
                    members
                        .iter()
                        .filter_map(|id| groups.connections.get_key_value(id))
                        .collect()
                })
                .unwrap_or_default(),
            None => groups.connections.iter().collect(),
        };

        let event_name = channel.socket_event_name();
        let mut delivered = 0;
        for (connection_id, entry) in targets {
            let data = match event {
                ChatEvent::Message(message) => {
                    serde_json::to_value(message.clone().redacted_for(entry.token.as_ref()))
                }
                ChatEvent::Destroy(destroy) => serde_json::to_value(destroy),
            };
            let data = match data {
                Ok(data) => data,
                Err(err) => {
                    warn!("failed to encode {} frame: {}", event_name, err);
                    continue;
                }
            };
            let frame = OutboundFrame {
                event: event_name.clone(),
                data,
            };
            match entry.sender.try_send(frame) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.metrics.record_dropped(1);
                    warn!("outbound buffer full, dropping {} for connection {}", event_name, connection_id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    /// Delivers locally; a room-scoped destroy also evicts the room's group.
    /// The destroy is sent and the group dropped under one lock, so racing
    /// destroys for the same room reach each connection once.
    pub async fn dispatch(&self, channel: &BusChannel, event: &ChatEvent) -> usize {
        let (ChatEvent::Destroy(_), Some(room_id)) = (event, &channel.room_id) else {
            return self.deliver(channel, event);
        };
        let (delivered, members) = {
            let mut groups = self.lock();
            let delivered = self.send_frames(&groups, channel, event);
            (delivered, groups.take_room(room_id))
        };
        self.finish_eviction(room_id, members).await;
        delivered
    }

    /// Emits `chat:destroy` to this process's connections only, without
    /// touching the bus.
    pub async fn emit_local_destroy(&self, room_id: &RoomId) -> usize {
        let channel = BusChannel::for_kind(EventKind::ChatDestroy, Some(room_id));
        let event = ChatEvent::Destroy(ChatDestroy::new(room_id.clone()));
        self.dispatch(&channel, &event).await
    }

    /// Queues a frame for one connection, e.g. an error reply.
    pub fn send_to(&self, connection_id: ConnectionId, frame: OutboundFrame) -> bool {
        self.lock()
            .connections
            .get(&connection_id)
            .map(|entry| entry.sender.try_send(frame).is_ok())
            .unwrap_or(false)
    }

    /// Rooms with at least one local connection.
    pub fn joined_rooms(&self) -> Vec<RoomId> {
        self.lock().rooms.keys().cloned().collect()
    }

    pub fn room_size(&self, room_id: &RoomId) -> usize {
        self.lock().rooms.get(room_id).map(HashSet::len).unwrap_or(0)
    }

    pub fn connection_count(&self) -> usize {
        self.lock().connections.len()
    }

    /// Decodes one bus message and fans it out locally. Bad payloads are
    /// logged and dropped.
    pub async fn relay(&self, message: &BusMessage) -> usize {
        match self.bridge.decode(message) {
            Ok((channel, event)) => {
                self.metrics.record_relayed();
                self.dispatch(&channel, &event).await
            }
            Err(err) => {
                self.metrics.record_dropped(1);
                warn!("dropping bus payload on {}: {}", message.channel, err);
                0
            }
        }
    }

    /// Spawns the relay loop. The bus receiver is taken before returning, so
    /// nothing published after `start` is missed.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let events = self.bridge.events();
        let gateway = Arc::clone(self);
        tokio::spawn(async move { gateway.run(events).await })
    }

    async fn run(self: Arc<Self>, mut events: broadcast::Receiver<BusEvent>) {
        if let Err(err) = self.bridge.ensure_global_subscribed().await {
            warn!("global channel subscribe failed: {}", err);
        }
        loop {
            match events.recv().await {
                Ok(BusEvent::Message(message)) => {
                    self.relay(&message).await;
                }
                Ok(BusEvent::Reconnected) => {
                    let rooms = self.joined_rooms();
                    info!("bus reconnected, restoring {} rooms", rooms.len());
                    self.bridge.resubscribe(&rooms).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    self.metrics.record_dropped(skipped);
                    warn!("relay loop lagged, {} bus messages skipped", skipped);
                }
                Err(RecvError::Closed) => {
                    info!("bus event stream closed, relay loop stopping");
                    return;
                }
            }
        }
    }
}
