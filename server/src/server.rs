use std::collections::HashMap;

use tokio::sync::mpsc::{channel, Sender};

use system::{ClientEvent, ConnectionId, Participant, SessionId};

use crate::auth::Identity;
use crate::connection::ConnectionEvent;
use crate::outbox::{ConnectionTx, Outbox};
use crate::room::{spawn_room, RoomCommand, RoomTx};

const GATEWAY_QUEUE_CAPACITY: usize = 256;

#[derive(Debug)]
pub enum ServerCommand {
    Connect {
        tx: ConnectionTx,
        identity: Identity,
    },
    Disconnect {
        from: ConnectionId,
    },
    Event {
        from: ConnectionId,
        event: ClientEvent,
    },
    RoomClosed {
        session_id: SessionId,
    },
}

pub type ServerTx = Sender<ServerCommand>;

/// Gateway state: who is connected, who they are, and where they are.
/// Owned by the single gateway task; it routes, rooms mutate.
struct Server {
    self_tx: ServerTx,
    connection_id_source: ConnectionId,
    connections: Outbox,
    identities: HashMap<ConnectionId, Identity>,
    locations: HashMap<ConnectionId, SessionId>,
    rooms: HashMap<SessionId, RoomTx>,
}

impl Server {
    fn new(self_tx: ServerTx) -> Self {
        Self {
            self_tx,
            connection_id_source: 0,
            connections: Outbox::new(),
            identities: HashMap::new(),
            locations: HashMap::new(),
            rooms: HashMap::new(),
        }
    }

    fn handle(&mut self, command: ServerCommand) {
        match command {
            ServerCommand::Connect { tx, identity } => {
                let connection_id = self.new_connection_id();
                log::info!(
                    "connection {} authenticated as {}",
                    connection_id,
                    identity.user_id
                );
                self.connections.insert(connection_id, tx);
                self.identities.insert(connection_id, identity);
                self.connections
                    .send(connection_id, ConnectionEvent::Connected { connection_id });
            }
            ServerCommand::Disconnect { from } => {
                self.leave_room(from);
                self.identities.remove(&from);
                self.connections.remove(&from);
            }
            ServerCommand::Event { from, event } => self.route(from, event),
            ServerCommand::RoomClosed { session_id } => {
                // a join may have raced the notice; membership decides
                if self.locations.values().any(|s| s == &session_id) {
                    return;
                }
                if self.rooms.remove(&session_id).is_some() {
                    log::info!("session {} reclaimed", session_id);
                }
            }
        }
    }

    fn route(&mut self, from: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::JoinRoom { session_id } => self.join_room(from, session_id),
            ClientEvent::LeaveRoom => self.leave_room(from),
            event => {
                let Some(session_id) = self.locations.get(&from) else {
                    log::warn!("event from connection {} outside any session", from);
                    return;
                };
                if let Some(room_tx) = self.rooms.get(session_id) {
                    forward(room_tx, RoomCommand::Event { from, event });
                }
            }
        }
    }

    fn join_room(&mut self, from: ConnectionId, session_id: SessionId) {
        let Some(identity) = self.identities.get(&from).cloned() else {
            log::warn!("join from unknown connection {}", from);
            return;
        };
        let Some(tx) = self.connections.tx(&from).cloned() else {
            log::warn!("join from connection {} without outbox", from);
            return;
        };
        // switching rooms leaves the previous one first
        self.leave_room(from);

        // session existence is owned externally; unseen ids get an
        // empty room rather than an error
        let room_tx = self
            .rooms
            .entry(session_id.clone())
            .or_insert_with(|| spawn_room(session_id.clone(), self.self_tx.clone()))
            .clone();
        self.locations.insert(from, session_id);
        forward(
            &room_tx,
            RoomCommand::Join {
                connection_id: from,
                participant: Participant {
                    id: identity.user_id,
                    username: identity.username,
                },
                tx,
            },
        );
    }

    /// The membership map is the authority: a second leave or a
    /// duplicate disconnect finds no entry and does nothing.
    fn leave_room(&mut self, from: ConnectionId) {
        if let Some(session_id) = self.locations.remove(&from) {
            if let Some(room_tx) = self.rooms.get(&session_id) {
                forward(room_tx, RoomCommand::Leave { connection_id: from });
            }
        }
    }

    fn new_connection_id(&mut self) -> ConnectionId {
        self.connection_id_source = self.connection_id_source.wrapping_add(1);
        self.connection_id_source
    }
}

fn forward(room_tx: &RoomTx, command: RoomCommand) {
    if let Err(err) = room_tx.try_send(command) {
        log::warn!("room queue unavailable: {}", err);
    }
}

pub fn spawn_server() -> ServerTx {
    let (srv_tx, mut srv_rx) = channel::<ServerCommand>(GATEWAY_QUEUE_CAPACITY);
    let self_tx = srv_tx.clone();

    tokio::spawn(async move {
        let mut server = Server::new(self_tx);
        while let Some(command) = srv_rx.recv().await {
            server.handle(command);
        }
    });

    srv_tx
}
