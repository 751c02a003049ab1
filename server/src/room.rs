use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc::{channel, Sender};

use system::{
    ChatMessage, ClientEvent, ConnectionId, Document, Participant, Presence, ServerEvent,
    SessionId, CURSOR_IDLE_WINDOW,
};

use crate::connection::ConnectionEvent;
use crate::outbox::{ConnectionTx, Outbox};
use crate::server::{ServerCommand, ServerTx};

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5);
const ROOM_QUEUE_CAPACITY: usize = 256;

#[derive(Debug)]
pub enum RoomCommand {
    Join {
        connection_id: ConnectionId,
        participant: Participant,
        tx: ConnectionTx,
    },
    Leave {
        connection_id: ConnectionId,
    },
    Event {
        from: ConnectionId,
        event: ClientEvent,
    },
}

pub type RoomTx = Sender<RoomCommand>;

type Outgoing = (ConnectionId, ServerEvent);

/// One room's authoritative state. All mutation flows through the
/// single room task, which is what makes "last write" well-defined;
/// the methods here are pure of I/O and return what to deliver.
pub struct Room {
    session_id: SessionId,
    document: Document,
    presence: Presence,
}

impl Room {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            document: Document::new(),
            presence: Presence::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.presence.is_empty()
    }

    /// The joiner gets the deduplicated roster and the full document
    /// snapshot; everyone else just learns who arrived.
    pub fn join(&mut self, connection_id: ConnectionId, participant: Participant) -> Vec<Outgoing> {
        self.presence.join(connection_id, participant.clone());
        log::info!(
            "connection {} ({}) joined session {}",
            connection_id,
            participant.id,
            self.session_id
        );
        let mut out = vec![
            (
                connection_id,
                ServerEvent::RoomUsers {
                    users: self.presence.roster(),
                },
            ),
            (
                connection_id,
                ServerEvent::WhiteboardState(self.document.snapshot()),
            ),
        ];
        out.extend(self.to_others(connection_id, ServerEvent::UserJoined(participant)));
        out
    }

    pub fn leave(&mut self, connection_id: ConnectionId) -> Vec<Outgoing> {
        match self.presence.leave(connection_id) {
            Some(participant) => {
                log::info!(
                    "connection {} ({}) left session {}",
                    connection_id,
                    participant.id,
                    self.session_id
                );
                self.to_others(connection_id, ServerEvent::UserLeft(participant))
            }
            None => {
                log::warn!(
                    "leave for connection {} not in session {}",
                    connection_id,
                    self.session_id
                );
                Vec::new()
            }
        }
    }

    /// Applies one mutation event. Failures are local to the event:
    /// the room never stops over a bad payload.
    pub fn apply(
        &mut self,
        from: ConnectionId,
        event: ClientEvent,
        now: Instant,
        now_ms: u64,
    ) -> Vec<Outgoing> {
        match event {
            ClientEvent::Draw { stroke } => match self.document.upsert_stroke(stroke.clone()) {
                Ok(()) => self.to_others(from, ServerEvent::Draw { stroke }),
                Err(err) => {
                    log::warn!("rejected stroke in session {}: {}", self.session_id, err);
                    Vec::new()
                }
            },
            ClientEvent::DrawShape { shape } => match self.document.upsert_shape(shape.clone()) {
                Ok(()) => self.to_others(from, ServerEvent::DrawShape { shape }),
                Err(err) => {
                    log::warn!("rejected shape in session {}: {}", self.session_id, err);
                    Vec::new()
                }
            },
            ClientEvent::Erase { id } => {
                // idempotent: relayed even when the id is already gone
                self.document.erase(&id);
                self.to_others(from, ServerEvent::Erase { id })
            }
            ClientEvent::CursorMove { point } => {
                let Some(participant) = self.presence.participant(from).cloned() else {
                    return Vec::new();
                };
                self.presence.touch_cursor(
                    participant.id.clone(),
                    participant.username.clone(),
                    point,
                    now,
                );
                self.to_others(
                    from,
                    ServerEvent::CursorMove {
                        user_id: participant.id,
                        username: participant.username,
                        point,
                    },
                )
            }
            ClientEvent::ChatMessage { text } => {
                let Some(participant) = self.presence.participant(from) else {
                    return Vec::new();
                };
                self.to_others(
                    from,
                    ServerEvent::ChatMessage(ChatMessage {
                        author: participant.username.clone(),
                        text,
                        time: now_ms,
                    }),
                )
            }
            ClientEvent::JoinRoom { .. } | ClientEvent::LeaveRoom => {
                // routing events are the gateway's business
                log::warn!("routing event reached session {}", self.session_id);
                Vec::new()
            }
        }
    }

    pub fn sweep(&mut self, now: Instant) {
        for user_id in self.presence.sweep_cursors(now, CURSOR_IDLE_WINDOW) {
            log::debug!(
                "purged idle cursor of {} in session {}",
                user_id,
                self.session_id
            );
        }
    }

    fn to_others(&self, from: ConnectionId, event: ServerEvent) -> Vec<Outgoing> {
        self.presence
            .connection_ids()
            .filter(|&c| c != from)
            .map(|c| (c, event.clone()))
            .collect()
    }
}

/// Spawns the room's processing task: the single sequence point for
/// this session. Ends once the gateway drops the returned sender.
pub fn spawn_room(session_id: SessionId, srv_tx: ServerTx) -> RoomTx {
    let (room_tx, mut rx) = channel::<RoomCommand>(ROOM_QUEUE_CAPACITY);

    tokio::spawn(async move {
        let mut room = Room::new(session_id.clone());
        let mut outbox = Outbox::new();
        let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
        log::info!("session {} started", session_id);

        loop {
            tokio::select! {
                cmd = rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    let outgoing = match cmd {
                        RoomCommand::Join { connection_id, participant, tx } => {
                            outbox.insert(connection_id, tx);
                            room.join(connection_id, participant)
                        }
                        RoomCommand::Leave { connection_id } => {
                            let out = room.leave(connection_id);
                            outbox.remove(&connection_id);
                            if room.is_empty() {
                                let _ = srv_tx.try_send(ServerCommand::RoomClosed {
                                    session_id: session_id.clone(),
                                });
                            }
                            out
                        }
                        RoomCommand::Event { from, event } => {
                            room.apply(from, event, Instant::now(), epoch_millis())
                        }
                    };
                    for (to, event) in outgoing {
                        outbox.send(to, ConnectionEvent::Event(event));
                    }
                }
                _ = sweep.tick() => room.sweep(Instant::now()),
            }
        }
        log::info!("session {} terminated", session_id);
    });

    room_tx
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
