use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::types::*;

/// Cursors idle longer than this are purged by the periodic sweep,
/// which covers silently dead connections.
pub const CURSOR_IDLE_WINDOW: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Cursor {
    pub point: Point,
    pub username: String,
    pub last_seen: Instant,
}

/// Live membership of one room. Participants are keyed by connection,
/// cursors by identity; the same identity may be connected more than
/// once, but the roster lists it once.
#[derive(Debug, Default)]
pub struct Presence {
    participants: HashMap<ConnectionId, Participant>,
    cursors: HashMap<UserId, Cursor>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, connection_id: ConnectionId, participant: Participant) {
        self.participants.insert(connection_id, participant);
    }

    /// Removes the connection; returns the participant exactly once.
    /// The identity's cursor survives while another of its connections
    /// is still in the room.
    pub fn leave(&mut self, connection_id: ConnectionId) -> Option<Participant> {
        let participant = self.participants.remove(&connection_id)?;
        if !self.contains_identity(&participant.id) {
            self.cursors.remove(&participant.id);
        }
        Some(participant)
    }

    pub fn contains_identity(&self, user_id: &UserId) -> bool {
        self.participants.values().any(|p| &p.id == user_id)
    }

    pub fn participant(&self, connection_id: ConnectionId) -> Option<&Participant> {
        self.participants.get(&connection_id)
    }

    /// Deduplicated by identity, sorted by user id so repeated calls
    /// are stable.
    pub fn roster(&self) -> Vec<Participant> {
        let mut by_id: HashMap<&UserId, &Participant> = HashMap::new();
        for p in self.participants.values() {
            by_id.insert(&p.id, p);
        }
        let mut users: Vec<Participant> = by_id.values().map(|&p| p.clone()).collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        users
    }

    pub fn connection_ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.participants.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn touch_cursor(&mut self, user_id: UserId, username: String, point: Point, now: Instant) {
        self.cursors.insert(
            user_id,
            Cursor {
                point,
                username,
                last_seen: now,
            },
        );
    }

    pub fn cursor(&self, user_id: &UserId) -> Option<&Cursor> {
        self.cursors.get(user_id)
    }

    /// Drops cursors idle longer than `window`, returning the purged
    /// identities. Removal only; a later cursor-move re-adds the entry.
    pub fn sweep_cursors(&mut self, now: Instant, window: Duration) -> Vec<UserId> {
        let stale: Vec<UserId> = self
            .cursors
            .iter()
            .filter(|(_, c)| now.duration_since(c.last_seen) > window)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            self.cursors.remove(id);
        }
        stale
    }
}
