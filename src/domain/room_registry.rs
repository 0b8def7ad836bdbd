//! Room membership and the live connection table.
//!
//! [`RoomRegistry`] is the only shared mutable state of the relay. It maps
//! room names to member connections and connections to their outbound
//! queue, identity and rooms. Membership changes only through
//! register/bind/join/leave/remove; delivery takes the read lock and never
//! mutates anything.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::routing::Delivery;
use super::{ConnectionId, Identity, RoomName, ServerEvent};
use crate::error::RelayError;

/// Live room with its current member count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    /// Room name.
    pub room: RoomName,
    /// Number of member connections.
    pub members: usize,
}

/// Snapshot of one registered connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Connection id.
    pub connection_id: ConnectionId,
    /// Identity bound by the join event, if any.
    pub identity: Option<Identity>,
    /// Rooms the connection is currently in.
    pub rooms: BTreeSet<RoomName>,
    /// When the socket was accepted.
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Member {
    outbound: mpsc::Sender<ServerEvent>,
    identity: Option<Identity>,
    rooms: BTreeSet<RoomName>,
    connected_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct RegistryState {
    rooms: HashMap<RoomName, HashSet<ConnectionId>>,
    members: HashMap<ConnectionId, Member>,
}

impl RegistryState {
    fn join(&mut self, id: ConnectionId, room: &RoomName) -> Result<bool, RelayError> {
        let member = self
            .members
            .get_mut(&id)
            .ok_or(RelayError::ConnectionNotFound(id))?;
        if !member.rooms.insert(room.clone()) {
            return Ok(false);
        }
        self.rooms.entry(room.clone()).or_default().insert(id);
        Ok(true)
    }

    fn leave(&mut self, id: ConnectionId, room: &RoomName) -> bool {
        let Some(member) = self.members.get_mut(&id) else {
            return false;
        };
        if !member.rooms.remove(room) {
            return false;
        }
        self.detach(id, room);
        true
    }

    /// Removes `id` from the room's member set, dropping the room when empty.
    fn detach(&mut self, id: ConnectionId, room: &RoomName) {
        if let Some(set) = self.rooms.get_mut(room) {
            set.remove(&id);
            if set.is_empty() {
                self.rooms.remove(room);
            }
        }
    }

    fn remove(&mut self, id: ConnectionId) -> Option<Member> {
        let member = self.members.remove(&id)?;
        for room in &member.rooms {
            self.detach(id, room);
        }
        Some(member)
    }
}

/// Central registry of rooms and live connections.
///
/// # Concurrency
///
/// A single [`tokio::sync::RwLock`] guards both maps, so every membership
/// change is atomic with respect to delivery. Deliveries from different
/// connections may run concurrently under the read lock.
#[derive(Debug)]
pub struct RoomRegistry {
    state: RwLock<RegistryState>,
    evict_stale: bool,
}

impl RoomRegistry {
    /// Creates an empty registry that evicts stale connections on rebind.
    #[must_use]
    pub fn new() -> Self {
        Self::with_eviction(true)
    }

    /// Creates an empty registry.
    ///
    /// With `evict_stale`, binding an identity that another live connection
    /// already holds closes that older connection. Without it both stay
    /// registered and both receive the identity's events.
    #[must_use]
    pub fn with_eviction(evict_stale: bool) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            evict_stale,
        }
    }

    /// Records a freshly accepted connection and its outbound queue.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::DuplicateConnection`] if the id is already
    /// registered.
    pub async fn register(
        &self,
        id: ConnectionId,
        outbound: mpsc::Sender<ServerEvent>,
    ) -> Result<(), RelayError> {
        let mut state = self.state.write().await;
        if state.members.contains_key(&id) {
            return Err(RelayError::DuplicateConnection(id));
        }
        state.members.insert(
            id,
            Member {
                outbound,
                identity: None,
                rooms: BTreeSet::new(),
                connected_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Adds a connection to a room, creating the room if needed.
    ///
    /// Returns `false` if the connection was already a member.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ConnectionNotFound`] for an unknown connection.
    pub async fn join(&self, id: ConnectionId, room: &RoomName) -> Result<bool, RelayError> {
        self.state.write().await.join(id, room)
    }

    /// Removes a connection from one room. Returns `false` if it was not a
    /// member.
    pub async fn leave(&self, id: ConnectionId, room: &RoomName) -> bool {
        self.state.write().await.leave(id, room)
    }

    /// Binds a connection to an identity and places it in the identity's
    /// role room and personal room.
    ///
    /// Rebinding the same identity is a no-op. Binding a different identity
    /// first leaves the old identity's rooms. Returns the connections that
    /// were evicted because they held the same identity.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ConnectionNotFound`] for an unknown connection.
    pub async fn bind(
        &self,
        id: ConnectionId,
        identity: Identity,
    ) -> Result<Vec<ConnectionId>, RelayError> {
        let mut state = self.state.write().await;
        let previous = match state.members.get(&id) {
            Some(member) => member.identity.clone(),
            None => return Err(RelayError::ConnectionNotFound(id)),
        };

        if let Some(old) = previous.as_ref().filter(|old| **old != identity) {
            for room in old.rooms() {
                state.leave(id, &room);
            }
        }

        let mut evicted = Vec::new();
        if self.evict_stale {
            let holders: Vec<ConnectionId> = state
                .rooms
                .get(&identity.identity_room())
                .map(|set| set.iter().copied().filter(|other| *other != id).collect())
                .unwrap_or_default();
            for other in holders {
                let same = state
                    .members
                    .get(&other)
                    .is_some_and(|m| m.identity.as_ref() == Some(&identity));
                if same && state.remove(other).is_some() {
                    evicted.push(other);
                }
            }
        }

        for room in identity.rooms() {
            state.join(id, &room)?;
        }
        if let Some(member) = state.members.get_mut(&id) {
            member.identity = Some(identity);
        }
        Ok(evicted)
    }

    /// Drops a connection: leaves every room and closes its outbound queue.
    pub async fn remove(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        let member = self.state.write().await.remove(id)?;
        Some(ConnectionInfo {
            connection_id: id,
            identity: member.identity,
            rooms: member.rooms,
            connected_at: member.connected_at,
        })
    }

    /// Delivers `event` to every current member of `room`.
    ///
    /// Returns the number of members it was queued for. An empty or unknown
    /// room yields zero.
    pub async fn deliver(&self, room: &RoomName, event: &ServerEvent) -> usize {
        let state = self.state.read().await;
        deliver_locked(&state, room, event)
    }

    /// Delivers a batch of routed events under one read lock, so members see
    /// a consistent membership snapshot for a single source event.
    pub async fn deliver_all(&self, deliveries: &[Delivery]) -> usize {
        let state = self.state.read().await;
        deliveries
            .iter()
            .map(|d| deliver_locked(&state, &d.room, &d.event))
            .sum()
    }

    /// Returns the members of `room`, sorted.
    pub async fn members(&self, room: &RoomName) -> Vec<ConnectionId> {
        let state = self.state.read().await;
        let mut ids: Vec<ConnectionId> = state
            .rooms
            .get(room)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Returns `true` if the connection is in the room.
    pub async fn is_member(&self, id: ConnectionId, room: &RoomName) -> bool {
        self.state
            .read()
            .await
            .rooms
            .get(room)
            .is_some_and(|set| set.contains(&id))
    }

    /// Returns every occupied room, sorted by name.
    pub async fn rooms(&self) -> Vec<RoomSummary> {
        let state = self.state.read().await;
        let mut rooms: Vec<RoomSummary> = state
            .rooms
            .iter()
            .map(|(room, set)| RoomSummary {
                room: room.clone(),
                members: set.len(),
            })
            .collect();
        rooms.sort_by(|a, b| a.room.cmp(&b.room));
        rooms
    }

    /// Returns a snapshot of one connection.
    pub async fn connection(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        let state = self.state.read().await;
        state.members.get(&id).map(|m| ConnectionInfo {
            connection_id: id,
            identity: m.identity.clone(),
            rooms: m.rooms.clone(),
            connected_at: m.connected_at,
        })
    }

    /// Returns the number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.members.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn deliver_locked(state: &RegistryState, room: &RoomName, event: &ServerEvent) -> usize {
    let Some(set) = state.rooms.get(room) else {
        tracing::trace!(%room, event = event.name(), "no members, dropping");
        return 0;
    };
    let mut delivered = 0usize;
    for id in set {
        let Some(member) = state.members.get(id) else {
            continue;
        };
        match member.outbound.try_send(event.clone()) {
            Ok(()) => delivered = delivered.saturating_add(1),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(connection_id = %id, %room, event = event.name(), "outbound queue full, dropping");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(connection_id = %id, %room, "outbound queue closed");
            }
        }
    }
    delivered
}
