//! Registry of live sessions, the waiting queue and live connections.
//!
//! Owned by the gateway's dispatcher task. All three collections are torn
//! down together by [`Registry::clear`].

use derive_getters::Getters;
use derive_more::Display;
use std::collections::{HashMap, VecDeque};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::protocol::ServerMessage;
use crate::session::{GameSession, Identity, SessionId, SessionStatus};

/// Outbound channel of one connection.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// Identifier of a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("conn-{}", _0)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw connection number.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// A live, authenticated connection.
#[derive(Debug, Getters)]
pub struct Connection {
    /// Who is on the other end.
    identity: Identity,
    /// Outbound frames.
    #[getter(skip)]
    outbox: Outbox,
    /// Session currently occupied, if any.
    session: Option<SessionId>,
}

/// In-memory state shared by every handler of the gateway.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: HashMap<SessionId, GameSession>,
    waiting: VecDeque<SessionId>,
    connections: HashMap<ConnectionId, Connection>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a live session.
    pub fn insert_session(&mut self, session: GameSession) {
        debug!(session_id = %session.id(), "Session registered");
        self.sessions.insert(session.id().clone(), session);
    }

    /// Gets a live session by ID.
    pub fn session(&self, id: &str) -> Option<&GameSession> {
        self.sessions.get(id)
    }

    /// Gets a live session for mutation.
    pub fn session_mut(&mut self, id: &str) -> Option<&mut GameSession> {
        self.sessions.get_mut(id)
    }

    /// Appends a pending session to the back of the waiting queue.
    pub fn enqueue(&mut self, id: SessionId) {
        debug!(session_id = %id, position = self.waiting.len(), "Session queued");
        self.waiting.push_back(id);
    }

    /// Removes and returns the oldest pending session not created by `identity`.
    ///
    /// Sessions created by `identity` keep their place in the queue.
    #[instrument(skip(self))]
    pub fn take_waiting_for(&mut self, identity: &str) -> Option<SessionId> {
        let position = self.waiting.iter().position(|id| {
            self.sessions.get(id).is_some_and(|session| {
                *session.status() == SessionStatus::Pending && session.participant1() != identity
            })
        })?;
        self.waiting.remove(position)
    }

    /// Pending session ids, oldest first.
    pub fn waiting(&self) -> impl Iterator<Item = &SessionId> {
        self.waiting.iter()
    }

    /// Removes a session from the registry and the queue, and detaches
    /// every connection occupying it.
    #[instrument(skip(self))]
    pub fn retire(&mut self, id: &str) -> Option<GameSession> {
        self.waiting.retain(|queued| queued != id);
        for connection in self.connections.values_mut() {
            if connection.session.as_deref() == Some(id) {
                connection.session = None;
            }
        }
        let session = self.sessions.remove(id);
        if session.is_some() {
            info!(session_id = id, "Session retired");
        }
        session
    }

    /// Registers a connection. Returns `false` if the id is already taken.
    pub fn add_connection(&mut self, id: ConnectionId, identity: Identity, outbox: Outbox) -> bool {
        if self.connections.contains_key(&id) {
            return false;
        }
        self.connections.insert(
            id,
            Connection {
                identity,
                outbox,
                session: None,
            },
        );
        true
    }

    /// Removes a connection, dropping its outbound channel.
    pub fn remove_connection(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    /// Gets a connection by ID.
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Maps a connection to a session, subscribing it to broadcasts.
    pub fn attach(&mut self, connection: ConnectionId, session: SessionId) {
        if let Some(entry) = self.connections.get_mut(&connection) {
            debug!(connection_id = %connection, session_id = %session, "Connection attached");
            entry.session = Some(session);
        }
    }

    /// Clears a connection's session mapping, returning the old session id.
    pub fn detach(&mut self, connection: ConnectionId) -> Option<SessionId> {
        self.connections
            .get_mut(&connection)
            .and_then(|entry| entry.session.take())
    }

    /// Connections currently subscribed to a session, in id order.
    pub fn subscribers(&self, session: &str) -> Vec<ConnectionId> {
        let mut subscribers: Vec<_> = self
            .connections
            .iter()
            .filter(|(_, entry)| entry.session.as_deref() == Some(session))
            .map(|(id, _)| *id)
            .collect();
        subscribers.sort();
        subscribers
    }

    /// Sends a frame to one connection.
    pub fn send(&self, connection: ConnectionId, message: ServerMessage) {
        match self.connections.get(&connection) {
            Some(entry) => {
                if entry.outbox.send(message).is_err() {
                    debug!(connection_id = %connection, "Outbox closed, dropping frame");
                }
            }
            None => warn!(connection_id = %connection, "Send to unknown connection"),
        }
    }

    /// Sends a frame to every subscriber of a session.
    pub fn broadcast(&self, session: &str, message: &ServerMessage) {
        for connection in self.subscribers(session) {
            self.send(connection, message.clone());
        }
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Drops every session, queue entry and connection.
    #[instrument(skip(self))]
    pub fn clear(&mut self) {
        info!(
            sessions = self.sessions.len(),
            waiting = self.waiting.len(),
            connections = self.connections.len(),
            "Clearing registry"
        );
        self.sessions.clear();
        self.waiting.clear();
        self.connections.clear();
    }
}
