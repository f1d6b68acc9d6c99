//! Connection gateway: the single dispatcher for every game event.
//!
//! Transports and timers post [`GatewayEvent`]s into one channel; the
//! dispatcher task applies them one at a time through [`Gateway::handle`],
//! which never awaits. Run-to-completion is what keeps the registry
//! consistent without locks.

use std::sync::Arc;
use std::time::Duration;
use strictly_tictactoe::Coordinates;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::matchmaker::{Matched, Matchmaker};
use crate::opponent::RandomOpponent;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::{ConnectionId, Outbox, Registry};
use crate::session::{GameSession, Identity, MoveOutcome, Participant, SessionId, SessionStatus};
use crate::store::PersistenceStore;

/// Everything the dispatcher reacts to.
#[derive(Debug)]
pub enum GatewayEvent {
    /// An authenticated connection opened.
    Connected {
        /// Connection id allocated by the transport.
        connection: ConnectionId,
        /// Verified identity.
        identity: Identity,
        /// Outbound frames for this connection.
        outbox: Outbox,
    },
    /// A parsed frame arrived.
    Message {
        /// Sender.
        connection: ConnectionId,
        /// The frame.
        message: ClientMessage,
    },
    /// The connection closed.
    Disconnected {
        /// The closed connection.
        connection: ConnectionId,
    },
    /// A deferred scripted move is due. May be stale by the time it fires.
    ScriptedMoveDue {
        /// Session the move was scheduled for.
        session: SessionId,
    },
    /// Stop the dispatcher and clear all state.
    Shutdown,
}

/// Delivers an event back to the dispatcher after a delay.
pub trait Scheduler: Send + Sync {
    /// Schedules `event` for delivery after `delay`.
    fn schedule(&self, delay: Duration, event: GatewayEvent);
}

/// Scheduler that sleeps on the tokio timer and posts into the event channel.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    events: mpsc::UnboundedSender<GatewayEvent>,
}

impl TokioScheduler {
    /// Creates a scheduler posting into the given channel.
    pub fn new(events: mpsc::UnboundedSender<GatewayEvent>) -> Self {
        Self { events }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, event: GatewayEvent) {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if events.send(event).is_err() {
                debug!("Dispatcher gone, dropping deferred event");
            }
        });
    }
}

/// The dispatcher's state and handlers.
pub struct Gateway {
    registry: Registry,
    matchmaker: Matchmaker,
    store: Arc<dyn PersistenceStore>,
    scheduler: Box<dyn Scheduler>,
    opponent: RandomOpponent,
    opponent_delay: Duration,
}

impl Gateway {
    /// Creates a gateway.
    pub fn new(
        store: Arc<dyn PersistenceStore>,
        scheduler: Box<dyn Scheduler>,
        opponent: RandomOpponent,
        opponent_delay: Duration,
    ) -> Self {
        info!(delay_ms = opponent_delay.as_millis() as u64, "Creating gateway");
        Self {
            registry: Registry::new(),
            matchmaker: Matchmaker::new(Arc::clone(&store)),
            store,
            scheduler,
            opponent,
            opponent_delay,
        }
    }

    /// Read access to the registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Consumes events until the channel closes or [`GatewayEvent::Shutdown`].
    #[instrument(skip_all)]
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<GatewayEvent>) {
        info!("Dispatcher started");
        while let Some(event) = events.recv().await {
            if matches!(event, GatewayEvent::Shutdown) {
                break;
            }
            self.handle(event);
        }
        self.shutdown();
        info!("Dispatcher stopped");
    }

    /// Tears down every session, queue entry and connection.
    pub fn shutdown(&mut self) {
        self.registry.clear();
    }

    /// Applies one event to completion.
    pub fn handle(&mut self, event: GatewayEvent) {
        match event {
            GatewayEvent::Connected {
                connection,
                identity,
                outbox,
            } => self.on_connected(connection, identity, outbox),
            GatewayEvent::Message {
                connection,
                message,
            } => match message {
                ClientMessage::NewGame { two_player } => self.on_new_game(connection, two_player),
                ClientMessage::PlayerMove { x, y } => self.on_player_move(connection, x, y),
            },
            GatewayEvent::Disconnected { connection } => self.on_disconnected(connection),
            GatewayEvent::ScriptedMoveDue { session } => self.on_scripted_move_due(&session),
            GatewayEvent::Shutdown => self.shutdown(),
        }
    }

    #[instrument(skip(self, outbox))]
    fn on_connected(&mut self, connection: ConnectionId, identity: Identity, outbox: Outbox) {
        if !self.registry.add_connection(connection, identity.clone(), outbox) {
            warn!("Duplicate connection id ignored");
            return;
        }
        info!(connections = self.registry.connection_count(), "Connection registered");

        // Recording is idempotent in every store.
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.record_participant(identity.clone()).await {
                warn!(identity = %identity, error = %e, "Failed to record participant");
            }
        });
    }

    #[instrument(skip(self))]
    fn on_new_game(&mut self, connection: ConnectionId, two_player: bool) {
        let Some(identity) = self.registry.connection(connection).map(|c| c.identity().clone())
        else {
            warn!("New game from unknown connection");
            return;
        };

        self.leave_session(connection);

        match self
            .matchmaker
            .request_game(&mut self.registry, &identity, two_player)
        {
            Ok(Matched::Waiting(session)) => {
                self.registry.attach(connection, session);
                self.registry.send(connection, ServerMessage::WaitingPartner);
            }
            Ok(Matched::Started(session)) => {
                self.registry.attach(connection, session.clone());
                self.broadcast_state(&session);
            }
            Err(e) => {
                error!(error = %e, "Matchmaking failed");
                self.registry.send(
                    connection,
                    ServerMessage::Error {
                        message: e.to_string(),
                    },
                );
            }
        }
    }

    #[instrument(skip(self))]
    fn on_player_move(&mut self, connection: ConnectionId, x: i64, y: i64) {
        let Some((identity, session_id)) = self.registry.connection(connection).map(|c| {
            (c.identity().clone(), c.session().clone())
        }) else {
            warn!("Move from unknown connection");
            return;
        };

        let Some(session_id) = session_id else {
            self.reject(connection, "No active game".to_string());
            return;
        };

        let (Ok(col), Ok(row)) = (usize::try_from(x), usize::try_from(y)) else {
            self.reject(connection, format!("Coordinates ({}, {}) are out of bounds", x, y));
            return;
        };

        let Some(session) = self.registry.session_mut(&session_id) else {
            warn!(session_id = %session_id, "Connection mapped to missing session");
            self.registry.detach(connection);
            self.reject(connection, "No active game".to_string());
            return;
        };

        match session.apply_move(&Participant::Human(identity), Coordinates::new(col, row)) {
            Ok(outcome) => self.after_move(&session_id, outcome),
            Err(e) => self.reject(connection, e.to_string()),
        }
    }

    #[instrument(skip(self))]
    fn on_disconnected(&mut self, connection: ConnectionId) {
        self.leave_session(connection);
        if self.registry.remove_connection(connection).is_some() {
            info!(connections = self.registry.connection_count(), "Connection removed");
        }
    }

    /// Fires a deferred scripted move, unless the session went stale meanwhile.
    #[instrument(skip(self))]
    fn on_scripted_move_due(&mut self, session_id: &str) {
        let Some(session) = self.registry.session_mut(session_id) else {
            debug!("Stale scripted move: session retired");
            return;
        };
        if *session.status() != SessionStatus::InProgress || !session.computer_to_move() {
            debug!(status = %session.status(), "Stale scripted move: not the computer's turn");
            return;
        }

        let Some(at) = self.opponent.choose_move(session.board()) else {
            warn!("Scripted opponent found no empty square");
            return;
        };

        match session.apply_move(&Participant::Computer, at) {
            Ok(outcome) => self.after_move(session_id, outcome),
            Err(e) => error!(error = %e, "Scripted move rejected"),
        }
    }

    /// Broadcasts an accepted move and advances the session lifecycle.
    fn after_move(&mut self, session_id: &str, outcome: MoveOutcome) {
        let MoveOutcome {
            snapshot,
            evaluation,
        } = outcome;
        self.registry.broadcast(
            session_id,
            &ServerMessage::CurrentState {
                state: snapshot.clone(),
            },
        );

        if evaluation.is_over() {
            self.registry.retire(session_id);
            self.persist(snapshot);
        } else if snapshot.computer_to_move() {
            debug!(session_id, "Scheduling scripted move");
            self.scheduler.schedule(
                self.opponent_delay,
                GatewayEvent::ScriptedMoveDue {
                    session: session_id.to_string(),
                },
            );
        }
    }

    /// Releases the connection's current session, if any.
    ///
    /// A pending session is discarded silently. An in-progress session is
    /// abandoned; a remaining human is told the partner left.
    fn leave_session(&mut self, connection: ConnectionId) {
        let Some(session_id) = self.registry.detach(connection) else {
            return;
        };
        let Some(session) = self.registry.session_mut(&session_id) else {
            return;
        };

        match *session.status() {
            SessionStatus::Pending => {
                info!(session_id = %session_id, "Pending session discarded");
                self.registry.retire(&session_id);
            }
            SessionStatus::InProgress => {
                let against_human = !session.is_single_player();
                session.abandon();
                if against_human {
                    info!(session_id = %session_id, "Participant left mid-game");
                    self.registry
                        .broadcast(&session_id, &ServerMessage::PlayerLeft);
                }
                self.registry.retire(&session_id);
            }
            SessionStatus::Complete => {}
        }
    }

    fn broadcast_state(&self, session_id: &str) {
        if let Some(session) = self.registry.session(session_id) {
            self.registry.broadcast(
                session_id,
                &ServerMessage::CurrentState {
                    state: session.clone(),
                },
            );
        }
    }

    fn reject(&self, connection: ConnectionId, reason: String) {
        debug!(connection_id = %connection, reason = %reason, "Move rejected");
        self.registry
            .send(connection, ServerMessage::InvalidMove { reason });
    }

    /// Hands a completed session to the store without waiting for it.
    fn persist(&self, game: GameSession) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let id = game.id().clone();
            match store.save_completed_game(game).await {
                Ok(()) => debug!(session_id = %id, "Completed game persisted"),
                Err(e) => error!(session_id = %id, error = %e, "Failed to persist completed game"),
            }
        });
    }
}
