//! Game session state and turn machine.
//!
//! A session owns one board and resolves whose turn it is by identity,
//! never by connection order.

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use strictly_tictactoe::{Board, BoardError, Coordinates, Evaluation, Mark, evaluate};
use tracing::{debug, info, instrument, warn};

/// Unique identifier for a game session.
pub type SessionId = String;

/// Authenticated identity of a human participant.
pub type Identity = String;

/// Label used for the scripted opponent in snapshots and storage.
pub const COMPUTER_LABEL: &str = "computer";

/// Label used for a drawn game in snapshots and storage.
pub const DRAW_LABEL: &str = "draw";

/// Occupant of one of the two session slots.
///
/// Serialized as its label: the human identity, or `"computer"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(into = "String", from = "String")]
pub enum Participant {
    /// A human connected through the gateway.
    #[display("{_0}")]
    Human(Identity),
    /// The scripted opponent.
    #[display("computer")]
    Computer,
}

impl Participant {
    /// Returns the identity of a human participant.
    pub fn identity(&self) -> Option<&str> {
        match self {
            Participant::Human(identity) => Some(identity),
            Participant::Computer => None,
        }
    }

    /// Human identity, or `"computer"`.
    pub fn label(&self) -> &str {
        self.identity().unwrap_or(COMPUTER_LABEL)
    }
}

impl From<Participant> for String {
    fn from(participant: Participant) -> Self {
        match participant {
            Participant::Human(identity) => identity,
            Participant::Computer => COMPUTER_LABEL.to_string(),
        }
    }
}

impl From<String> for Participant {
    fn from(label: String) -> Self {
        if label == COMPUTER_LABEL {
            Participant::Computer
        } else {
            Participant::Human(label)
        }
    }
}

/// One of the two session slots. Also used for whose turn it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
pub enum Seat {
    /// First slot, holds X and moves first.
    #[display("participant1")]
    Participant1,
    /// Second slot, holds O.
    #[display("participant2")]
    Participant2,
}

impl Seat {
    /// The other seat.
    pub fn other(self) -> Self {
        match self {
            Seat::Participant1 => Seat::Participant2,
            Seat::Participant2 => Seat::Participant1,
        }
    }

    /// The mark this seat places.
    pub fn mark(self) -> Mark {
        match self {
            Seat::Participant1 => Mark::X,
            Seat::Participant2 => Mark::O,
        }
    }

    /// The seat holding the given mark.
    pub fn holding(mark: Mark) -> Self {
        match mark {
            Mark::X => Seat::Participant1,
            Mark::O => Seat::Participant2,
        }
    }
}

/// Lifecycle status. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Waiting for a second human.
    #[display("pending")]
    Pending,
    /// Both seats filled, moves accepted.
    #[display("in_progress")]
    InProgress,
    /// Finished by a terminal board or by a departure.
    #[display("complete")]
    Complete,
}

/// Final result of a completed session.
///
/// Serialized as the winner's label, or `"draw"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Winner {
    /// The participant who completed a line.
    Participant(Participant),
    /// Nobody completed a line.
    Draw,
}

impl From<Winner> for String {
    fn from(winner: Winner) -> Self {
        match winner {
            Winner::Participant(participant) => participant.into(),
            Winner::Draw => DRAW_LABEL.to_string(),
        }
    }
}

impl From<String> for Winner {
    fn from(label: String) -> Self {
        if label == DRAW_LABEL {
            Winner::Draw
        } else {
            Winner::Participant(Participant::from(label))
        }
    }
}

/// Reason a move was rejected. The session is never mutated on rejection.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum MoveError {
    /// The session is still waiting for a second participant.
    #[display("Waiting for a partner to join")]
    AwaitingPartner,
    /// The session has already finished.
    #[display("Game is already over")]
    NotInProgress,
    /// The actor does not occupy either seat.
    #[display("Not a participant in this game")]
    NotSeated,
    /// The actor moved out of turn.
    #[display("Not your turn")]
    NotYourTurn,
    /// Coordinates fall outside the board.
    #[display("Coordinates {} are out of bounds", _0)]
    OutOfBounds(#[error(not(source))] Coordinates),
    /// The target square already holds a mark.
    #[display("Square {} is already occupied", _0)]
    CellOccupied(#[error(not(source))] Coordinates),
}

/// Reason a participant could not be seated.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum SessionError {
    /// Only pending sessions accept a second participant.
    #[display("Session is not waiting for a partner")]
    NotPending,
    /// The second seat is already taken.
    #[display("Session already has two participants")]
    AlreadyFull,
    /// The requester already holds the first seat.
    #[display("Cannot pair '{}' with themselves", _0)]
    SelfPairing(#[error(not(source))] Identity),
}

/// Result of an accepted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Session state after the move, for broadcast.
    pub snapshot: GameSession,
    /// Board evaluation after the move.
    pub evaluation: Evaluation,
}

/// A single game between two participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    /// Session ID (allocated by the persistence store).
    id: SessionId,
    /// The board.
    board: Board,
    /// Seat whose turn it is.
    turn: Seat,
    /// Lifecycle status.
    status: SessionStatus,
    /// Always a human; the creator of the session.
    participant1: Identity,
    /// `None` while waiting for a partner.
    participant2: Option<Participant>,
    /// Set once the session completes with a result.
    winner: Option<Winner>,
    /// Accepted moves so far.
    moves: u32,
}

impl GameSession {
    fn new(id: SessionId, participant1: Identity, participant2: Option<Participant>) -> Self {
        let status = if participant2.is_some() {
            SessionStatus::InProgress
        } else {
            SessionStatus::Pending
        };
        Self {
            id,
            board: Board::new(),
            turn: Seat::Participant1,
            status,
            participant1,
            participant2,
            winner: None,
            moves: 0,
        }
    }

    /// Creates an in-progress session against the scripted opponent.
    #[instrument]
    pub fn single_player(id: SessionId, identity: Identity) -> Self {
        info!(session_id = %id, identity = %identity, "Creating single-player session");
        Self::new(id, identity, Some(Participant::Computer))
    }

    /// Creates a pending session waiting for a second human.
    #[instrument]
    pub fn awaiting_partner(id: SessionId, identity: Identity) -> Self {
        info!(session_id = %id, identity = %identity, "Creating pending two-player session");
        Self::new(id, identity, None)
    }

    /// Returns the occupant of a seat, if any.
    pub fn participant(&self, seat: Seat) -> Option<Participant> {
        match seat {
            Seat::Participant1 => Some(Participant::Human(self.participant1.clone())),
            Seat::Participant2 => self.participant2.clone(),
        }
    }

    /// Resolves which seat an actor holds by identity comparison.
    pub fn seat_of(&self, actor: &Participant) -> Option<Seat> {
        match actor {
            Participant::Human(identity) if *identity == self.participant1 => {
                Some(Seat::Participant1)
            }
            _ if self.participant2.as_ref() == Some(actor) => Some(Seat::Participant2),
            _ => None,
        }
    }

    /// Returns true when the second seat holds the scripted opponent.
    pub fn is_single_player(&self) -> bool {
        matches!(self.participant2, Some(Participant::Computer))
    }

    /// Returns true when the game is live and the scripted opponent must move.
    pub fn computer_to_move(&self) -> bool {
        self.status == SessionStatus::InProgress
            && self.participant(self.turn) == Some(Participant::Computer)
    }

    /// Human identities seated in this session.
    pub fn human_identities(&self) -> Vec<&str> {
        let mut identities = vec![self.participant1.as_str()];
        if let Some(Participant::Human(identity)) = &self.participant2 {
            identities.push(identity);
        }
        identities
    }

    /// Human identity owed a win, if any. Draws and computer wins credit nobody.
    pub fn credited_winner(&self) -> Option<&str> {
        match &self.winner {
            Some(Winner::Participant(participant)) => participant.identity(),
            _ => None,
        }
    }

    /// Returns true when the session completed because someone left.
    pub fn is_abandoned(&self) -> bool {
        self.status == SessionStatus::Complete && self.winner.is_none()
    }

    /// Applies a move for the given actor.
    ///
    /// # Errors
    ///
    /// Returns [`MoveError`] when the session is not in progress, the actor
    /// is not seated or out of turn, or the square is unavailable. Nothing is
    /// mutated on error.
    #[instrument(skip(self, actor), fields(session_id = %self.id, actor = %actor))]
    pub fn apply_move(
        &mut self,
        actor: &Participant,
        at: Coordinates,
    ) -> Result<MoveOutcome, MoveError> {
        match self.status {
            SessionStatus::Pending => {
                warn!("Move attempted while waiting for partner");
                return Err(MoveError::AwaitingPartner);
            }
            SessionStatus::Complete => {
                warn!("Move attempted on completed session");
                return Err(MoveError::NotInProgress);
            }
            SessionStatus::InProgress => {}
        }

        let seat = self.seat_of(actor).ok_or_else(|| {
            warn!("Unknown participant attempted move");
            MoveError::NotSeated
        })?;

        if seat != self.turn {
            warn!(seat = %seat, turn = %self.turn, "Participant tried to move out of turn");
            return Err(MoveError::NotYourTurn);
        }

        self.board.place(at, seat.mark()).map_err(|e| {
            warn!(error = %e, "Invalid move");
            match e {
                BoardError::OutOfBounds(at) => MoveError::OutOfBounds(at),
                _ => MoveError::CellOccupied(at),
            }
        })?;
        self.moves += 1;

        let evaluation = evaluate(&self.board);
        match evaluation.outcome() {
            Some(outcome) => {
                self.status = SessionStatus::Complete;
                self.winner = match outcome.winner() {
                    None => Some(Winner::Draw),
                    Some(mark) => self.participant(Seat::holding(mark)).map(Winner::Participant),
                };
                info!(outcome = ?outcome, moves = self.moves, "Session complete");
            }
            None => {
                self.turn = self.turn.other();
                debug!(turn = %self.turn, "Turn passed");
            }
        }

        Ok(MoveOutcome {
            snapshot: self.clone(),
            evaluation,
        })
    }

    /// Seats a second human in a pending session and starts the game.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the session is not pending, already full,
    /// or the identity already holds the first seat.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn add_second_participant(&mut self, identity: Identity) -> Result<(), SessionError> {
        if self.status != SessionStatus::Pending {
            return Err(SessionError::NotPending);
        }
        if self.participant2.is_some() {
            return Err(SessionError::AlreadyFull);
        }
        if identity == self.participant1 {
            return Err(SessionError::SelfPairing(identity));
        }

        info!(identity = %identity, "Second participant seated");
        self.participant2 = Some(Participant::Human(identity));
        self.status = SessionStatus::InProgress;
        Ok(())
    }

    /// Ends an unfinished session without a winner.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn abandon(&mut self) {
        if self.status != SessionStatus::Complete {
            info!(status = %self.status, "Session abandoned");
            self.status = SessionStatus::Complete;
            self.winner = None;
        }
    }
}
