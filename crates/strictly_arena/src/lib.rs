//! Strictly Arena - tic-tac-toe matchmaking server
//!
//! Players connect over WebSocket, ask for a game against the computer or
//! against another human, and play it out move by move. Finished games are
//! recorded to SQLite.
//!
//! # Architecture
//!
//! - **Session**: one game, its turn order and its lifecycle
//! - **Matchmaker**: FIFO pairing of two-player requests
//! - **Gateway**: single dispatcher that owns every session and connection
//! - **Store**: persistence of participants and completed games
//! - **Server**: axum WebSocket transport and authentication
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use strictly_arena::{Gateway, MemoryStore, RandomOpponent, TokioScheduler};
//!
//! # async fn example() {
//! let (events, receiver) = tokio::sync::mpsc::unbounded_channel();
//! let gateway = Gateway::new(
//!     Arc::new(MemoryStore::new()),
//!     Box::new(TokioScheduler::new(events.clone())),
//!     RandomOpponent::from_entropy(),
//!     Duration::from_millis(750),
//! );
//! tokio::spawn(gateway.run(receiver));
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod auth;
mod config;
mod gateway;
mod matchmaker;
mod opponent;
mod protocol;
mod registry;
mod server;
mod session;
mod store;

// Crate-level exports - Authentication
pub use auth::{AuthError, AuthVerifier, TokenTableVerifier};

// Crate-level exports - Configuration
pub use config::{ArenaConfig, ConfigError, DATABASE_PATH_ENV, TokenEntry};

// Crate-level exports - Dispatcher
pub use gateway::{Gateway, GatewayEvent, Scheduler, TokioScheduler};
pub use matchmaker::{Matched, Matchmaker};
pub use registry::{Connection, ConnectionId, Outbox, Registry};

// Crate-level exports - Scripted opponent
pub use opponent::RandomOpponent;

// Crate-level exports - Wire protocol
pub use protocol::{ClientMessage, ServerMessage};

// Crate-level exports - Server
pub use server::{AppState, ConnectParams, authenticate, router, serve};

// Crate-level exports - Sessions
pub use session::{
    COMPUTER_LABEL, DRAW_LABEL, GameSession, Identity, MoveError, MoveOutcome, Participant, Seat, SessionError,
    SessionId, SessionStatus, Winner,
};

// Crate-level exports - Persistence
pub use store::{
    CompletedGame, MemoryStore, ParticipantRecord, ParticipantStats,
    PersistenceStore, SqliteStore, StoreError,
};

// Crate-level exports - Game rules
pub use strictly_tictactoe::{Board, Coordinates, Evaluation, Mark, Outcome};
