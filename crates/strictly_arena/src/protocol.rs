//! JSON wire protocol spoken over the WebSocket.
//!
//! Frames are tagged by a camelCase `type` field.

use crate::session::GameSession;
use serde::{Deserialize, Serialize};

/// Messages sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Ask for a new game, against the computer or another human.
    NewGame {
        /// `true` to wait for a human partner.
        two_player: bool,
    },
    /// Place a mark. `x` is the column, `y` the row.
    PlayerMove {
        /// Column index.
        x: i64,
        /// Row index.
        y: i64,
    },
}

impl ClientMessage {
    /// Parses a text frame.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Messages sent to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// The request was queued until a partner arrives.
    WaitingPartner,
    /// Current session snapshot.
    CurrentState {
        /// The session.
        state: GameSession,
    },
    /// The other human left; the session is over.
    PlayerLeft,
    /// A move was rejected; the session is unchanged.
    InvalidMove {
        /// Human-readable reason.
        reason: String,
    },
    /// A frame could not be understood.
    Error {
        /// Human-readable description.
        message: String,
    },
}

impl ServerMessage {
    /// Encodes the message as a text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
