//! Lobby membership types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ConnectionId;

/// Transport liveness of a lobby member.
///
/// The lobby core only records the flag; reconnect-within-grace logic lives
/// in the transport layer, which compares [`LobbyPlayer::connection_ref`]
/// against the session it is currently holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// A member of a lobby.
///
/// Owned by exactly one [`Lobby`](crate::lobby::Lobby); membership order in
/// the lobby's player list is join order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyPlayer {
    /// Authenticated user identity, supplied by the caller
    pub user_id: String,
    /// Display name
    pub username: String,
    /// Current transport-session identifier
    pub connection_ref: ConnectionId,
    pub connection_state: ConnectionState,
    pub joined_at: DateTime<Utc>,
    /// Ready to start the game
    pub is_ready: bool,
    /// First member to occupy the lobby is host
    pub is_host: bool,
    /// For disconnect detection
    pub last_heartbeat: DateTime<Utc>,
}

impl LobbyPlayer {
    pub fn new(
        user_id: String,
        username: String,
        connection_ref: ConnectionId,
        is_host: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            username,
            connection_ref,
            connection_state: ConnectionState::Connected,
            joined_at: now,
            is_ready: false,
            is_host,
            last_heartbeat: now,
        }
    }

    /// Check if this member counts as actively connected.
    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }
}
