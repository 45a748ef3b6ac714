//! Data Transfer Objects (DTOs)
//!
//! Wire-format lobby types handed to the transport layer. These use raw
//! UUIDs and primitives for transport rather than domain ID types, and are
//! presentation snapshots: they may lag a concurrent mutation and must
//! never be used for gating decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use duelgate_domain::{ConnectionState, Lobby, LobbyPlayer, LobbyState, Visibility};

/// Wire-format lobby member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyPlayerInfo {
    pub user_id: String,
    pub username: String,
    /// Current transport-session id
    pub connection_ref: Uuid,
    pub connection_state: ConnectionState,
    pub joined_at: DateTime<Utc>,
    pub is_ready: bool,
    pub is_host: bool,
    pub last_heartbeat: DateTime<Utc>,
}

impl From<&LobbyPlayer> for LobbyPlayerInfo {
    fn from(player: &LobbyPlayer) -> Self {
        Self {
            user_id: player.user_id.clone(),
            username: player.username.clone(),
            connection_ref: player.connection_ref.to_uuid(),
            connection_state: player.connection_state,
            joined_at: player.joined_at,
            is_ready: player.is_ready,
            is_host: player.is_host,
            last_heartbeat: player.last_heartbeat,
        }
    }
}

/// Wire-format lobby state, with members in join order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbySnapshot {
    pub lobby_id: Uuid,
    pub lobby_code: String,
    pub name: String,
    pub visibility: Visibility,
    pub max_players: u8,
    pub state: LobbyState,
    pub players: Vec<LobbyPlayerInfo>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub last_activity: DateTime<Utc>,
    /// Opaque settings blob, passed through unchanged to match creation
    pub game_settings: serde_json::Value,
}

impl From<&Lobby> for LobbySnapshot {
    fn from(lobby: &Lobby) -> Self {
        Self {
            lobby_id: lobby.lobby_id.to_uuid(),
            lobby_code: lobby.lobby_code.to_string(),
            name: lobby.name.clone(),
            visibility: lobby.visibility,
            max_players: lobby.max_players,
            state: lobby.state,
            players: lobby.players().iter().map(LobbyPlayerInfo::from).collect(),
            created_at: lobby.created_at,
            created_by: lobby.created_by.clone(),
            last_activity: lobby.last_activity,
            game_settings: lobby.game_settings.clone(),
        }
    }
}
