//! Outbound lobby events
//!
//! Non-request-driven notifications the engine pushes to the transport
//! layer. The engine decides *when* to emit; delivery (rooms, sockets,
//! retained player lists) is the transport's responsibility.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dto::{LobbyPlayerInfo, LobbySnapshot};

/// Events from the lobby core to the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LobbyEvent {
    /// The set of publicly listed lobbies changed (create/join/leave/close
    /// touching a public lobby). Carries no payload; listeners re-query.
    LobbyListChanged,
    /// A lobby is approaching its inactivity deadline. Emitted at most once
    /// per lobby while it remains stale.
    InactivityWarning {
        lobby_id: Uuid,
        remaining_seconds: u64,
        reason: String,
    },
    /// A lobby was removed from the registry. `occupants` is the final
    /// member list so the transport can still notify them after removal.
    LobbyClosed {
        lobby_id: Uuid,
        reason: String,
        occupants: Vec<LobbyPlayerInfo>,
    },
    /// A game is starting; the transport should call the match-creation
    /// service with the snapshot's settings and player count.
    GameStarting { lobby: LobbySnapshot },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_tag_by_type() {
        let event = LobbyEvent::InactivityWarning {
            lobby_id: Uuid::new_v4(),
            remaining_seconds: 25,
            reason: "inactivity".to_string(),
        };
        let json = serde_json::to_value(&event).expect("serializes");
        assert_eq!(json["type"], "InactivityWarning");
        assert_eq!(json["remaining_seconds"], 25);
    }
}
