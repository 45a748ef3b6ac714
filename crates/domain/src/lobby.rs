//! Lobby aggregate
//!
//! The lobby is the aggregate root of the pre-game phase: it owns its
//! members, its lifecycle state, and the admission rules. Everything here
//! is synchronous and pure; locking and timers live in the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::code::LobbyCode;
use crate::error::DomainError;
use crate::ids::{ConnectionId, LobbyId};
use crate::player::{ConnectionState, LobbyPlayer};

/// Who can discover the lobby in public listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

/// Lobby lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyState {
    /// Created, waiting for players
    Waiting,
    /// Has 1+ players, accepting joins
    Active,
    /// Max players reached
    Full,
    /// Game initialization in progress
    Starting,
    /// Game started, handed off to the match service
    InGame,
    /// All players left, grace period running
    Empty,
    /// Tombstone: removal from the registry is imminent
    Closed,
}

/// Why a join request was refused.
///
/// These are expected business outcomes, surfaced verbatim to the caller
/// for user-facing messaging; they are never raised as panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinRejection {
    #[error("lobby is closed")]
    LobbyClosed,
    #[error("game already in progress")]
    GameInProgress,
    #[error("lobby is full")]
    LobbyFull,
    #[error("user is already in this lobby")]
    AlreadyInLobby,
    #[error("cannot join an empty private lobby")]
    LobbyEmpty,
}

impl JoinRejection {
    /// Stable reason code for transport payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::LobbyClosed => "LOBBY_CLOSED",
            Self::GameInProgress => "GAME_IN_PROGRESS",
            Self::LobbyFull => "LOBBY_FULL",
            Self::AlreadyInLobby => "ALREADY_IN_LOBBY",
            Self::LobbyEmpty => "LOBBY_EMPTY",
        }
    }
}

/// Input for lobby creation.
#[derive(Debug, Clone)]
pub struct CreateLobby {
    /// Display name; empty means "use a default"
    pub name: String,
    pub visibility: Visibility,
    pub max_players: u8,
    /// Host user id
    pub created_by: String,
    /// Opaque settings blob, passed through unchanged to match creation
    pub game_settings: serde_json::Value,
}

impl CreateLobby {
    /// Validate creation input against configured player bounds.
    pub fn validate(&self, min_players: u8, max_players: u8) -> Result<(), DomainError> {
        if !self.name.is_empty() && (self.name.len() < 3 || self.name.len() > 50) {
            return Err(DomainError::validation(
                "Lobby name must be 3-50 characters or empty",
            ));
        }
        if self.max_players < min_players || self.max_players > max_players {
            return Err(DomainError::validation(format!(
                "Max players must be between {} and {}",
                min_players, max_players
            )));
        }
        if self.created_by.is_empty() {
            return Err(DomainError::validation("Creator user id cannot be empty"));
        }
        Ok(())
    }
}

/// A pre-game room grouping players before a match is created.
#[derive(Debug, Clone)]
pub struct Lobby {
    pub lobby_id: LobbyId,
    pub lobby_code: LobbyCode,
    pub name: String,
    pub visibility: Visibility,
    pub max_players: u8,
    pub state: LobbyState,
    /// Members in join order; no duplicate user ids
    players: Vec<LobbyPlayer>,
    pub created_at: DateTime<Utc>,
    /// Host user id; never reassigned (host departure is terminal, the
    /// calling layer closes the lobby)
    pub created_by: String,
    /// Updated on every membership or readiness mutation, drives cleanup
    pub last_activity: DateTime<Utc>,
    pub game_settings: serde_json::Value,
    /// Scheduled-close marker, present only while state is Empty
    pub empty_grace_deadline: Option<DateTime<Utc>>,
}

impl Lobby {
    pub fn new(lobby_id: LobbyId, lobby_code: LobbyCode, config: CreateLobby, now: DateTime<Utc>) -> Self {
        let name = if config.name.is_empty() {
            "Unnamed Lobby".to_string()
        } else {
            config.name
        };
        Self {
            lobby_id,
            lobby_code,
            name,
            visibility: config.visibility,
            max_players: config.max_players,
            state: LobbyState::Waiting,
            players: Vec::new(),
            created_at: now,
            created_by: config.created_by,
            last_activity: now,
            game_settings: config.game_settings,
            empty_grace_deadline: None,
        }
    }

    /// Members in join order.
    pub fn players(&self) -> &[LobbyPlayer] {
        &self.players
    }

    pub fn player(&self, user_id: &str) -> Option<&LobbyPlayer> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    pub fn player_mut(&mut self, user_id: &str) -> Option<&mut LobbyPlayer> {
        self.players.iter_mut().find(|p| p.user_id == user_id)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.player(user_id).is_some()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Members whose transport session is currently live.
    pub fn connected_count(&self) -> usize {
        self.players
            .iter()
            .filter(|p| p.connection_state == ConnectionState::Connected)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players as usize
    }

    pub fn is_closed(&self) -> bool {
        self.state == LobbyState::Closed
    }

    /// Evaluate the admission guards for a prospective joiner.
    ///
    /// Guards run in a fixed order and the first failure wins. Callers must
    /// hold the lobby's write lock and re-run this against current state;
    /// the result is only meaningful under that lock.
    pub fn check_admission(&self, user_id: &str) -> Result<(), JoinRejection> {
        if self.state == LobbyState::Closed {
            return Err(JoinRejection::LobbyClosed);
        }
        if self.state == LobbyState::InGame {
            return Err(JoinRejection::GameInProgress);
        }
        if self.is_full() {
            return Err(JoinRejection::LobbyFull);
        }
        if self.contains(user_id) {
            return Err(JoinRejection::AlreadyInLobby);
        }
        // Empty private lobbies admit only their creator; public lobbies may
        // be repopulated by anyone.
        if self.visibility == Visibility::Private
            && self.connected_count() == 0
            && user_id != self.created_by
        {
            return Err(JoinRejection::LobbyEmpty);
        }
        Ok(())
    }

    /// Insert a new member and recompute state.
    ///
    /// Callers must have passed [`check_admission`](Self::check_admission)
    /// under the same lock. The first member to occupy the lobby becomes
    /// host. Clears any pending empty-grace deadline.
    pub fn admit(
        &mut self,
        user_id: String,
        username: String,
        connection_ref: ConnectionId,
        now: DateTime<Utc>,
    ) -> &LobbyPlayer {
        let is_host = self.players.is_empty();
        self.players
            .push(LobbyPlayer::new(user_id, username, connection_ref, is_host, now));

        if matches!(self.state, LobbyState::Waiting | LobbyState::Empty) {
            self.state = LobbyState::Active;
        }
        if self.players.len() == self.max_players as usize {
            self.state = LobbyState::Full;
        }

        self.empty_grace_deadline = None;
        self.last_activity = now;
        self.assert_invariants();

        self.players.last().expect("member was just inserted")
    }

    /// Remove a member and recompute state.
    ///
    /// Going to zero members transitions to Empty (the caller arms the
    /// grace timer); leaving a Full lobby transitions back to Active.
    pub fn remove_player(&mut self, user_id: &str, now: DateTime<Utc>) -> Option<LobbyPlayer> {
        let idx = self.players.iter().position(|p| p.user_id == user_id)?;
        let removed = self.players.remove(idx);
        self.last_activity = now;

        if self.players.is_empty() {
            self.state = LobbyState::Empty;
        } else if self.state == LobbyState::Full {
            self.state = LobbyState::Active;
        }
        self.assert_invariants();

        Some(removed)
    }

    /// All members other than the host are ready.
    ///
    /// The host gates the start action itself, so their own ready flag is
    /// irrelevant.
    pub fn all_non_host_ready(&self) -> bool {
        self.players
            .iter()
            .filter(|p| p.user_id != self.created_by)
            .all(|p| p.is_ready)
    }

    /// Reverse the seating order of a two-player lobby.
    ///
    /// Returns false unless exactly two members are present.
    pub fn swap_seats(&mut self, now: DateTime<Utc>) -> bool {
        if self.players.len() != 2 {
            return false;
        }
        self.players.swap(0, 1);
        self.last_activity = now;
        true
    }

    pub fn arm_empty_grace(&mut self, deadline: DateTime<Utc>) {
        self.empty_grace_deadline = Some(deadline);
    }

    /// Internal invariants; a breach is a programming defect, not a
    /// user-triggerable condition, so fail loudly.
    fn assert_invariants(&self) {
        assert!(
            self.players.len() <= self.max_players as usize,
            "lobby {} exceeds capacity: {}/{}",
            self.lobby_id,
            self.players.len(),
            self.max_players
        );
        let hosts = self.players.iter().filter(|p| p.is_host).count();
        assert!(
            hosts <= 1,
            "lobby {} has {} members flagged host",
            self.lobby_id,
            hosts
        );
    }
}
