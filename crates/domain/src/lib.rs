//! Duelgate Domain - Core lobby types, value objects, and invariants
//!
//! Pure, synchronous domain model for the matchmaking lobby layer. No
//! async, no I/O, no clocks: timestamps and randomness are passed in by
//! the engine so every rule here is unit-testable.

pub mod code;
pub mod error;
pub mod ids;
pub mod lobby;
pub mod player;

pub use code::{LobbyCode, DEFAULT_CODE_LENGTH, SAFE_ALPHABET};
pub use error::DomainError;
pub use ids::{ConnectionId, LobbyId};
pub use lobby::{CreateLobby, JoinRejection, Lobby, LobbyState, Visibility};
pub use player::{ConnectionState, LobbyPlayer};
