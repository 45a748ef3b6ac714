//! Duelgate Protocol - Shared types for the lobby core and its transport
//!
//! This crate contains the types the engine hands across its boundary:
//! - Wire-format DTOs (lobby snapshots, member info)
//! - Outbound event payloads (list changes, warnings, closures)
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only serde, uuid, chrono, and serde_json
//! 2. **No business logic** - Pure data types and serialization
//! 3. **No domain IDs on the wire** - raw `uuid::Uuid` in DTOs

pub mod dto;
pub mod events;

pub use dto::{LobbyPlayerInfo, LobbySnapshot};
pub use events::LobbyEvent;
