//! Duelgate Engine - Lobby lifecycle core
//!
//! Library invoked by a transport/session layer: it owns lobby state,
//! admission rules, per-lobby mutual exclusion, and periodic cleanup. It
//! has no wire format of its own; callers supply authenticated identities
//! and receive snapshots and [`duelgate_protocol::LobbyEvent`]s back.
//!
//! Typical wiring:
//!
//! ```ignore
//! let config = LobbyConfig::from_env()?;
//! let manager = LobbyManager::new(config, Arc::new(SystemClock), notifier);
//! let sweeper = Arc::new(CleanupSweeper::new(manager.clone())).start();
//! ```

pub mod clock;
pub mod config;
pub mod manager;
pub mod ports;
pub mod store;
pub mod sweeper;

pub use clock::SystemClock;
pub use config::LobbyConfig;
pub use manager::LobbyManager;
pub use ports::{ClockPort, LobbyNotifier, NoopNotifier};
pub use store::LobbyStore;
pub use sweeper::{CleanupSweeper, SweeperHandle};
