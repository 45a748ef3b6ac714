//! Engine ports
//!
//! Boundary traits the engine depends on: wall-clock time and outbound
//! notification delivery. Both are injected so tests can control time and
//! observe emissions without a transport.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duelgate_protocol::LobbyEvent;

/// Source of wall-clock time.
pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Outbound notification sink.
///
/// The engine emits [`LobbyEvent`]s for things that are not a direct
/// response to a request (list changes, inactivity warnings, closures,
/// game-start handoff). Delivery to occupants is the transport's job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LobbyNotifier: Send + Sync {
    async fn notify(&self, event: LobbyEvent);
}

/// Notifier that drops every event; useful for tests and headless tools.
pub struct NoopNotifier;

#[async_trait]
impl LobbyNotifier for NoopNotifier {
    async fn notify(&self, _event: LobbyEvent) {}
}
