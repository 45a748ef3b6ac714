//! Periodic lobby cleanup
//!
//! Scans every registered lobby on a fixed interval and applies the
//! time-based reclamation rules: stale Empty and Waiting lobbies receive a
//! single inactivity warning inside the warning window and are closed once
//! their timeout elapses. The sweeper only decides *when* to warn and
//! close; delivering messages to occupants is the notifier's concern.
//!
//! Closing goes through [`LobbyManager::close_lobby`], so sweep-triggered
//! eviction takes the same per-lobby lock as client events and can never
//! race an in-flight join destructively.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use duelgate_domain::{LobbyId, LobbyState};
use duelgate_protocol::LobbyEvent;

use crate::manager::LobbyManager;

/// What a sweep decided for one stale lobby.
enum SweepAction {
    Close,
    Warn { remaining_seconds: u64 },
    Keep,
}

/// Applies the warn-then-close protocol to lobbies whose activity clock
/// has gone stale.
pub struct CleanupSweeper {
    manager: LobbyManager,
    /// Lobbies already warned during their current stale stretch; cleared
    /// when a lobby closes or leaves the swept states, so a lobby that
    /// recovers and goes stale again is warned again.
    warned: Mutex<HashSet<LobbyId>>,
}

impl CleanupSweeper {
    pub fn new(manager: LobbyManager) -> Self {
        Self {
            manager,
            warned: Mutex::new(HashSet::new()),
        }
    }

    /// Spawn the periodic sweep loop.
    pub fn start(self: Arc<Self>) -> SweeperHandle {
        let token = CancellationToken::new();
        let loop_token = token.clone();
        let interval_seconds = self.manager.config().sweep_interval_seconds;
        let sweeper = self;

        let handle = tokio::spawn(async move {
            tracing::info!(interval_seconds, "Lobby cleanup sweeper started");
            let mut ticker = tokio::time::interval(StdDuration::from_secs(interval_seconds));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {
                        let now = sweeper.manager.clock().now();
                        sweeper.run_once(now).await;
                    }
                }
            }
            tracing::info!("Lobby cleanup sweeper stopped");
        });

        SweeperHandle { token, handle }
    }

    /// One sweep pass over the registry at time `now`.
    pub async fn run_once(&self, now: DateTime<Utc>) {
        let config = self.manager.config().clone();
        let mut closed_count = 0usize;
        let mut warned_count = 0usize;

        for lobby in self.manager.get_all_lobbies().await {
            let lobby_id = LobbyId::from_uuid(lobby.lobby_id);
            let idle_seconds = (now - lobby.last_activity).num_seconds();

            let (action, close_reason) = match lobby.state {
                LobbyState::Empty => (
                    stale_action(
                        idle_seconds,
                        config.empty_grace_seconds,
                        config.warning_window_seconds,
                    ),
                    "Lobby has been empty for too long",
                ),
                LobbyState::Waiting => (
                    stale_action(
                        idle_seconds,
                        config.waiting_timeout_seconds,
                        config.warning_window_seconds,
                    ),
                    "Lobby has been inactive for too long",
                ),
                // Tombstones should never be resident; evict immediately.
                LobbyState::Closed => (SweepAction::Close, "Lobby is already closed"),
                // Lobbies with activity in progress are not swept; forget
                // any warning from an earlier stale stretch.
                _ => {
                    self.clear_warning(lobby_id);
                    continue;
                }
            };

            match action {
                SweepAction::Close => {
                    self.manager.close_lobby(lobby_id, close_reason).await;
                    self.clear_warning(lobby_id);
                    closed_count += 1;
                }
                SweepAction::Warn { remaining_seconds } => {
                    if self.mark_warned(lobby_id) {
                        self.manager
                            .notifier()
                            .notify(LobbyEvent::InactivityWarning {
                                lobby_id: lobby.lobby_id,
                                remaining_seconds,
                                reason: "inactivity".to_string(),
                            })
                            .await;
                        tracing::info!(
                            lobby_id = %lobby_id,
                            remaining_seconds,
                            "Inactivity warning sent"
                        );
                        warned_count += 1;
                    }
                }
                SweepAction::Keep => {}
            }
        }

        if closed_count > 0 || warned_count > 0 {
            tracing::info!(
                warned = warned_count,
                closed = closed_count,
                "Cleanup pass finished"
            );
        }
    }

    /// Record the warning; false if this lobby was already warned.
    fn mark_warned(&self, lobby_id: LobbyId) -> bool {
        self.warned.lock().expect("warned lock").insert(lobby_id)
    }

    fn clear_warning(&self, lobby_id: LobbyId) {
        self.warned.lock().expect("warned lock").remove(&lobby_id);
    }
}

/// Time-based rule shared by the Empty and Waiting sweeps.
fn stale_action(idle_seconds: i64, timeout_seconds: u64, warning_window_seconds: u64) -> SweepAction {
    let timeout = timeout_seconds as i64;
    let window = warning_window_seconds as i64;
    if idle_seconds > timeout {
        SweepAction::Close
    } else if idle_seconds > timeout - window {
        SweepAction::Warn {
            remaining_seconds: (timeout - idle_seconds).max(0) as u64,
        }
    } else {
        SweepAction::Keep
    }
}

/// Stops the sweep loop when asked (or dropped by the owner at shutdown).
pub struct SweeperHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the loop to exit after its current pass.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Stop and wait for the loop to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};

    use duelgate_domain::{ConnectionId, CreateLobby, Visibility};

    use crate::clock::FixedClock;
    use crate::config::LobbyConfig;
    use crate::ports::{ClockPort, LobbyNotifier};

    struct RecordingNotifier(Mutex<Vec<LobbyEvent>>);

    impl RecordingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(Vec::new())))
        }

        fn events(&self) -> Vec<LobbyEvent> {
            self.0.lock().expect("notifier lock").clone()
        }

        fn warnings(&self) -> Vec<LobbyEvent> {
            self.events()
                .into_iter()
                .filter(|e| matches!(e, LobbyEvent::InactivityWarning { .. }))
                .collect()
        }
    }

    #[async_trait]
    impl LobbyNotifier for RecordingNotifier {
        async fn notify(&self, event: LobbyEvent) {
            self.0.lock().expect("notifier lock").push(event);
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("valid timestamp")
    }

    fn test_rig() -> (LobbyManager, Arc<FixedClock>, Arc<RecordingNotifier>, CleanupSweeper) {
        let clock = Arc::new(FixedClock::at(t0()));
        let notifier = RecordingNotifier::new();
        let manager = LobbyManager::new(LobbyConfig::default(), clock.clone(), notifier.clone());
        let sweeper = CleanupSweeper::new(manager.clone());
        (manager, clock, notifier, sweeper)
    }

    fn create_params(visibility: Visibility) -> CreateLobby {
        CreateLobby {
            name: "Sweep Lobby".to_string(),
            visibility,
            max_players: 4,
            created_by: "host".to_string(),
            game_settings: serde_json::Value::Null,
        }
    }

    async fn create_empty_lobby(manager: &LobbyManager) -> LobbyId {
        let snapshot = manager
            .create_lobby(create_params(Visibility::Public))
            .await
            .expect("creates");
        let lobby_id = LobbyId::from_uuid(snapshot.lobby_id);
        manager
            .join_lobby(lobby_id, "host".to_string(), "Hosty".to_string(), ConnectionId::new())
            .await
            .expect("host joins");
        assert!(manager.leave_lobby(lobby_id, "host").await);
        lobby_id
    }

    #[tokio::test]
    async fn test_empty_lobby_closed_after_timeout() {
        let (manager, _clock, notifier, sweeper) = test_rig();
        let lobby_id = create_empty_lobby(&manager).await;

        sweeper.run_once(t0() + Duration::seconds(61)).await;

        assert!(manager.get_lobby(lobby_id).await.is_none());
        let closed: Vec<_> = notifier
            .events()
            .into_iter()
            .filter_map(|e| match e {
                LobbyEvent::LobbyClosed { reason, .. } => Some(reason),
                _ => None,
            })
            .collect();
        assert_eq!(closed, vec!["Lobby has been empty for too long".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_lobby_warned_once_inside_window() {
        let (manager, _clock, notifier, sweeper) = test_rig();
        let lobby_id = create_empty_lobby(&manager).await;

        // 35s idle: inside the 30s warning window before the 60s timeout.
        sweeper.run_once(t0() + Duration::seconds(35)).await;
        sweeper.run_once(t0() + Duration::seconds(36)).await;

        assert!(manager.get_lobby(lobby_id).await.is_some());
        let warnings = notifier.warnings();
        assert_eq!(warnings.len(), 1, "warning is idempotent per stale stretch");
        match &warnings[0] {
            LobbyEvent::InactivityWarning { remaining_seconds, reason, .. } => {
                assert_eq!(*remaining_seconds, 25);
                assert_eq!(reason, "inactivity");
            }
            other => panic!("expected InactivityWarning, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fresh_empty_lobby_is_kept() {
        let (manager, _clock, notifier, sweeper) = test_rig();
        let lobby_id = create_empty_lobby(&manager).await;

        sweeper.run_once(t0() + Duration::seconds(10)).await;

        assert!(manager.get_lobby(lobby_id).await.is_some());
        assert!(notifier.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_waiting_lobby_closed_after_waiting_timeout() {
        let (manager, _clock, notifier, sweeper) = test_rig();
        let snapshot = manager
            .create_lobby(create_params(Visibility::Public))
            .await
            .expect("creates");
        let lobby_id = LobbyId::from_uuid(snapshot.lobby_id);

        // Warn inside the window before the 600s waiting timeout.
        sweeper.run_once(t0() + Duration::seconds(580)).await;
        assert!(manager.get_lobby(lobby_id).await.is_some());
        assert_eq!(notifier.warnings().len(), 1);

        sweeper.run_once(t0() + Duration::seconds(601)).await;
        assert!(manager.get_lobby(lobby_id).await.is_none());
    }

    #[tokio::test]
    async fn test_active_lobby_is_never_swept() {
        let (manager, _clock, notifier, sweeper) = test_rig();
        let snapshot = manager
            .create_lobby(create_params(Visibility::Public))
            .await
            .expect("creates");
        let lobby_id = LobbyId::from_uuid(snapshot.lobby_id);
        manager
            .join_lobby(lobby_id, "host".to_string(), "Hosty".to_string(), ConnectionId::new())
            .await
            .expect("host joins");

        sweeper.run_once(t0() + Duration::seconds(3600)).await;

        assert!(manager.get_lobby(lobby_id).await.is_some());
        assert!(notifier.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_recovered_lobby_can_be_warned_again() {
        let (manager, clock, notifier, sweeper) = test_rig();
        let lobby_id = create_empty_lobby(&manager).await;

        // First stale stretch: one warning.
        sweeper.run_once(t0() + Duration::seconds(35)).await;
        assert_eq!(notifier.warnings().len(), 1);

        // A join ends the stretch; the sweep clears the warned marker.
        clock.advance(Duration::seconds(40));
        manager
            .join_lobby(lobby_id, "host".to_string(), "Hosty".to_string(), ConnectionId::new())
            .await
            .expect("rejoins");
        sweeper.run_once(t0() + Duration::seconds(41)).await;

        // Second stale stretch warns again.
        clock.advance(Duration::seconds(10));
        assert!(manager.leave_lobby(lobby_id, "host").await);
        let second_stretch = clock.now();
        sweeper.run_once(second_stretch + Duration::seconds(35)).await;

        assert_eq!(notifier.warnings().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_loop_runs_and_stops() {
        let (manager, clock, _notifier, sweeper) = test_rig();
        let lobby_id = create_empty_lobby(&manager).await;

        // Make the lobby overdue before the first tick fires.
        clock.advance(Duration::seconds(61));
        let handle = Arc::new(sweeper).start();
        tokio::time::sleep(StdDuration::from_millis(5)).await;

        assert!(manager.get_lobby(lobby_id).await.is_none());
        handle.shutdown().await;
    }
}
