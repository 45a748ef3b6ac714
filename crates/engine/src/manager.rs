//! Lobby lifecycle management
//!
//! `LobbyManager` is the only writer of lobby state. Every mutating
//! operation takes the target lobby's write lock, re-reads current state
//! under it, applies the domain rules, and returns a plain value; expected
//! business outcomes (full, closed, already joined) are data, never panics.
//! Operations on different lobbies run fully concurrently.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLockWriteGuard;

use duelgate_domain::{
    ConnectionId, ConnectionState, CreateLobby, DomainError, JoinRejection, Lobby, LobbyCode,
    LobbyId, LobbyState, Visibility,
};
use duelgate_protocol::{LobbyEvent, LobbyPlayerInfo, LobbySnapshot};

use crate::config::LobbyConfig;
use crate::ports::{ClockPort, LobbyNotifier};
use crate::store::LobbyStore;

/// Attempts at a collision-free random code before falling back to a
/// time-suffixed one.
const MAX_CODE_ATTEMPTS: usize = 3;

/// Manages the lifecycle of all open lobbies.
///
/// Cheap to clone; clones share the same registry. Timer tasks hold a
/// clone so eviction routes through the same locks as client events.
#[derive(Clone)]
pub struct LobbyManager {
    store: Arc<LobbyStore>,
    config: Arc<LobbyConfig>,
    clock: Arc<dyn ClockPort>,
    notifier: Arc<dyn LobbyNotifier>,
}

impl LobbyManager {
    pub fn new(
        config: LobbyConfig,
        clock: Arc<dyn ClockPort>,
        notifier: Arc<dyn LobbyNotifier>,
    ) -> Self {
        Self {
            store: Arc::new(LobbyStore::new()),
            config: Arc::new(config),
            clock,
            notifier,
        }
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    pub(crate) fn clock(&self) -> &Arc<dyn ClockPort> {
        &self.clock
    }

    pub(crate) fn notifier(&self) -> &Arc<dyn LobbyNotifier> {
        &self.notifier
    }

    // =========================================================================
    // Lifecycle operations
    // =========================================================================

    /// Create a new lobby.
    ///
    /// The lobby starts in Waiting with zero members; callers normally join
    /// the creator right after. No lock is needed: the lobby is not visible
    /// to other operations until it lands in the registry.
    pub async fn create_lobby(&self, config: CreateLobby) -> Result<LobbySnapshot, DomainError> {
        config.validate(self.config.min_players, self.config.max_players)?;

        let lobby_id = LobbyId::new();
        let lobby_code = self.generate_lobby_code();
        let lobby = Lobby::new(lobby_id, lobby_code, config, self.clock.now());

        tracing::info!(
            lobby_id = %lobby_id,
            lobby_code = %lobby.lobby_code,
            created_by = %lobby.created_by,
            "Lobby created"
        );

        let snapshot = LobbySnapshot::from(&lobby);
        let is_public = lobby.visibility == Visibility::Public;
        self.store.insert(lobby);

        if is_public {
            self.notifier.notify(LobbyEvent::LobbyListChanged).await;
        }
        Ok(snapshot)
    }

    /// Join a lobby.
    ///
    /// Admission guards are evaluated under the lobby's write lock against
    /// current state, so two racers for the last slot resolve
    /// deterministically: one joins, the other gets `LobbyFull`.
    pub async fn join_lobby(
        &self,
        lobby_id: LobbyId,
        user_id: String,
        username: String,
        connection_ref: ConnectionId,
    ) -> Result<LobbySnapshot, JoinRejection> {
        let Some(slot) = self.store.slot(lobby_id) else {
            return Err(JoinRejection::LobbyClosed);
        };
        let mut lobby = slot.write().await;

        // Re-check against current state now that the lock is held.
        lobby.check_admission(&user_id)?;

        let prev_state = lobby.state;
        lobby.admit(user_id.clone(), username.clone(), connection_ref, self.clock.now());
        self.store.cancel_grace_timer(lobby_id);
        self.store.link_user(&user_id, lobby_id);
        self.log_transition(lobby_id, prev_state, lobby.state);

        tracing::info!(
            lobby_id = %lobby_id,
            user_id = %user_id,
            username = %username,
            "Player joined lobby"
        );

        let snapshot = LobbySnapshot::from(&*lobby);
        let is_public = lobby.visibility == Visibility::Public;
        drop(lobby);

        if is_public {
            self.notifier.notify(LobbyEvent::LobbyListChanged).await;
        }
        Ok(snapshot)
    }

    /// Leave a lobby.
    ///
    /// Returns false when the lobby or member is missing. The last member
    /// leaving transitions the lobby to Empty and arms the grace-period
    /// eviction timer. The host's `created_by` role is never reassigned;
    /// on host departure the calling layer is expected to close the lobby.
    pub async fn leave_lobby(&self, lobby_id: LobbyId, user_id: &str) -> bool {
        let Some(slot) = self.store.slot(lobby_id) else {
            return false;
        };
        let mut lobby = slot.write().await;
        if lobby.is_closed() {
            return false;
        }

        let Some(removed) = self.apply_removal(&mut lobby, user_id) else {
            return false;
        };
        tracing::info!(
            lobby_id = %lobby_id,
            user_id = %user_id,
            username = %removed.username,
            "Player left lobby"
        );

        let is_public = lobby.visibility == Visibility::Public;
        drop(lobby);

        if is_public {
            self.notifier.notify(LobbyEvent::LobbyListChanged).await;
        }
        true
    }

    /// Update a member's ready flag. No state-machine transition.
    pub async fn update_ready_status(
        &self,
        lobby_id: LobbyId,
        user_id: &str,
        is_ready: bool,
    ) -> bool {
        let Some(slot) = self.store.slot(lobby_id) else {
            return false;
        };
        let mut lobby = slot.write().await;
        if lobby.is_closed() {
            return false;
        }
        let now = self.clock.now();
        let Some(player) = lobby.player_mut(user_id) else {
            return false;
        };
        player.is_ready = is_ready;
        let username = player.username.clone();
        lobby.last_activity = now;

        tracing::info!(
            lobby_id = %lobby_id,
            user_id = %user_id,
            username = %username,
            is_ready,
            "Ready status updated"
        );
        true
    }

    /// Start the game (host only).
    ///
    /// Fails without mutation unless the requester created the lobby, every
    /// member other than the host is ready (the host gates the start action
    /// itself), and the minimum player count is met.
    pub async fn start_game(&self, lobby_id: LobbyId, requesting_user_id: &str) -> bool {
        let Some(slot) = self.store.slot(lobby_id) else {
            return false;
        };
        let mut lobby = slot.write().await;
        if lobby.is_closed() {
            return false;
        }

        if lobby.created_by != requesting_user_id {
            tracing::debug!(
                lobby_id = %lobby_id,
                user_id = %requesting_user_id,
                "Start refused: requester is not the host"
            );
            return false;
        }
        if !lobby.all_non_host_ready() {
            tracing::debug!(lobby_id = %lobby_id, "Start refused: not all players are ready");
            return false;
        }
        if lobby.player_count() < self.config.min_players as usize {
            tracing::debug!(
                lobby_id = %lobby_id,
                players = lobby.player_count(),
                min = self.config.min_players,
                "Start refused: not enough players"
            );
            return false;
        }

        let prev_state = lobby.state;
        lobby.state = LobbyState::Starting;
        lobby.last_activity = self.clock.now();
        self.log_transition(lobby_id, prev_state, lobby.state);
        tracing::info!(lobby_id = %lobby_id, "Game starting");

        let snapshot = LobbySnapshot::from(&*lobby);
        drop(lobby);

        self.notifier
            .notify(LobbyEvent::GameStarting { lobby: snapshot })
            .await;
        true
    }

    /// Mark the lobby in-game once the external match has been created.
    ///
    /// Terminal for this subsystem: the game service owns the lifecycle
    /// from here, and the lobby stops being publicly listed.
    pub async fn mark_in_game(&self, lobby_id: LobbyId) -> bool {
        let Some(slot) = self.store.slot(lobby_id) else {
            return false;
        };
        let mut lobby = slot.write().await;
        if lobby.is_closed() {
            return false;
        }
        let prev_state = lobby.state;
        lobby.state = LobbyState::InGame;
        self.log_transition(lobby_id, prev_state, lobby.state);

        let is_public = lobby.visibility == Visibility::Public;
        drop(lobby);

        if is_public {
            self.notifier.notify(LobbyEvent::LobbyListChanged).await;
        }
        true
    }

    /// Close a lobby and remove it from every index.
    ///
    /// Idempotent: closing twice, or closing an unknown id, is a safe
    /// no-op. Routed through the lobby's write lock so deletion cannot race
    /// an in-flight join; in-flight holders of the slot observe the Closed
    /// tombstone after this returns.
    pub async fn close_lobby(&self, lobby_id: LobbyId, reason: &str) {
        let Some(slot) = self.store.slot(lobby_id) else {
            return;
        };
        let lobby = slot.write().await;
        if lobby.is_closed() {
            // Defensive: a tombstone is removed in the same critical section
            // that creates it, so a resident one indicates a defect. Evict it
            // quietly without re-notifying.
            tracing::warn!(lobby_id = %lobby_id, "Resident closed lobby evicted");
            self.store.remove(lobby_id, &lobby.lobby_code);
            return;
        }
        // Abort any pending eviction task; the timer path closes through
        // finish_close itself and never reaches here.
        self.store.cancel_grace_timer(lobby_id);
        self.finish_close(lobby, reason).await;
    }

    // =========================================================================
    // Member session operations
    // =========================================================================

    /// Refresh a member's heartbeat and the lobby's activity clock.
    pub async fn heartbeat(&self, lobby_id: LobbyId, user_id: &str) -> bool {
        let Some(slot) = self.store.slot(lobby_id) else {
            return false;
        };
        let mut lobby = slot.write().await;
        if lobby.is_closed() {
            return false;
        }
        let now = self.clock.now();
        let Some(player) = lobby.player_mut(user_id) else {
            return false;
        };
        player.last_heartbeat = now;
        lobby.last_activity = now;
        true
    }

    /// Remove a member on the host's behalf.
    ///
    /// Only the lobby creator may kick, and never themselves. Removal
    /// follows the leave path, including the Empty transition bookkeeping.
    pub async fn kick_player(
        &self,
        lobby_id: LobbyId,
        requesting_user_id: &str,
        target_user_id: &str,
    ) -> bool {
        let Some(slot) = self.store.slot(lobby_id) else {
            return false;
        };
        let mut lobby = slot.write().await;
        if lobby.is_closed() {
            return false;
        }
        if lobby.created_by != requesting_user_id || requesting_user_id == target_user_id {
            return false;
        }

        let Some(removed) = self.apply_removal(&mut lobby, target_user_id) else {
            return false;
        };
        tracing::info!(
            lobby_id = %lobby_id,
            target = %target_user_id,
            username = %removed.username,
            by = %requesting_user_id,
            "Player kicked from lobby"
        );

        let is_public = lobby.visibility == Visibility::Public;
        drop(lobby);

        if is_public {
            self.notifier.notify(LobbyEvent::LobbyListChanged).await;
        }
        true
    }

    /// Reverse the seating order of a two-player lobby.
    pub async fn swap_positions(&self, lobby_id: LobbyId) -> bool {
        let Some(slot) = self.store.slot(lobby_id) else {
            return false;
        };
        let mut lobby = slot.write().await;
        if lobby.is_closed() {
            return false;
        }
        if !lobby.swap_seats(self.clock.now()) {
            return false;
        }
        tracing::info!(lobby_id = %lobby_id, "Positions swapped");
        true
    }

    /// Flag a member as disconnected.
    ///
    /// `connection_ref` must still match the member's live session; a
    /// mismatch means an old transport session is reporting after the user
    /// already reconnected, and is ignored.
    pub async fn mark_disconnected(
        &self,
        lobby_id: LobbyId,
        user_id: &str,
        connection_ref: ConnectionId,
    ) -> bool {
        let Some(slot) = self.store.slot(lobby_id) else {
            return false;
        };
        let mut lobby = slot.write().await;
        if lobby.is_closed() {
            return false;
        }
        let now = self.clock.now();
        let Some(player) = lobby.player_mut(user_id) else {
            return false;
        };
        if player.connection_ref != connection_ref {
            return false;
        }
        player.connection_state = ConnectionState::Disconnected;
        lobby.last_activity = now;
        tracing::info!(lobby_id = %lobby_id, user_id = %user_id, "Player disconnected");
        true
    }

    /// Reattach a member to a new transport session within the grace window.
    pub async fn mark_reconnected(
        &self,
        lobby_id: LobbyId,
        user_id: &str,
        connection_ref: ConnectionId,
    ) -> bool {
        let Some(slot) = self.store.slot(lobby_id) else {
            return false;
        };
        let mut lobby = slot.write().await;
        if lobby.is_closed() {
            return false;
        }
        let now = self.clock.now();
        let Some(player) = lobby.player_mut(user_id) else {
            return false;
        };
        player.connection_ref = connection_ref;
        player.connection_state = ConnectionState::Connected;
        player.last_heartbeat = now;
        lobby.last_activity = now;
        tracing::info!(lobby_id = %lobby_id, user_id = %user_id, "Player reconnected");
        true
    }

    // =========================================================================
    // Queries (best-effort snapshots, never gating)
    // =========================================================================

    /// Snapshot a lobby by id.
    pub async fn get_lobby(&self, lobby_id: LobbyId) -> Option<LobbySnapshot> {
        let slot = self.store.slot(lobby_id)?;
        let lobby = slot.read().await;
        Some(LobbySnapshot::from(&*lobby))
    }

    /// Snapshot a lobby by its join code (case-insensitive).
    pub async fn get_lobby_by_code(&self, code: &str) -> Option<LobbySnapshot> {
        let lobby_id = self.store.resolve_code(&LobbyCode::new(code))?;
        self.get_lobby(lobby_id).await
    }

    /// Snapshot every lobby the user currently occupies.
    pub async fn get_user_lobbies(&self, user_id: &str) -> Vec<LobbySnapshot> {
        let mut lobbies = Vec::new();
        for lobby_id in self.store.user_lobby_ids(user_id) {
            if let Some(snapshot) = self.get_lobby(lobby_id).await {
                lobbies.push(snapshot);
            }
        }
        lobbies
    }

    /// Snapshot all registered lobbies, including ones mid-teardown.
    pub async fn get_all_lobbies(&self) -> Vec<LobbySnapshot> {
        let mut lobbies = Vec::new();
        for (_, slot) in self.store.slots() {
            let lobby = slot.read().await;
            lobbies.push(LobbySnapshot::from(&*lobby));
        }
        lobbies
    }

    /// Snapshot lobbies eligible for the public listing.
    pub async fn get_public_lobbies(&self) -> Vec<LobbySnapshot> {
        let mut lobbies = Vec::new();
        for (_, slot) in self.store.slots() {
            let lobby = slot.read().await;
            if lobby.visibility == Visibility::Public
                && !matches!(lobby.state, LobbyState::Closed | LobbyState::InGame)
            {
                lobbies.push(LobbySnapshot::from(&*lobby));
            }
        }
        lobbies
    }

    pub fn lobby_count(&self) -> usize {
        self.store.lobby_count()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Remove a member under the lobby's write guard, arming the
    /// empty-grace eviction timer when the last member leaves.
    fn apply_removal(
        &self,
        lobby: &mut RwLockWriteGuard<'_, Lobby>,
        user_id: &str,
    ) -> Option<duelgate_domain::LobbyPlayer> {
        let now = self.clock.now();
        let lobby_id = lobby.lobby_id;
        let prev_state = lobby.state;
        let removed = lobby.remove_player(user_id, now)?;
        self.store.unlink_user(user_id, lobby_id);

        if lobby.is_empty() {
            let deadline = now + Duration::seconds(self.config.empty_grace_seconds as i64);
            lobby.arm_empty_grace(deadline);
            self.spawn_grace_timer(lobby_id, deadline);
            tracing::info!(
                lobby_id = %lobby_id,
                grace_seconds = self.config.empty_grace_seconds,
                "Lobby is empty, grace period started"
            );
        }
        self.log_transition(lobby_id, prev_state, lobby.state);
        Some(removed)
    }

    /// Schedule the empty-grace eviction for `deadline`.
    ///
    /// The timer is a first-class cancellable handle: joins abort it under
    /// the lobby lock, and its firing re-acquires the same lock and
    /// re-checks state, so cancellation is linearized rather than
    /// last-writer-wins.
    fn spawn_grace_timer(&self, lobby_id: LobbyId, deadline: DateTime<Utc>) {
        let manager = self.clone();
        let handle = tokio::spawn(async move {
            let wait = (deadline - manager.clock.now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            manager.fire_empty_grace(lobby_id, deadline).await;
        });
        self.store.set_grace_timer(lobby_id, handle);
    }

    /// Timer body: close the lobby only if it is still Empty with the same
    /// armed deadline. A join that won the lock first has cleared or
    /// re-armed the deadline and the firing becomes a no-op.
    async fn fire_empty_grace(&self, lobby_id: LobbyId, armed_deadline: DateTime<Utc>) {
        let Some(slot) = self.store.slot(lobby_id) else {
            return;
        };
        let lobby = slot.write().await;
        if lobby.is_closed()
            || lobby.state != LobbyState::Empty
            || lobby.empty_grace_deadline != Some(armed_deadline)
        {
            return;
        }
        self.finish_close(lobby, "Empty grace period expired").await;
    }

    /// Tear a lobby down: tombstone it, clear every index, then notify.
    ///
    /// Consumes the write guard so the lock is released before events go
    /// out; by then the registry entry is gone and late lock acquirers see
    /// the Closed tombstone.
    async fn finish_close(&self, mut lobby: RwLockWriteGuard<'_, Lobby>, reason: &str) {
        let lobby_id = lobby.lobby_id;
        let prev_state = lobby.state;
        lobby.state = LobbyState::Closed;

        for player in lobby.players() {
            self.store.unlink_user(&player.user_id, lobby_id);
        }
        self.store.remove(lobby_id, &lobby.lobby_code);

        let occupants: Vec<LobbyPlayerInfo> =
            lobby.players().iter().map(LobbyPlayerInfo::from).collect();
        let was_public = lobby.visibility == Visibility::Public;
        tracing::info!(lobby_id = %lobby_id, from = ?prev_state, reason, "Lobby closed");
        drop(lobby);

        self.notifier
            .notify(LobbyEvent::LobbyClosed {
                lobby_id: lobby_id.to_uuid(),
                reason: reason.to_string(),
                occupants,
            })
            .await;
        if was_public {
            self.notifier.notify(LobbyEvent::LobbyListChanged).await;
        }
    }

    fn log_transition(&self, lobby_id: LobbyId, from: LobbyState, to: LobbyState) {
        if from != to {
            tracing::info!(lobby_id = %lobby_id, from = ?from, to = ?to, "Lobby state changed");
        }
    }

    /// Allocate a join code that is unique among open lobbies.
    fn generate_lobby_code(&self) -> LobbyCode {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        self.generate_lobby_code_with(|bound| rng.gen_range(0..bound))
    }

    /// Code allocation with injectable randomness.
    ///
    /// Retries a bounded number of times on collision against open codes,
    /// then appends a clock-derived suffix so the loop always terminates.
    fn generate_lobby_code_with(&self, mut pick: impl FnMut(usize) -> usize) -> LobbyCode {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let candidate =
                LobbyCode::random(self.config.code_length, &self.config.code_alphabet, &mut pick);
            if !self.store.code_in_use(&candidate) {
                return candidate;
            }
        }
        LobbyCode::random_with_time_suffix(
            self.config.code_length,
            &self.config.code_alphabet,
            pick,
            self.clock.now(),
        )
    }
}
