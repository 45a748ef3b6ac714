//! Lobby registry and per-lobby locking
//!
//! Holds every open lobby behind its own `RwLock`: taking the write guard
//! *is* the per-lobby critical section, so all mutating operations on one
//! lobby are totally ordered while distinct lobbies proceed concurrently.
//! Alongside the registry live the open-code index, the user -> lobbies
//! reverse index, and the cancellable empty-grace timer handles.
//!
//! The store is a plain object with no process-wide state; tests construct
//! as many independent instances as they need.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use duelgate_domain::{Lobby, LobbyCode, LobbyId};

/// Shared handle to one lobby's state and its lock.
pub type LobbySlot = Arc<RwLock<Lobby>>;

/// In-memory registry of open lobbies and their secondary indexes.
pub struct LobbyStore {
    /// lobby_id -> lobby, each behind its own lock
    lobbies: DashMap<LobbyId, LobbySlot>,
    /// open join codes -> lobby_id
    codes: DashMap<LobbyCode, LobbyId>,
    /// user_id -> lobbies the user currently occupies
    user_lobbies: DashMap<String, HashSet<LobbyId>>,
    /// pending empty-grace eviction tasks, abortable on join/close
    grace_timers: DashMap<LobbyId, JoinHandle<()>>,
}

impl LobbyStore {
    pub fn new() -> Self {
        Self {
            lobbies: DashMap::new(),
            codes: DashMap::new(),
            user_lobbies: DashMap::new(),
            grace_timers: DashMap::new(),
        }
    }

    /// Register a freshly created lobby and its join code.
    pub fn insert(&self, lobby: Lobby) {
        self.codes.insert(lobby.lobby_code.clone(), lobby.lobby_id);
        self.lobbies
            .insert(lobby.lobby_id, Arc::new(RwLock::new(lobby)));
    }

    /// Fetch the slot for a lobby.
    ///
    /// Clones the `Arc` out of the map so the shard guard is released
    /// before the caller awaits the lock (holding a DashMap guard across
    /// an `.await` can deadlock the shard).
    pub fn slot(&self, lobby_id: LobbyId) -> Option<LobbySlot> {
        self.lobbies.get(&lobby_id).map(|entry| Arc::clone(&entry))
    }

    /// All current slots, collected up front for the same reason as
    /// [`slot`](Self::slot).
    pub fn slots(&self) -> Vec<(LobbyId, LobbySlot)> {
        self.lobbies
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect()
    }

    pub fn resolve_code(&self, code: &LobbyCode) -> Option<LobbyId> {
        self.codes.get(code).map(|entry| *entry)
    }

    pub fn code_in_use(&self, code: &LobbyCode) -> bool {
        self.codes.contains_key(code)
    }

    pub fn lobby_count(&self) -> usize {
        self.lobbies.len()
    }

    /// Record that a user occupies a lobby.
    pub fn link_user(&self, user_id: &str, lobby_id: LobbyId) {
        self.user_lobbies
            .entry(user_id.to_string())
            .or_default()
            .insert(lobby_id);
    }

    /// Drop a user's membership record, pruning empty entries.
    pub fn unlink_user(&self, user_id: &str, lobby_id: LobbyId) {
        if let Some(mut entry) = self.user_lobbies.get_mut(user_id) {
            entry.remove(&lobby_id);
            if entry.is_empty() {
                drop(entry);
                self.user_lobbies.remove(user_id);
            }
        }
    }

    pub fn user_lobby_ids(&self, user_id: &str) -> Vec<LobbyId> {
        self.user_lobbies
            .get(user_id)
            .map(|entry| entry.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Install the empty-grace eviction task, replacing (and aborting) any
    /// previous one for the same lobby.
    pub fn set_grace_timer(&self, lobby_id: LobbyId, handle: JoinHandle<()>) {
        if let Some((_, previous)) = self.grace_timers.remove(&lobby_id) {
            previous.abort();
        }
        self.grace_timers.insert(lobby_id, handle);
    }

    /// Abort the pending eviction task, if any.
    pub fn cancel_grace_timer(&self, lobby_id: LobbyId) {
        if let Some((_, handle)) = self.grace_timers.remove(&lobby_id) {
            handle.abort();
        }
    }

    /// Remove a lobby from the primary map and the code index.
    ///
    /// Reverse-index entries are removed per member by the caller, which
    /// still holds the lobby's write guard and therefore its member list.
    /// The grace-timer entry is dropped *without* aborting: when the timer
    /// task is the one tearing the lobby down, it must not abort itself
    /// mid-close. Callers closing from outside the timer cancel explicitly
    /// first.
    pub fn remove(&self, lobby_id: LobbyId, code: &LobbyCode) {
        self.grace_timers.remove(&lobby_id);
        self.codes.remove(code);
        self.lobbies.remove(&lobby_id);
    }
}

impl Default for LobbyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use duelgate_domain::{CreateLobby, Visibility};

    fn test_lobby(code: &str) -> Lobby {
        Lobby::new(
            LobbyId::new(),
            LobbyCode::new(code),
            CreateLobby {
                name: "Store Lobby".to_string(),
                visibility: Visibility::Public,
                max_players: 4,
                created_by: "host".to_string(),
                game_settings: serde_json::Value::Null,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_insert_registers_code_index() {
        let store = LobbyStore::new();
        let lobby = test_lobby("ABC234");
        let lobby_id = lobby.lobby_id;
        store.insert(lobby);

        assert_eq!(store.resolve_code(&LobbyCode::new("ABC234")), Some(lobby_id));
        assert!(store.code_in_use(&LobbyCode::new("abc234")), "codes match case-insensitively");
        assert!(store.slot(lobby_id).is_some());
    }

    #[tokio::test]
    async fn test_remove_clears_registry_and_code() {
        let store = LobbyStore::new();
        let lobby = test_lobby("ABC234");
        let lobby_id = lobby.lobby_id;
        let code = lobby.lobby_code.clone();
        store.insert(lobby);

        store.remove(lobby_id, &code);
        assert!(store.slot(lobby_id).is_none());
        assert!(!store.code_in_use(&code));
        assert_eq!(store.lobby_count(), 0);
    }

    #[tokio::test]
    async fn test_user_index_prunes_empty_entries() {
        let store = LobbyStore::new();
        let a = LobbyId::new();
        let b = LobbyId::new();

        store.link_user("u1", a);
        store.link_user("u1", b);
        assert_eq!(store.user_lobby_ids("u1").len(), 2);

        store.unlink_user("u1", a);
        assert_eq!(store.user_lobby_ids("u1"), vec![b]);

        store.unlink_user("u1", b);
        assert!(store.user_lobby_ids("u1").is_empty());
    }

    #[tokio::test]
    async fn test_replacing_grace_timer_aborts_previous() {
        let store = LobbyStore::new();
        let lobby_id = LobbyId::new();

        let first = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });
        store.set_grace_timer(lobby_id, first);

        let second = tokio::spawn(async {});
        store.set_grace_timer(lobby_id, second);

        store.cancel_grace_timer(lobby_id);
        // Cancelling again is a no-op.
        store.cancel_grace_timer(lobby_id);
    }
}
