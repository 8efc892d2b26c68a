//!
//! Per-request client state
//! ------------------------
//! One `ClientState` is constructed per request. It holds the immutable
//! snapshots read from the session and cookie backing stores, the ordered
//! event logs staged by handler code, and the commit gate that guarantees the
//! logs are flushed exactly once, before the response leaves the middleware.
//!
//! Key responsibilities:
//! - Snapshot loading at request entry (absence is not an error).
//! - Append-only event staging per store kind, in call order.
//! - A single explicit `commit` phase: session store first, then cookie store,
//!   each called only when its log is non-empty.
//! - Convenience helpers over the well-known keys (identity, half-auth,
//!   two-factor flags, flash messages).

use std::sync::Arc;

use axum::http::HeaderMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::client_state::{ClientStateEvent, ClientStateStore, StateSnapshot, StoreKind};
use crate::config::{StateKeys, Storage};
use crate::error::AuthResult;

/// Handle passed through request extensions so handlers and the finalize
/// phase share one `ClientState` without any runtime type probing.
pub type SharedClientState = Arc<Mutex<ClientState>>;

pub struct ClientState {
    keys: StateKeys,

    session_store: Option<Arc<dyn ClientStateStore>>,
    cookie_store: Option<Arc<dyn ClientStateStore>>,

    session_snapshot: Option<StateSnapshot>,
    cookie_snapshot: Option<StateSnapshot>,

    session_events: Vec<ClientStateEvent>,
    cookie_events: Vec<ClientStateEvent>,

    committed: bool,
}

impl std::fmt::Debug for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientState")
            .field("keys", &self.keys)
            .field("session_store", &self.session_store.as_ref().map(|_| "dyn ClientStateStore"))
            .field("cookie_store", &self.cookie_store.as_ref().map(|_| "dyn ClientStateStore"))
            .field("session_snapshot", &self.session_snapshot)
            .field("cookie_snapshot", &self.cookie_snapshot)
            .field("session_events", &self.session_events)
            .field("cookie_events", &self.cookie_events)
            .field("committed", &self.committed)
            .finish()
    }
}

impl ClientState {
    /// Read both snapshots from the configured backing stores and build the
    /// per-request state. A store that is not configured, or that has no data
    /// for this request, simply yields no snapshot; a parse failure aborts.
    pub fn load(storage: &Storage, keys: StateKeys, headers: &HeaderMap) -> AuthResult<Self> {
        let session_snapshot = match &storage.session {
            Some(store) => store.read_state(headers)?,
            None => None,
        };
        let cookie_snapshot = match &storage.cookie {
            Some(store) => store.read_state(headers)?,
            None => None,
        };

        Ok(Self {
            keys,
            session_store: storage.session.clone(),
            cookie_store: storage.cookie.clone(),
            session_snapshot,
            cookie_snapshot,
            session_events: Vec::new(),
            cookie_events: Vec::new(),
            committed: false,
        })
    }

    pub fn into_shared(self) -> SharedClientState {
        Arc::new(Mutex::new(self))
    }

    pub fn keys(&self) -> &StateKeys {
        &self.keys
    }

    pub fn snapshot(&self, kind: StoreKind) -> Option<&StateSnapshot> {
        match kind {
            StoreKind::Session => self.session_snapshot.as_ref(),
            StoreKind::Cookie => self.cookie_snapshot.as_ref(),
        }
    }

    /// Staged events for one store kind, in the order they were appended.
    pub fn events(&self, kind: StoreKind) -> &[ClientStateEvent] {
        match kind {
            StoreKind::Session => &self.session_events,
            StoreKind::Cookie => &self.cookie_events,
        }
    }

    pub fn committed(&self) -> bool {
        self.committed
    }

    pub fn get(&self, kind: StoreKind, key: &str) -> Option<&str> {
        self.snapshot(kind).and_then(|s| s.get(key))
    }

    fn append(&mut self, kind: StoreKind, event: ClientStateEvent) {
        // Mutating after the flush ran would be silently lost; refuse loudly.
        assert!(
            !self.committed,
            "client state mutated after commit ({} {:?})",
            kind.as_str(),
            event
        );
        match kind {
            StoreKind::Session => self.session_events.push(event),
            StoreKind::Cookie => self.cookie_events.push(event),
        }
    }

    pub fn put(&mut self, kind: StoreKind, key: &str, value: &str) {
        self.append(kind, ClientStateEvent::put(key, value));
    }

    pub fn delete(&mut self, kind: StoreKind, key: &str) {
        self.append(kind, ClientStateEvent::delete(key));
    }

    /// Stage a single whole-store wipe that preserves only `keep`, in order.
    /// The store's writer decides at flush time what "every other key" means;
    /// no deletion happens here.
    pub fn delete_all_except(&mut self, kind: StoreKind, keep: &[&str]) {
        self.append(kind, ClientStateEvent::delete_all_except(keep.iter().copied()));
    }

    /// Flush the staged events to the backing stores. This is the single
    /// commit point: session store first, then cookie store, each invoked only
    /// when it has events. The gate flips before the writers run, so a failed
    /// write is surfaced once and never retried.
    ///
    /// Panics when called twice; a second flush would duplicate store writes.
    pub fn commit(&mut self, headers: &mut HeaderMap) -> AuthResult<()> {
        assert!(!self.committed, "client state committed twice for one response");
        self.committed = true;

        if self.session_events.is_empty() && self.cookie_events.is_empty() {
            return Ok(());
        }

        debug!(
            session_events = self.session_events.len(),
            cookie_events = self.cookie_events.len(),
            "client_state.commit"
        );

        if let Some(store) = &self.session_store {
            if !self.session_events.is_empty() {
                store.write_state(headers, self.session_snapshot.as_ref(), &self.session_events)?;
            }
        }
        if let Some(store) = &self.cookie_store {
            if !self.cookie_events.is_empty() {
                store.write_state(headers, self.cookie_snapshot.as_ref(), &self.cookie_events)?;
            }
        }

        Ok(())
    }

    // --- helpers over the well-known session keys ---

    pub fn get_session(&self, key: &str) -> Option<&str> {
        self.get(StoreKind::Session, key)
    }

    pub fn put_session(&mut self, key: &str, value: &str) {
        self.put(StoreKind::Session, key, value);
    }

    pub fn del_session(&mut self, key: &str) {
        self.delete(StoreKind::Session, key);
    }

    /// Wipe the whole session except the whitelisted keys. The usual way to
    /// clean up after logout or expiry.
    pub fn del_all_session(&mut self, keep: &[&str]) {
        self.delete_all_except(StoreKind::Session, keep);
    }

    /// Delete the session keys this crate itself writes, effectively logging
    /// the user out. See `del_all_session` for the stronger alternative.
    pub fn del_known_session(&mut self) {
        let primary = self.keys.primary_identity.clone();
        let half = self.keys.half_auth.clone();
        let last = self.keys.last_action.clone();
        self.del_session(&primary);
        self.del_session(&half);
        self.del_session(&last);
    }

    pub fn get_cookie(&self, key: &str) -> Option<&str> {
        self.get(StoreKind::Cookie, key)
    }

    pub fn put_cookie(&mut self, key: &str, value: &str) {
        self.put(StoreKind::Cookie, key, value);
    }

    pub fn del_cookie(&mut self, key: &str) {
        self.delete(StoreKind::Cookie, key);
    }

    /// Delete the remember-token cookie.
    pub fn del_known_cookie(&mut self) {
        let rm = self.keys.cookie_remember.clone();
        self.del_cookie(&rm);
    }

    /// False while a half-auth marker (set by remember-me logins) is present;
    /// used to deny half-authed users access to sensitive areas.
    pub fn is_fully_authed(&self) -> bool {
        self.get_session(&self.keys.half_auth).is_none()
    }

    pub fn is_two_factored(&self) -> bool {
        self.get_session(&self.keys.two_factor).is_some()
    }

    /// Read and clear the success flash message.
    pub fn flash_success(&mut self) -> Option<String> {
        let key = self.keys.flash_success.clone();
        let val = self.get_session(&key)?.to_string();
        self.del_session(&key);
        Some(val)
    }

    /// Read and clear the error flash message.
    pub fn flash_error(&mut self) -> Option<String> {
        let key = self.keys.flash_error.clone();
        let val = self.get_session(&key)?.to_string();
        self.del_session(&key);
        Some(val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockStateStore;

    fn storage_with(session: MockStateStore) -> Storage {
        Storage { session: Some(Arc::new(session)), cookie: None }
    }

    #[test]
    fn snapshot_absent_is_not_an_error() {
        let storage = storage_with(MockStateStore::new());
        let state =
            ClientState::load(&storage, StateKeys::default(), &HeaderMap::new()).unwrap();
        assert!(state.snapshot(StoreKind::Session).is_none());
    }

    #[test]
    fn flash_reads_once_and_stages_delete() {
        let store = MockStateStore::new();
        store.seed("flash_success", "saved!");
        let storage = storage_with(store);
        let mut state =
            ClientState::load(&storage, StateKeys::default(), &HeaderMap::new()).unwrap();

        assert_eq!(state.flash_success().as_deref(), Some("saved!"));
        assert_eq!(
            state.events(StoreKind::Session),
            &[ClientStateEvent::delete("flash_success")]
        );
        assert!(state.flash_error().is_none());
    }

    #[test]
    fn half_auth_and_two_factor_flags() {
        let store = MockStateStore::new();
        store.seed("halfauth", "true");
        let storage = storage_with(store);
        let state =
            ClientState::load(&storage, StateKeys::default(), &HeaderMap::new()).unwrap();
        assert!(!state.is_fully_authed());
        assert!(!state.is_two_factored());
    }

    #[test]
    #[should_panic(expected = "mutated after commit")]
    fn mutation_after_commit_panics() {
        let storage = storage_with(MockStateStore::new());
        let mut state =
            ClientState::load(&storage, StateKeys::default(), &HeaderMap::new()).unwrap();
        let mut headers = HeaderMap::new();
        state.commit(&mut headers).unwrap();
        state.put_session("uid", "someone");
    }
}
