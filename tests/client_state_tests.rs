//! Event-log and commit-gate integration tests: exactly-once flush, in-order
//! delivery, store-side interpretation of the wipe event, and failure
//! surfacing.

use std::sync::Arc;

use anyhow::Result;
use axum::http::HeaderMap;
use parking_lot::Mutex;

use vestibule::client_state::{
    ClientState, ClientStateEvent, ClientStateStore, StateSnapshot, StoreKind,
};
use vestibule::config::{StateKeys, Storage};
use vestibule::error::{AuthError, AuthResult};
use vestibule::mock::MockStateStore;

fn session_storage(store: &MockStateStore) -> Storage {
    Storage { session: Some(Arc::new(store.clone())), cookie: None }
}

fn load(storage: &Storage) -> ClientState {
    ClientState::load(storage, StateKeys::default(), &HeaderMap::new()).expect("load")
}

#[test]
fn all_events_flush_once_in_issuance_order() -> Result<()> {
    let store = MockStateStore::new();
    let storage = session_storage(&store);
    let mut state = load(&storage);

    state.put_session("uid", "george");
    state.put_session("last_action", "now");
    state.del_session("halfauth");
    state.del_all_session(&["uid"]);

    let mut headers = HeaderMap::new();
    state.commit(&mut headers)?;

    let calls = store.write_calls();
    assert_eq!(calls.len(), 1, "exactly one flush");
    assert_eq!(
        calls[0].events,
        vec![
            ClientStateEvent::put("uid", "george"),
            ClientStateEvent::put("last_action", "now"),
            ClientStateEvent::delete("halfauth"),
            ClientStateEvent::delete_all_except(["uid"]),
        ]
    );
    Ok(())
}

#[test]
fn zero_events_means_no_write_at_all() -> Result<()> {
    let store = MockStateStore::new();
    let storage = session_storage(&store);
    let mut state = load(&storage);

    let mut headers = HeaderMap::new();
    state.commit(&mut headers)?;

    assert!(store.write_calls().is_empty());
    assert!(state.committed());
    Ok(())
}

#[test]
#[should_panic(expected = "committed twice")]
fn second_commit_panics_instead_of_duplicating_writes() {
    let store = MockStateStore::new();
    let storage = session_storage(&store);
    let mut state = load(&storage);
    state.put_session("uid", "george");

    let mut headers = HeaderMap::new();
    state.commit(&mut headers).expect("first commit");
    let _ = state.commit(&mut headers);
}

#[test]
fn delete_all_except_is_interpreted_by_the_store() -> Result<()> {
    let store = MockStateStore::new();
    store.seed("a", "1");
    store.seed("b", "2");
    store.seed("c", "3");
    let storage = session_storage(&store);
    let mut state = load(&storage);

    state.del_all_session(&["a"]);
    let mut headers = HeaderMap::new();
    state.commit(&mut headers)?;

    let calls = store.write_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].events, vec![ClientStateEvent::delete_all_except(["a"])]);

    // The log carried the keep-list; the store did the deleting.
    let values = store.values();
    assert_eq!(values.len(), 1);
    assert_eq!(values.get("a").map(String::as_str), Some("1"));
    Ok(())
}

#[test]
fn snapshot_is_not_mutated_by_staged_events() -> Result<()> {
    let store = MockStateStore::new();
    store.seed("uid", "old");
    let storage = session_storage(&store);
    let mut state = load(&storage);

    state.put_session("uid", "new");
    assert_eq!(state.get_session("uid"), Some("old"), "snapshot stays as of request start");

    let mut headers = HeaderMap::new();
    state.commit(&mut headers)?;
    assert_eq!(store.value("uid").as_deref(), Some("new"), "store sees the event after flush");
    Ok(())
}

#[test]
fn read_failure_aborts_load() {
    let store = MockStateStore::new();
    store.fail_reads("corrupt session cookie");
    let storage = session_storage(&store);

    let err = ClientState::load(&storage, StateKeys::default(), &HeaderMap::new())
        .expect_err("load should fail");
    assert!(matches!(err, AuthError::Read { .. }), "got {:?}", err);
}

#[test]
fn write_failure_surfaces_and_is_not_retried() {
    let store = MockStateStore::new();
    store.fail_writes("store down");
    let storage = session_storage(&store);
    let mut state = load(&storage);
    state.put_session("uid", "george");

    let mut headers = HeaderMap::new();
    let err = state.commit(&mut headers).expect_err("commit should fail");
    assert!(matches!(err, AuthError::Write { .. }), "got {:?}", err);
    assert!(state.committed(), "the gate closes even when the flush fails");
}

/// Store wrapper that records which kind flushed, to pin the session-first
/// policy down across both stores.
struct FlushRecorder {
    label: &'static str,
    order: Arc<Mutex<Vec<&'static str>>>,
}

impl ClientStateStore for FlushRecorder {
    fn read_state(&self, _headers: &HeaderMap) -> AuthResult<Option<StateSnapshot>> {
        Ok(None)
    }

    fn write_state(
        &self,
        _headers: &mut HeaderMap,
        _snapshot: Option<&StateSnapshot>,
        _events: &[ClientStateEvent],
    ) -> AuthResult<()> {
        self.order.lock().push(self.label);
        Ok(())
    }
}

#[test]
fn session_flushes_before_cookie() -> Result<()> {
    let order = Arc::new(Mutex::new(Vec::new()));
    let storage = Storage {
        session: Some(Arc::new(FlushRecorder { label: "session", order: order.clone() })),
        cookie: Some(Arc::new(FlushRecorder { label: "cookie", order: order.clone() })),
    };
    let mut state = load(&storage);

    // Stage cookie first to prove flush order is policy, not call order.
    state.put_cookie("rm", "token");
    state.put_session("uid", "george");

    let mut headers = HeaderMap::new();
    state.commit(&mut headers)?;

    assert_eq!(*order.lock(), vec!["session", "cookie"]);
    Ok(())
}

#[test]
fn cookie_events_reach_the_cookie_store() -> Result<()> {
    let session = MockStateStore::new();
    let cookie = MockStateStore::new();
    let storage = Storage {
        session: Some(Arc::new(session.clone())),
        cookie: Some(Arc::new(cookie.clone())),
    };
    let mut state = load(&storage);

    state.put_cookie("rm", "remember-token");
    state.del_known_cookie();

    let mut headers = HeaderMap::new();
    state.commit(&mut headers)?;

    assert!(session.write_calls().is_empty());
    let calls = cookie.write_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].events,
        vec![
            ClientStateEvent::put("rm", "remember-token"),
            ClientStateEvent::delete("rm"),
        ]
    );
    assert_eq!(state.events(StoreKind::Cookie).len(), 2);
    Ok(())
}
