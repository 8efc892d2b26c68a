//! In-memory test doubles for the backing-store and provider seams. Kept in
//! the library (not behind cfg(test)) so host applications can drive their own
//! handler tests with them.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use parking_lot::Mutex;

use crate::client_state::{ClientStateEvent, ClientStateStore, StateSnapshot};
use crate::error::{AuthError, AuthResult};
use crate::oauth2::{Exchanger, ExternalDetails, OAuth2Provider, Token, UserDetails};
use crate::tprintln;

/// One recorded flush.
#[derive(Debug, Clone)]
pub struct WriteCall {
    pub snapshot: Option<StateSnapshot>,
    pub events: Vec<ClientStateEvent>,
}

#[derive(Default)]
struct MockStateInner {
    values: std::collections::HashMap<String, String>,
    writes: Vec<WriteCall>,
    fail_read: Option<String>,
    fail_write: Option<String>,
}

/// Recording client-state store. Reads serve the seeded values (no values
/// means no snapshot); writes are recorded and then applied to the value map
/// the way a real store would interpret the event log.
#[derive(Clone, Default)]
pub struct MockStateStore {
    inner: Arc<Mutex<MockStateInner>>,
}

impl MockStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed<K: Into<String>, V: Into<String>>(&self, key: K, value: V) {
        self.inner.lock().values.insert(key.into(), value.into());
    }

    pub fn fail_reads<S: Into<String>>(&self, message: S) {
        self.inner.lock().fail_read = Some(message.into());
    }

    pub fn fail_writes<S: Into<String>>(&self, message: S) {
        self.inner.lock().fail_write = Some(message.into());
    }

    /// Current value map, after any applied flushes.
    pub fn values(&self) -> std::collections::HashMap<String, String> {
        self.inner.lock().values.clone()
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.inner.lock().values.get(key).cloned()
    }

    pub fn write_calls(&self) -> Vec<WriteCall> {
        self.inner.lock().writes.clone()
    }
}

impl ClientStateStore for MockStateStore {
    fn read_state(&self, _headers: &HeaderMap) -> AuthResult<Option<StateSnapshot>> {
        let inner = self.inner.lock();
        if let Some(msg) = &inner.fail_read {
            return Err(AuthError::read(msg.clone()));
        }
        if inner.values.is_empty() {
            return Ok(None);
        }
        Ok(Some(inner.values.iter().map(|(k, v)| (k.clone(), v.clone())).collect()))
    }

    fn write_state(
        &self,
        _headers: &mut HeaderMap,
        snapshot: Option<&StateSnapshot>,
        events: &[ClientStateEvent],
    ) -> AuthResult<()> {
        let mut inner = self.inner.lock();
        if let Some(msg) = &inner.fail_write {
            return Err(AuthError::write(msg.clone()));
        }
        tprintln!("mock.write_state events={}", events.len());
        inner.writes.push(WriteCall { snapshot: snapshot.cloned(), events: events.to_vec() });
        for event in events {
            match event {
                ClientStateEvent::Put { key, value } => {
                    inner.values.insert(key.clone(), value.clone());
                }
                ClientStateEvent::Delete { key } => {
                    inner.values.remove(key);
                }
                ClientStateEvent::DeleteAllExcept { keep } => {
                    inner.values.retain(|k, _| keep.iter().any(|kept| kept == k));
                }
            }
        }
        Ok(())
    }
}

/// Canned token exchange; counts invocations so tests can assert the exchange
/// never ran on provider-error callbacks.
#[derive(Clone, Default)]
pub struct MockExchanger {
    calls: Arc<Mutex<u32>>,
}

impl MockExchanger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl Exchanger for MockExchanger {
    async fn exchange(
        &self,
        _provider: &OAuth2Provider,
        _redirect_uri: &str,
        _code: &str,
    ) -> AuthResult<Token> {
        *self.calls.lock() += 1;
        Ok(Token {
            access_token: "token".into(),
            token_type: Some("Bearer".into()),
            refresh_token: Some("refresh".into()),
            expires_in: Some(86400),
        })
    }
}

/// Fixed external identity.
pub struct MockUserDetails {
    pub uid: String,
}

impl MockUserDetails {
    pub fn new<S: Into<String>>(uid: S) -> Self {
        Self { uid: uid.into() }
    }
}

#[async_trait]
impl UserDetails for MockUserDetails {
    async fn find_user_details(&self, _token: &Token) -> AuthResult<ExternalDetails> {
        Ok(ExternalDetails { uid: self.uid.clone(), email: None, name: None })
    }
}
