use std::collections::HashMap;

use axum::http::HeaderMap;

use crate::client_state::ClientStateEvent;
use crate::error::AuthResult;

/// Immutable view of a backing store's key/value data as of request start.
///
/// A snapshot is produced at most once per store kind per request and is never
/// updated in place; staged mutations only become visible to the next request
/// after the commit phase flushes them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    values: HashMap<String, String>,
}

impl StateSnapshot {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Pure lookup, no side effects.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StateSnapshot {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self { values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

/// Backing-store contract for one store kind (session or cookie).
///
/// Implementations read their data out of the request headers (cookies,
/// tokens) and apply staged events by emitting response headers or writing to
/// their server-side storage. Keep security flags (Secure, HttpOnly, SameSite)
/// in mind when emitting cookies.
pub trait ClientStateStore: Send + Sync {
    /// Load the store's current data for this request. `None` means no data
    /// was present, which is a valid outcome; an unparseable store is an
    /// error.
    fn read_state(&self, headers: &HeaderMap) -> AuthResult<Option<StateSnapshot>>;

    /// Apply the ordered events on top of the snapshot read earlier (if any)
    /// and emit whatever response headers the store needs. Called at most
    /// once per request, and only when at least one event was staged.
    fn write_state(
        &self,
        headers: &mut HeaderMap,
        snapshot: Option<&StateSnapshot>,
        events: &[ClientStateEvent],
    ) -> AuthResult<()>;
}
