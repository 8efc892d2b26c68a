/// The two client-side stores a request can stage mutations for.
///
/// Session data typically lives server-side behind an opaque cookie, remember
/// tokens live in a dedicated cookie; both are written through the same
/// event-log machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Session,
    Cookie,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Session => "session",
            StoreKind::Cookie => "cookie",
        }
    }
}

/// A single staged mutation. Events are recorded in call order during the
/// request and interpreted by the backing store's writer at flush time; the
/// log itself never touches the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientStateEvent {
    Put { key: String, value: String },
    Delete { key: String },
    /// Delete every key the store manages except the listed ones, in the
    /// order given. The keep-list is an explicit list, never a joined string.
    DeleteAllExcept { keep: Vec<String> },
}

impl ClientStateEvent {
    pub fn put<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        ClientStateEvent::Put { key: key.into(), value: value.into() }
    }

    pub fn delete<K: Into<String>>(key: K) -> Self {
        ClientStateEvent::Delete { key: key.into() }
    }

    pub fn delete_all_except<I, S>(keep: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ClientStateEvent::DeleteAllExcept { keep: keep.into_iter().map(Into::into).collect() }
    }
}
