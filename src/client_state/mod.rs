//! Request-scoped client-state propagation: immutable per-request snapshots of
//! the session and cookie stores, append-only mutation event logs, and a
//! commit gate that flushes each log to its backing store exactly once before
//! the response goes out.
//! Keep the public surface thin and split implementation across sub-modules.

mod event;
mod middleware;
mod snapshot;
mod state;

pub use event::{ClientStateEvent, StoreKind};
pub use middleware::load_client_state;
pub use snapshot::{ClientStateStore, StateSnapshot};
pub use state::{ClientState, SharedClientState};
