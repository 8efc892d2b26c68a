//! Hook chains fired around auth lifecycle events.
//!
//! Host applications register callbacks to run before or after an event. A
//! callback may report the event as handled, which suppresses this crate's
//! automatic redirect; later callbacks in the chain still run and are told
//! whether an earlier one already handled the event.

use std::collections::HashMap;
use std::sync::Arc;

use crate::client_state::ClientState;
use crate::error::AuthResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthEvent {
    /// An external login completed successfully.
    OAuth2,
    /// The external provider reported a failure in its callback.
    OAuth2Fail,
}

/// What a hook gets to look at and mutate.
pub struct HookContext<'a> {
    /// Per-request client state; hooks may stage their own events.
    pub state: &'a mut ClientState,
    /// Route name of the provider involved, e.g. "google".
    pub provider: &'a str,
    /// Query parameters of the request that triggered the event.
    pub query: &'a HashMap<String, String>,
}

/// A hook receives the context and whether an earlier hook in the chain
/// already handled the event; it returns whether it handled it itself.
pub type Hook = Arc<dyn Fn(&mut HookContext<'_>, bool) -> AuthResult<bool> + Send + Sync>;

/// Wrap a closure as a [`Hook`].
pub fn hook<F>(f: F) -> Hook
where
    F: Fn(&mut HookContext<'_>, bool) -> AuthResult<bool> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Clone, Default)]
pub struct Events {
    before: HashMap<AuthEvent, Vec<Hook>>,
    after: HashMap<AuthEvent, Vec<Hook>>,
}

impl Events {
    pub fn before(&mut self, event: AuthEvent, hook: Hook) {
        self.before.entry(event).or_default().push(hook);
    }

    pub fn after(&mut self, event: AuthEvent, hook: Hook) {
        self.after.entry(event).or_default().push(hook);
    }

    pub fn fire_before(&self, event: AuthEvent, ctx: &mut HookContext<'_>) -> AuthResult<bool> {
        Self::fire(self.before.get(&event), ctx)
    }

    pub fn fire_after(&self, event: AuthEvent, ctx: &mut HookContext<'_>) -> AuthResult<bool> {
        Self::fire(self.after.get(&event), ctx)
    }

    fn fire(hooks: Option<&Vec<Hook>>, ctx: &mut HookContext<'_>) -> AuthResult<bool> {
        let mut handled = false;
        if let Some(hooks) = hooks {
            for hook in hooks {
                if (**hook)(ctx, handled)? {
                    handled = true;
                }
            }
        }
        Ok(handled)
    }
}
