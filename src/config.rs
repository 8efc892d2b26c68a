//! Startup configuration shared by the middleware and the OAuth2 flow.
//!
//! All well-known state keys live in one explicit `StateKeys` table handed to
//! the config, rather than as scattered module-level constants; deployments
//! that need different key names swap the table in one place.

use std::collections::HashMap;
use std::sync::Arc;

use crate::client_state::ClientStateStore;
use crate::events::Events;
use crate::oauth2::{Exchanger, HttpExchanger, OAuth2Provider};

/// Names of the session and cookie entries this crate reads and writes.
/// Defaults match the wire-compatible names used by existing deployments.
#[derive(Debug, Clone)]
pub struct StateKeys {
    /// Primary identity of the logged-in user.
    pub primary_identity: String,
    /// Present while a session was established by the remember module only.
    pub half_auth: String,
    /// Timestamp of the user's last action.
    pub last_action: String,
    /// Set when the user authenticated with a second factor.
    pub two_factor: String,
    /// Random token verified over e-mail during two-factor setup.
    pub two_factor_email_token: String,
    /// Set to "true" once the e-mail token was verified.
    pub two_factor_verified: String,
    /// CSRF nonce correlating an OAuth2 redirect with its callback.
    pub oauth2_state: String,
    /// Original request parameters carried across the OAuth2 round trip.
    pub oauth2_params: String,
    pub flash_success: String,
    pub flash_error: String,
    /// Remember-token cookie name.
    pub cookie_remember: String,
}

impl Default for StateKeys {
    fn default() -> Self {
        Self {
            primary_identity: "uid".into(),
            half_auth: "halfauth".into(),
            last_action: "last_action".into(),
            two_factor: "twofactor".into(),
            two_factor_email_token: "twofactor_auth_token".into(),
            two_factor_verified: "twofactor_authed".into(),
            oauth2_state: "oauth2_state".into(),
            oauth2_params: "oauth2_params".into(),
            flash_success: "flash_success".into(),
            flash_error: "flash_error".into(),
            cookie_remember: "rm".into(),
        }
    }
}

/// Backing stores for the two client-state kinds. A `None` store means that
/// kind is unused in this deployment; its events are never flushed anywhere.
#[derive(Clone, Default)]
pub struct Storage {
    pub session: Option<Arc<dyn ClientStateStore>>,
    pub cookie: Option<Arc<dyn ClientStateStore>>,
}

/// Shared configuration injected into the middleware and all flow handlers.
#[derive(Clone)]
pub struct AuthConfig {
    /// External root URL of the deployment, e.g. "https://www.example.com".
    /// Used to build the OAuth2 callback URL.
    pub root_url: String,
    /// Path prefix the auth routes are mounted under, e.g. "/auth".
    pub mount_path: String,
    /// Where to send the user after a completed external login.
    pub oauth2_login_ok_path: String,
    /// Where to send the user when the provider reported a failure.
    pub oauth2_login_not_ok_path: String,

    pub keys: StateKeys,
    pub storage: Storage,
    /// Registered identity providers by route name ("google", "facebook", ...).
    pub providers: HashMap<String, OAuth2Provider>,
    pub events: Events,
    /// Token exchange seam; swapped for a canned exchanger in tests.
    pub exchanger: Arc<dyn Exchanger>,
}

impl AuthConfig {
    pub fn new<S: Into<String>>(root_url: S, mount_path: S) -> Self {
        let mount_path = mount_path.into();
        Self {
            root_url: root_url.into(),
            oauth2_login_ok_path: format!("{}/oauth2/ok", mount_path),
            oauth2_login_not_ok_path: format!("{}/oauth2/not/ok", mount_path),
            mount_path,
            keys: StateKeys::default(),
            storage: Storage::default(),
            providers: HashMap::new(),
            events: Events::default(),
            exchanger: Arc::new(HttpExchanger::default()),
        }
    }

    pub fn provider(&self, name: &str) -> Option<&OAuth2Provider> {
        self.providers.get(name)
    }

    /// Absolute redirect URI the provider sends the user back to.
    pub fn oauth2_callback_url(&self, provider: &str) -> String {
        format!("{}{}/oauth2/callback/{}", self.root_url, self.mount_path, provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_url_embeds_provider_name() {
        let cfg = AuthConfig::new("https://www.example.com", "/auth");
        assert_eq!(
            cfg.oauth2_callback_url("google"),
            "https://www.example.com/auth/oauth2/callback/google"
        );
    }

    #[test]
    fn default_paths_hang_off_the_mount() {
        let cfg = AuthConfig::new("https://x", "/auth");
        assert_eq!(cfg.oauth2_login_ok_path, "/auth/oauth2/ok");
        assert_eq!(cfg.oauth2_login_not_ok_path, "/auth/oauth2/not/ok");
    }
}
