//! External-login handshake against OAuth2 identity providers, built entirely
//! on the client-state event log: the CSRF nonce and the original request
//! parameters ride the session across the redirect round trip.
//! Keep the public surface thin and split implementation across sub-modules.

mod flow;
mod provider;
mod routes;

pub use flow::{end, start, OAUTH2_PID_SEPARATOR};
pub use provider::{
    Exchanger, ExternalDetails, FacebookUserDetails, GoogleUserDetails, HttpExchanger,
    OAuth2Provider, Token, UserDetails,
};
pub use routes::{mount, router};
