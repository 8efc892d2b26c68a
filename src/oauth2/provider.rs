//! Provider registry entries and the two network seams of the handshake:
//! exchanging the callback code for a token, and resolving the token to a
//! stable external user id. Both seams are traits so tests (and deployments
//! with unusual providers) can swap the HTTP plumbing out.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::error::{AuthError, AuthResult};

static HTTP: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

/// One registered external identity provider.
#[derive(Clone)]
pub struct OAuth2Provider {
    pub client_id: String,
    pub client_secret: String,
    /// Authorization endpoint the user is redirected to.
    pub auth_url: String,
    /// Token endpoint the callback code is exchanged at.
    pub token_url: String,
    pub scopes: Vec<String>,
    /// Extra query parameters appended to the authorization URL, in order.
    pub additional_params: Vec<(String, String)>,
    pub user_details: Arc<dyn UserDetails>,
}

impl OAuth2Provider {
    /// Google with the standard profile/email scopes.
    pub fn google<S: Into<String>>(client_id: S, client_secret: S) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url: "https://accounts.google.com/o/oauth2/auth".into(),
            token_url: "https://oauth2.googleapis.com/token".into(),
            scopes: vec!["profile".into(), "email".into()],
            additional_params: Vec::new(),
            user_details: Arc::new(GoogleUserDetails),
        }
    }

    /// Facebook with the e-mail scope.
    pub fn facebook<S: Into<String>>(client_id: S, client_secret: S) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url: "https://www.facebook.com/v3.2/dialog/oauth".into(),
            token_url: "https://graph.facebook.com/v3.2/oauth/access_token".into(),
            scopes: vec!["email".into()],
            additional_params: Vec::new(),
            user_details: Arc::new(FacebookUserDetails),
        }
    }
}

/// Access token returned by a provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Stable identity a provider reports for the token's owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalDetails {
    /// Provider-scoped user id; the only required piece.
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[async_trait]
pub trait Exchanger: Send + Sync {
    async fn exchange(
        &self,
        provider: &OAuth2Provider,
        redirect_uri: &str,
        code: &str,
    ) -> AuthResult<Token>;
}

/// Real authorization-code exchange over HTTPS.
#[derive(Clone, Copy, Default)]
pub struct HttpExchanger;

#[async_trait]
impl Exchanger for HttpExchanger {
    async fn exchange(
        &self,
        provider: &OAuth2Provider,
        redirect_uri: &str,
        code: &str,
    ) -> AuthResult<Token> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", provider.client_id.as_str()),
            ("client_secret", provider.client_secret.as_str()),
        ];
        let res = HTTP.post(&provider.token_url).form(&form).send().await?;
        if !res.status().is_success() {
            return Err(AuthError::exchange(format!(
                "token endpoint returned {}",
                res.status()
            )));
        }
        Ok(res.json::<Token>().await?)
    }
}

#[async_trait]
pub trait UserDetails: Send + Sync {
    /// Resolve the token to the external user's id (and whatever profile
    /// details the provider hands out).
    async fn find_user_details(&self, token: &Token) -> AuthResult<ExternalDetails>;
}

#[derive(Debug, Deserialize)]
struct GoogleMe {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

pub struct GoogleUserDetails;

#[async_trait]
impl UserDetails for GoogleUserDetails {
    async fn find_user_details(&self, token: &Token) -> AuthResult<ExternalDetails> {
        let me = HTTP
            .get("https://www.googleapis.com/userinfo/v2/me")
            .bearer_auth(&token.access_token)
            .send()
            .await?
            .error_for_status()?
            .json::<GoogleMe>()
            .await?;
        Ok(ExternalDetails { uid: me.id, email: me.email, name: me.name })
    }
}

#[derive(Debug, Deserialize)]
struct FacebookMe {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

pub struct FacebookUserDetails;

#[async_trait]
impl UserDetails for FacebookUserDetails {
    async fn find_user_details(&self, token: &Token) -> AuthResult<ExternalDetails> {
        let me = HTTP
            .get("https://graph.facebook.com/me?fields=name,email")
            .bearer_auth(&token.access_token)
            .send()
            .await?
            .error_for_status()?
            .json::<FacebookMe>()
            .await?;
        Ok(ExternalDetails { uid: me.id, email: me.email, name: me.name })
    }
}
