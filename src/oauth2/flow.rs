//!
//! OAuth2 handshake
//! ----------------
//! Two-phase external login. `start` stages a CSRF nonce and the original
//! request parameters in the session event log and redirects to the provider;
//! `end` validates the callback against the stored nonce, exchanges the code
//! for a token, resolves the external identity, and stages the login. The
//! session event log is the only state carried across the redirect round trip.

use std::collections::{BTreeMap, HashMap};

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use tracing::{debug, info};

use crate::config::AuthConfig;
use crate::client_state::SharedClientState;
use crate::error::{AuthError, AuthResult};
use crate::events::{AuthEvent, HookContext};

/// Identity strings are composed as `oauth2;;<provider>;;<external_id>`.
pub const OAUTH2_PID_SEPARATOR: &str = ";;";

/// 256-bit random nonce, base64url without padding.
fn gen_nonce() -> AuthResult<String> {
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf)
        .map_err(|e| AuthError::internal(format!("nonce entropy unavailable: {}", e)))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// Minimal query-string parser; later duplicates win, keys without '=' map to
/// the empty string.
pub(crate) fn parse_query(raw: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (k, v) = match pair.find('=') {
            Some(eq) => (&pair[..eq], &pair[eq + 1..]),
            None => (pair, ""),
        };
        let decode = |s: &str| {
            let s = s.replace('+', " ");
            urlencoding::decode(&s).map(|c| c.into_owned()).unwrap_or(s)
        };
        out.insert(decode(k), decode(v));
    }
    out
}

/// Flat string-map encoding of the original request parameters, with sorted
/// keys so the result is stable.
fn serialize_params(params: &HashMap<String, String>) -> AuthResult<String> {
    let ordered: BTreeMap<&str, &str> =
        params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    serde_json::to_string(&ordered).map_err(|e| AuthError::internal(e.to_string()))
}

fn redirect_to(path: &str) -> AuthResult<Response> {
    let location = HeaderValue::from_str(path)
        .map_err(|e| AuthError::internal(format!("bad redirect target {}: {}", path, e)))?;
    Ok((StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, location)]).into_response())
}

fn authorization_url(cfg: &AuthConfig, name: &str, nonce: &str) -> AuthResult<String> {
    let provider = cfg.provider(name).ok_or_else(|| AuthError::unknown_provider(name))?;
    let callback = cfg.oauth2_callback_url(name);
    let scope = provider.scopes.join(" ");

    let mut query = format!(
        "response_type=code&client_id={}&redirect_uri={}&scope={}",
        urlencoding::encode(&provider.client_id),
        urlencoding::encode(&callback),
        urlencoding::encode(&scope),
    );
    for (k, v) in &provider.additional_params {
        query.push('&');
        query.push_str(&urlencoding::encode(k));
        query.push('=');
        query.push_str(&urlencoding::encode(v));
    }
    query.push_str("&state=");
    query.push_str(&urlencoding::encode(nonce));

    Ok(format!("{}?{}", provider.auth_url, query))
}

/// Phase one: stash the nonce and original parameters in the session log and
/// send the user to the provider. No token exchange happens here.
pub async fn start(
    cfg: &AuthConfig,
    state: &SharedClientState,
    provider_name: &str,
    raw_query: &str,
) -> AuthResult<Response> {
    if cfg.provider(provider_name).is_none() {
        return Err(AuthError::unknown_provider(provider_name));
    }

    let nonce = gen_nonce()?;
    let params = parse_query(raw_query);

    {
        let mut st = state.lock();
        st.put_session(&cfg.keys.oauth2_state, &nonce);
        if !params.is_empty() {
            let flat = serialize_params(&params)?;
            st.put_session(&cfg.keys.oauth2_params, &flat);
        }
    }

    let url = authorization_url(cfg, provider_name, &nonce)?;
    info!(provider = provider_name, "oauth2.start");
    redirect_to(&url)
}

/// Phase two: the provider called us back.
pub async fn end(
    cfg: &AuthConfig,
    state: &SharedClientState,
    provider_name: &str,
    raw_query: &str,
) -> AuthResult<Response> {
    let provider = cfg
        .provider(provider_name)
        .cloned()
        .ok_or_else(|| AuthError::unknown_provider(provider_name))?;

    let query = parse_query(raw_query);

    // Validate and consume the flow state staged by `start`. The two error
    // cases stay distinct: no stored nonce means the flow never started here,
    // a mismatched nonce means the callback was tampered with.
    {
        let mut st = state.lock();
        let want = st
            .get_session(&cfg.keys.oauth2_state)
            .map(str::to_string)
            .ok_or_else(|| AuthError::flow_state("oauth2 endpoint hit without session state"))?;
        let given = query.get("state").map(String::as_str).unwrap_or("");
        if want != given {
            return Err(AuthError::csrf("oauth2 state validation failed"));
        }
        st.del_session(&cfg.keys.oauth2_state);
        st.del_session(&cfg.keys.oauth2_params);
    }

    // The provider can signal failure instead of sending a code. That is a
    // user-facing outcome, not an error: the failure hooks run and unless one
    // of them handled it, the user lands on the not-ok page.
    if let Some(reason) = query.get("error") {
        info!(
            provider = provider_name,
            error = reason.as_str(),
            error_reason = query.get("error_reason").map(String::as_str).unwrap_or(""),
            "oauth2.end provider reported failure"
        );

        let mut st = state.lock();
        let mut ctx = HookContext { state: &mut *st, provider: provider_name, query: &query };
        if cfg.events.fire_before(AuthEvent::OAuth2Fail, &mut ctx)? {
            return Ok(StatusCode::OK.into_response());
        }
        if cfg.events.fire_after(AuthEvent::OAuth2Fail, &mut ctx)? {
            return Ok(StatusCode::OK.into_response());
        }
        return redirect_to(&cfg.oauth2_login_not_ok_path);
    }

    let code = query.get("code").map(String::as_str).unwrap_or("");
    let callback = cfg.oauth2_callback_url(provider_name);
    let token = cfg.exchanger.exchange(&provider, &callback, code).await?;
    let details = provider.user_details.find_user_details(&token).await?;

    debug!(provider = provider_name, uid = details.uid.as_str(), "oauth2.end resolved identity");

    let identity = format!(
        "oauth2{sep}{provider}{sep}{uid}",
        sep = OAUTH2_PID_SEPARATOR,
        provider = provider_name,
        uid = details.uid
    );

    let mut st = state.lock();
    let mut ctx = HookContext { state: &mut *st, provider: provider_name, query: &query };
    if cfg.events.fire_before(AuthEvent::OAuth2, &mut ctx)? {
        return Ok(StatusCode::OK.into_response());
    }

    st.put_session(&cfg.keys.primary_identity, &identity);
    info!(provider = provider_name, "oauth2.end login staged");

    let mut ctx = HookContext { state: &mut *st, provider: provider_name, query: &query };
    if cfg.events.fire_after(AuthEvent::OAuth2, &mut ctx)? {
        return Ok(StatusCode::OK.into_response());
    }

    redirect_to(&cfg.oauth2_login_ok_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_query_decodes_pairs() {
        let q = parse_query("cake=yes&death=no&plus=a+b&enc=%3b%3b");
        assert_eq!(q.get("cake").map(String::as_str), Some("yes"));
        assert_eq!(q.get("death").map(String::as_str), Some("no"));
        assert_eq!(q.get("plus").map(String::as_str), Some("a b"));
        assert_eq!(q.get("enc").map(String::as_str), Some(";;"));
    }

    #[test]
    fn serialize_params_sorts_keys() {
        let mut params = HashMap::new();
        params.insert("death".to_string(), "no".to_string());
        params.insert("cake".to_string(), "yes".to_string());
        assert_eq!(serialize_params(&params).unwrap(), r#"{"cake":"yes","death":"no"}"#);
    }

    #[test]
    fn nonces_are_fresh() {
        let a = gen_nonce().unwrap();
        let b = gen_nonce().unwrap();
        assert_ne!(a, b);
        assert!(a.len() >= 40, "expected 256 bits of base64url, got {}", a.len());
    }
}
