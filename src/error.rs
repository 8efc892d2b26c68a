//! Unified crate error model and mapping helpers.
//! This module provides a common error enum used across the client-state engine
//! and the OAuth2 flow, along with a mapper to HTTP status codes.
//!
//! The variants are deliberately distinct sentinels: callers need to tell
//! "flow never started" (`FlowState`) apart from "state token tampered"
//! (`Csrf`), and a backing-store read failure apart from a flush failure.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthError {
    /// A backing store could not be read or parsed at request start.
    Read { message: String },
    /// A backing store rejected the flush of accumulated events.
    Write { message: String },
    /// A provider name in the route is not registered in the config.
    UnknownProvider { name: String },
    /// The OAuth2 callback was hit without the flow state put by `start`.
    FlowState { message: String },
    /// The `state` query parameter did not match the stored nonce.
    Csrf { message: String },
    /// The token exchange or user-detail lookup against the provider failed.
    Exchange { message: String },
    Internal { message: String },
}

impl AuthError {
    pub fn read<S: Into<String>>(msg: S) -> Self {
        AuthError::Read { message: msg.into() }
    }
    pub fn write<S: Into<String>>(msg: S) -> Self {
        AuthError::Write { message: msg.into() }
    }
    pub fn unknown_provider<S: Into<String>>(name: S) -> Self {
        AuthError::UnknownProvider { name: name.into() }
    }
    pub fn flow_state<S: Into<String>>(msg: S) -> Self {
        AuthError::FlowState { message: msg.into() }
    }
    pub fn csrf<S: Into<String>>(msg: S) -> Self {
        AuthError::Csrf { message: msg.into() }
    }
    pub fn exchange<S: Into<String>>(msg: S) -> Self {
        AuthError::Exchange { message: msg.into() }
    }
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        AuthError::Internal { message: msg.into() }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AuthError::Read { .. } => 500,
            AuthError::Write { .. } => 500,
            AuthError::UnknownProvider { .. } => 404,
            AuthError::FlowState { .. } => 400,
            AuthError::Csrf { .. } => 403,
            AuthError::Exchange { .. } => 502,
            AuthError::Internal { .. } => 500,
        }
    }
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Read { message } => write!(f, "read: {}", message),
            AuthError::Write { message } => write!(f, "write: {}", message),
            AuthError::UnknownProvider { name } => write!(f, "provider \"{}\" not found", name),
            AuthError::FlowState { message } => write!(f, "{}", message),
            AuthError::Csrf { message } => write!(f, "{}", message),
            AuthError::Exchange { message } => write!(f, "exchange: {}", message),
            AuthError::Internal { message } => write!(f, "internal: {}", message),
        }
    }
}

impl std::error::Error for AuthError {}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::Internal { message: err.to_string() }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Exchange { message: err.to_string() }
    }
}
