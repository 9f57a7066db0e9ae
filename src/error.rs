/*
 * Responsibility
 * - Crate-wide ClientError definition
 * - Map store / transport / config failures into one type callers can match on
 * - Keep the auth taxonomy explicit: Unauthenticated, RefreshFailed, Api
 */
use reqwest::StatusCode;
use thiserror::Error;

use crate::config::ConfigError;
use crate::services::token_store::StoreError;

/// Message used when the server gives us nothing better.
pub const GENERIC_REQUEST_ERROR: &str = "request failed";

#[derive(Debug, Error)]
pub enum ClientError {
    /// No access token in the store. No network call was made.
    #[error("unauthenticated")]
    Unauthenticated,

    /// The refresh token was rejected (or refresh could not run). The stored
    /// credential has been purged and the login redirect fired.
    #[error("session expired: {0}")]
    RefreshFailed(String),

    /// Any non-2xx answer other than the 401 handled by the refresh flow.
    #[error("{status}: {detail}")]
    Api { status: StatusCode, detail: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    pub fn api(status: StatusCode, detail: impl Into<String>) -> Self {
        Self::Api {
            status,
            detail: detail.into(),
        }
    }

    /// True when the caller should send the user back to the login flow.
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::RefreshFailed(_))
    }
}
