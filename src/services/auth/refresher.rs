//! Refresh endpoint client used by the coordinator.
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::api::v1::dto::{error_detail::read_detail, token::TokenResponse};
use crate::config::api_endpoint;
use crate::services::auth::credential::Credential;

pub const REFRESH_PATH: &str = "/api/v1/auth/refresh";

/// Refresh-layer errors.
///
/// Every variant is terminal for the session: the coordinator purges the
/// stored credential whatever the cause.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("no refresh token stored")]
    MissingRefreshToken,
    #[error("refresh rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },
    #[error("refresh transport error: {0}")]
    Transport(String),
    #[error("refresh response invalid: {0}")]
    InvalidResponse(String),
}

/// Exchanges a refresh token for a new credential.
///
/// Implementations must be cheap to share (`Arc<dyn TokenRefresher>`).
#[async_trait]
pub trait TokenRefresher: Send + Sync + 'static {
    async fn refresh(&self, refresh_token: &str) -> Result<Credential, RefreshError>;
}

/// `POST /api/v1/auth/refresh` with the refresh token as bearer and no body.
#[derive(Clone, Debug)]
pub struct HttpTokenRefresher {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTokenRefresher {
    pub fn new(client: reqwest::Client, api_url: &Url) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            endpoint: api_endpoint(api_url, REFRESH_PATH)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<Credential, RefreshError> {
        debug!(endpoint = %self.endpoint, "calling refresh endpoint");

        let resp = self
            .client
            .post(self.endpoint.clone())
            .header(AUTHORIZATION, format!("Bearer {}", refresh_token))
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let (status, detail) = read_detail(resp, "token refresh failed").await;
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

        Credential::try_from(body).map_err(|e| RefreshError::InvalidResponse(e.to_string()))
    }
}
