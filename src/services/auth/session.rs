//! Session lifecycle: login, register, logout and startup restore.
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::api::v1::dto::{
    auth_request::{LoginRequest, RegisterRequest},
    error_detail::read_detail,
    token::TokenResponse,
};
use crate::config::api_endpoint;
use crate::error::ClientError;
use crate::services::auth::coordinator::AuthCoordinator;
use crate::services::auth::credential::Credential;
use crate::services::token_store::store::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_ID_KEY};
use crate::services::token_store::CredentialStoreExt;

pub const LOGIN_PATH: &str = "/api/v1/auth/login";
pub const REGISTER_PATH: &str = "/api/v1/auth/register";

#[derive(Clone, Debug)]
pub struct Session {
    coordinator: AuthCoordinator,
    api_url: Url,
}

impl Session {
    pub fn new(coordinator: AuthCoordinator, api_url: Url) -> Self {
        Self {
            coordinator,
            api_url,
        }
    }

    pub fn coordinator(&self) -> &AuthCoordinator {
        &self.coordinator
    }

    /// Exchange email/password for a credential and make it the active one.
    pub async fn login(&self, email: &str, password: &str) -> Result<Credential, ClientError> {
        let req = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        req.validate()
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;

        let credential = self.exchange(LOGIN_PATH, &req, "login failed").await?;
        info!(user_id = credential.user_id, "logged in");
        Ok(credential)
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<Credential, ClientError> {
        let req = RegisterRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
            password_confirm: password_confirm.to_string(),
        };
        req.validate()
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;

        let credential = self
            .exchange(REGISTER_PATH, &req, "registration failed")
            .await?;
        info!(user_id = credential.user_id, "registered");
        Ok(credential)
    }

    pub fn logout(&self) -> Result<(), ClientError> {
        self.coordinator.store().clear_credential()?;
        info!("logged out");
        Ok(())
    }

    pub fn current(&self) -> Result<Option<Credential>, ClientError> {
        Ok(self.coordinator.store().load_credential()?)
    }

    /// Startup check: if anything is stored, prove it still works by
    /// refreshing once. Returns `None` when there is no usable session; a
    /// failed refresh has already purged the store.
    pub async fn restore(&self) -> Result<Option<Credential>, ClientError> {
        let store = self.coordinator.store();
        if store.access_token()?.is_none() && store.refresh_token()?.is_none() {
            debug!("no stored session");
            return Ok(None);
        }

        match self.coordinator.refresh().await {
            Ok(_) => self.current(),
            Err(ClientError::RefreshFailed(reason)) => {
                debug!(reason = %reason, "stored session could not be restored");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn exchange<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<Credential, ClientError> {
        let url = api_endpoint(&self.api_url, path)
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;

        let resp = self
            .coordinator
            .http_client()
            .post(url)
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let (status, detail) = read_detail(resp, fallback).await;
            return Err(ClientError::api(status, detail));
        }

        let tokens: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::MalformedResponse(e.to_string()))?;

        if tokens.user_id.is_some() {
            let credential = Credential::try_from(tokens)?;
            self.coordinator.store().save_credential(&credential)?;
            return Ok(credential);
        }

        // login/register answer with the two tokens only; the refresh
        // response is the one that names the user
        if tokens.access_token.is_empty() || tokens.refresh_token.is_empty() {
            return Err(ClientError::MalformedResponse(
                "token response carries an empty token".into(),
            ));
        }
        let store = self.coordinator.store();
        store.remove(USER_ID_KEY)?;
        store.set_many(&[
            (ACCESS_TOKEN_KEY, tokens.access_token.as_str()),
            (REFRESH_TOKEN_KEY, tokens.refresh_token.as_str()),
        ])?;

        debug!("token response has no user_id, refreshing to complete the credential");
        self.coordinator.refresh().await?;
        self.current()?.ok_or_else(|| {
            ClientError::MalformedResponse("refreshed credential is incomplete".into())
        })
    }
}
