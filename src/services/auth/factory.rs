/// Factory: build the HTTP client and `AuthCoordinator` from application `Config`.
use std::sync::Arc;

use crate::config::{Config, ConfigError};
use crate::error::ClientError;
use crate::services::auth::{
    AuthCoordinator, HttpTokenRefresher, LogRedirect, LoginRedirect, TokenRefresher,
};
use crate::services::token_store::TokenStore;

pub fn build_http_client(config: &Config) -> Result<reqwest::Client, ClientError> {
    let client = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(concat!("groupchat-client/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

pub fn build_coordinator(
    config: &Config,
    store: Arc<dyn TokenStore>,
) -> Result<AuthCoordinator, ClientError> {
    let client = build_http_client(config)?;

    let refresher: Arc<dyn TokenRefresher> = Arc::new(
        HttpTokenRefresher::new(client.clone(), &config.api_url)
            .map_err(|_| ConfigError::Invalid("API_URL"))?,
    );
    let redirect: Arc<dyn LoginRedirect> = Arc::new(LogRedirect::new(config.login_route.clone()));

    Ok(AuthCoordinator::new(client, store, refresher, redirect))
}
