//! Client for the group-chat backend: credential storage and authenticated
//! requests with transparent, single-flight token refresh.
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod services;
pub mod state;

pub use error::ClientError;
pub use services::auth::{ApiRequest, AuthCoordinator, Credential, Session};
pub use services::token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
