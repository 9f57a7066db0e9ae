use serde::Deserialize;

/// Token pair returned by `/auth/login`, `/auth/register` and `/auth/refresh`.
///
/// `user_id` is present on refresh; older login/register deployments omit it.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Usually "bearer"
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Human-readable confirmation ("logged in", "tokens refreshed", ...)
    #[serde(default)]
    pub message: Option<String>,
}
