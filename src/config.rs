/*
 * Responsibility
 * - Read settings from the environment (API_URL, token store path, timeouts)
 * - Validate them up front (bad values fail startup, not the first request)
 */
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone, Debug)]
pub struct Config {
    pub app_env: AppEnv,
    // Backend base URL, e.g. http://localhost:8000 or https://host/chat/
    pub api_url: Url,
    // Where the credential survives between runs
    pub token_store_path: PathBuf,
    // Route announced by the redirect sink after an unrecoverable refresh failure
    pub login_route: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let app_env = AppEnv::from_env();

        let api_url = std::env::var("API_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());
        let api_url = parse_api_url(&api_url)?;

        let token_store_path = std::env::var("TOKEN_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".groupchat/tokens.json"));

        let login_route = std::env::var("LOGIN_ROUTE").unwrap_or_else(|_| "/login".to_string());
        if !login_route.starts_with('/') {
            return Err(ConfigError::Invalid("LOGIN_ROUTE"));
        }

        let request_timeout = seconds_from_env("REQUEST_TIMEOUT_SECONDS", 30)?;
        let connect_timeout = seconds_from_env("CONNECT_TIMEOUT_SECONDS", 10)?;

        Ok(Self {
            app_env,
            api_url,
            token_store_path,
            login_route,
            request_timeout,
            connect_timeout,
        })
    }

    /// Absolute URL for an API path such as `/api/v1/groups/`.
    pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
        api_endpoint(&self.api_url, path).map_err(|_| ConfigError::Invalid("API_URL"))
    }
}

/// Resolve `path` under `base`, keeping any path prefix `base` carries.
///
/// `https://host/chat` + `/api/v1/auth/login` is `https://host/chat/api/v1/auth/login`.
pub fn api_endpoint(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let prefix = format!("{}/", base.path());
        base.set_path(&prefix);
    }
    base.join(path.trim_start_matches('/'))
}

pub(crate) fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|_| ConfigError::Invalid("API_URL"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ConfigError::Invalid("API_URL")),
    }
}

fn seconds_from_env(key: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or(ConfigError::Invalid(key)),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}
