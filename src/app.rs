/*
 * Responsibility
 * - Config 読み込み → 依存生成 (token store / coordinator / session)
 * - CLI サブコマンドの実行
 */
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use reqwest::Method;
use reqwest::header::{HeaderName, HeaderValue};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::error::ClientError;
use crate::services::auth::{ApiRequest, Session, build_coordinator};
use crate::services::token_store::{FileTokenStore, TokenStore};
use crate::state::AppState;

/// Command-line client for the group-chat backend.
#[derive(Parser, Debug)]
#[command(name = "groupchat", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the credential
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and store the credential
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        password_confirm: String,
    },
    /// Forget the stored credential
    Logout,
    /// Print the stored user id
    Whoami,
    /// Refresh the stored session (startup check)
    Restore,
    /// Send an authenticated request, e.g. `request GET /api/v1/groups/member/`
    Request {
        method: String,
        path: String,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
        /// Extra header as `name:value`, repeatable
        #[arg(long = "header", short = 'H')]
        headers: Vec<String>,
    },
}

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,groupchat_client=debug groupchat request GET /api/v1/chats/
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // In development, fail fast. In production, keep the default stderr report.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::debug!(
        api_url = %config.api_url,
        store = %config.token_store_path.display(),
        "starting in {:?} mode",
        config.app_env
    );

    let state = build_state(config)?;

    match execute(&state, cli.command).await {
        Err(err) if err.requires_login() => {
            bail!("{err}; run `groupchat login` to start a new session")
        }
        other => other.map_err(Into::into),
    }
}

fn build_state(config: Config) -> Result<AppState> {
    let store: Arc<dyn TokenStore> = Arc::new(
        FileTokenStore::open(&config.token_store_path).context("opening token store")?,
    );
    let coordinator = build_coordinator(&config, store)?;
    let session = Session::new(coordinator, config.api_url.clone());

    Ok(AppState::new(config, session))
}

async fn execute(state: &AppState, command: Command) -> Result<(), ClientError> {
    match command {
        Command::Login { email, password } => {
            let credential = state.session.login(&email, &password).await?;
            println!("logged in as user {}", credential.user_id);
        }
        Command::Register {
            email,
            password,
            password_confirm,
        } => {
            let credential = state
                .session
                .register(&email, &password, &password_confirm)
                .await?;
            println!("registered user {}", credential.user_id);
        }
        Command::Logout => {
            state.session.logout()?;
            println!("logged out");
        }
        Command::Whoami => match state.session.current()? {
            Some(credential) => println!("user {}", credential.user_id),
            None => return Err(ClientError::Unauthenticated),
        },
        Command::Restore => match state.session.restore().await? {
            Some(credential) => println!("session restored for user {}", credential.user_id),
            None => return Err(ClientError::Unauthenticated),
        },
        Command::Request {
            method,
            path,
            body,
            headers,
        } => {
            let req = build_request(state, &method, &path, body.as_deref(), &headers)?;
            let resp = state.coordinator().request(req).await?;

            let status = resp.status();
            let text = resp.text().await?;
            eprintln!("{status}");
            println!("{text}");

            if !status.is_success() {
                let detail = crate::api::v1::dto::error_detail::detail_from_body(
                    text.as_bytes(),
                    crate::error::GENERIC_REQUEST_ERROR,
                );
                return Err(ClientError::api(status, detail));
            }
        }
    }
    Ok(())
}

fn build_request(
    state: &AppState,
    method: &str,
    path: &str,
    body: Option<&str>,
    headers: &[String],
) -> Result<ApiRequest, ClientError> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| ClientError::InvalidRequest(format!("unknown method {method}")))?;
    let url = state.config.endpoint(path)?;

    let mut req = ApiRequest::new(method, url);

    for raw in headers {
        let (name, value) = raw
            .split_once(':')
            .ok_or_else(|| ClientError::InvalidRequest(format!("header `{raw}` is not name:value")))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| ClientError::InvalidRequest(format!("invalid header name `{name}`")))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|_| ClientError::InvalidRequest(format!("invalid header value for `{}`", name.as_str())))?;
        req = req.header(name, value);
    }

    if let Some(body) = body {
        let json: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| ClientError::InvalidRequest(format!("body is not JSON: {e}")))?;
        req = req
            .json(&json)
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
    }

    Ok(req)
}
