//! Authenticated request coordinator.
//!
//! Attaches the stored bearer token to every call. On a 401 the call joins
//! the single in-flight refresh (or starts it), waits for its outcome and is
//! replayed once with the new access token.
//!
//! Single-flight state is one slot holding the receiver of the running
//! refresh. The slot is checked and filled under a std mutex with no await in
//! between, so N requests that all see a 401 converge on one refresh call.
//! The refresh runs in its own task: a caller that gives up waiting cannot
//! strand the slot.
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{Instrument, debug, debug_span, error, info, warn};

use crate::api::v1::dto::error_detail::read_detail;
use crate::error::{ClientError, GENERIC_REQUEST_ERROR};
use crate::services::auth::redirect::LoginRedirect;
use crate::services::auth::refresher::{RefreshError, TokenRefresher};
use crate::services::auth::request::ApiRequest;
use crate::services::token_store::{CredentialStoreExt, TokenStore};

/// Published once per refresh attempt to every waiting request.
#[derive(Clone, Debug)]
enum RefreshOutcome {
    Refreshed { access_token: String },
    Failed { reason: String },
}

type Flight = watch::Receiver<Option<RefreshOutcome>>;

/// What a rejected request should do next.
enum Next {
    Wait(Flight),
    // Someone else already refreshed; replay with this token
    Replay(String),
}

struct Inner {
    client: reqwest::Client,
    store: Arc<dyn TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    redirect: Arc<dyn LoginRedirect>,
    in_flight: Mutex<Option<Flight>>,
}

/// Cheap to clone; clones share the token store and the refresh slot.
#[derive(Clone)]
pub struct AuthCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AuthCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCoordinator")
            .field("refreshing", &self.is_refreshing())
            .finish()
    }
}

impl AuthCoordinator {
    pub fn new(
        client: reqwest::Client,
        store: Arc<dyn TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        redirect: Arc<dyn LoginRedirect>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                store,
                refresher,
                redirect,
                in_flight: Mutex::new(None),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.inner.store
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.inner.client
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.slot().is_some()
    }

    /// Send `req` with the current access token.
    ///
    /// Every status except 401 is returned untouched. A 401 is recovered by
    /// one shared refresh and a single replay; the replayed response is
    /// returned as-is, whatever its status.
    ///
    /// Errors:
    /// - `Unauthenticated`: no access token stored (nothing was sent)
    /// - `RefreshFailed`: the session is gone; the store is already purged
    /// - `Transport`: the original call or the replay failed on the wire
    pub async fn request(&self, req: ApiRequest) -> Result<Response, ClientError> {
        let span = debug_span!(
            "api_request",
            method = %req.method(),
            url = %req.url(),
            request_id = %req.request_id(),
        );
        self.request_inner(req).instrument(span).await
    }

    /// `request` followed by status mapping and JSON decoding.
    ///
    /// Non-2xx answers become `ClientError::Api` carrying the server `detail`.
    pub async fn send_json<T: DeserializeOwned>(&self, req: ApiRequest) -> Result<T, ClientError> {
        let resp = self.send_checked(req).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ClientError::MalformedResponse(e.to_string()))
    }

    /// `request` followed by status mapping; the body is left to the caller.
    pub async fn send_checked(&self, req: ApiRequest) -> Result<Response, ClientError> {
        let resp = self.request(req).await?;
        if resp.status().is_success() {
            return Ok(resp);
        }

        let (status, detail) = read_detail(resp, GENERIC_REQUEST_ERROR).await;
        debug!(status = %status, detail = %detail, "api call failed");
        Err(ClientError::api(status, detail))
    }

    /// Refresh now, sharing any refresh that is already running.
    ///
    /// Returns the new access token.
    pub async fn refresh(&self) -> Result<String, ClientError> {
        let flight = self.inner.join_or_start(None)?;
        match flight {
            Next::Wait(flight) => Self::wait(flight).await,
            Next::Replay(token) => Ok(token),
        }
    }

    async fn request_inner(&self, req: ApiRequest) -> Result<Response, ClientError> {
        let token = self
            .inner
            .store
            .access_token()?
            .ok_or(ClientError::Unauthenticated)?;

        let resp = self.send(&req, &token).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        debug!("access token rejected");
        let fresh = match self.inner.join_or_start(Some(&token))? {
            Next::Wait(flight) => Self::wait(flight).await?,
            Next::Replay(token) => token,
        };

        debug!("replaying with refreshed token");
        self.send(&req, &fresh).await
    }

    async fn send(&self, req: &ApiRequest, access_token: &str) -> Result<Response, ClientError> {
        let request = req.build(&self.inner.client, access_token)?;
        let resp = self.inner.client.execute(request).await?;
        debug!(status = %resp.status(), "response received");
        Ok(resp)
    }

    async fn wait(mut flight: Flight) -> Result<String, ClientError> {
        let outcome = flight
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ClientError::RefreshFailed("refresh task ended without a result".into()))?
            .clone();

        match outcome {
            Some(RefreshOutcome::Refreshed { access_token }) => Ok(access_token),
            Some(RefreshOutcome::Failed { reason }) => Err(ClientError::RefreshFailed(reason)),
            None => Err(ClientError::RefreshFailed("refresh produced no outcome".into())),
        }
    }
}

impl Inner {
    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Flight>> {
        // The slot is a plain Option; a poisoned lock still holds a usable value.
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Join the running refresh, or start one.
    ///
    /// `rejected` is the token the server just refused. When no refresh is
    /// running and the store already holds a different token, that token is
    /// returned for a replay instead of refreshing again.
    fn join_or_start(self: &Arc<Self>, rejected: Option<&str>) -> Result<Next, ClientError> {
        let mut slot = self.slot();

        if let Some(flight) = slot.as_ref() {
            debug!("joining in-flight refresh");
            return Ok(Next::Wait(flight.clone()));
        }

        let current = self.store.access_token()?;
        match (current, rejected) {
            // credential was purged after this request went out
            (None, Some(_)) => return Err(ClientError::Unauthenticated),
            (Some(current), Some(rejected)) if current != rejected => {
                debug!("token already refreshed by an earlier request");
                return Ok(Next::Replay(current));
            }
            _ => {}
        }

        let (tx, rx) = watch::channel(None);
        *slot = Some(rx.clone());
        drop(slot);

        let inner = Arc::clone(self);
        tokio::spawn(
            async move {
                let outcome = {
                    let _release = ReleaseSlot(&inner);
                    inner.run_refresh().await
                };
                tx.send_replace(Some(outcome));
            }
            .instrument(debug_span!("token_refresh")),
        );

        Ok(Next::Wait(rx))
    }

    async fn run_refresh(&self) -> RefreshOutcome {
        let refresh_token = match self.store.refresh_token() {
            Ok(Some(token)) => token,
            Ok(None) => return self.fail(RefreshError::MissingRefreshToken.to_string()),
            Err(e) => return self.fail(e.to_string()),
        };

        let credential = match self.refresher.refresh(&refresh_token).await {
            Ok(credential) => credential,
            Err(e) => return self.fail(e.to_string()),
        };

        if let Err(e) = self.store.save_credential(&credential) {
            error!(error = %e, "failed to persist refreshed credential");
            return self.fail(e.to_string());
        }

        info!(user_id = credential.user_id, "access token refreshed");
        RefreshOutcome::Refreshed {
            access_token: credential.access_token,
        }
    }

    fn fail(&self, reason: String) -> RefreshOutcome {
        warn!(reason = %reason, "token refresh failed, clearing credential");

        if let Err(e) = self.store.clear_credential() {
            error!(error = %e, "failed to clear credential");
        }
        self.redirect.redirect_to_login();

        RefreshOutcome::Failed { reason }
    }
}

// Empties the refresh slot when the refresh task finishes, panics or is
// cancelled at runtime shutdown.
struct ReleaseSlot<'a>(&'a Inner);

impl Drop for ReleaseSlot<'_> {
    fn drop(&mut self) {
        *self.0.slot() = None;
    }
}
