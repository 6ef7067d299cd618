//! Authenticated request pipeline.
//!
//! Every backend call goes through [`Pipeline::send`]. The pipeline reads the
//! current access token from the injected [`SessionStore`] right before each
//! transmission and attaches it as a bearer token. A 401 answer triggers one
//! refresh (`POST /auth/token/refresh/`) followed by one resend of the same
//! request; a second 401 is returned to the caller as is.
//!
//! Refreshes are serialized: when several requests hit 401 at the same time
//! only the first performs the refresh, the others notice the stored access
//! token has already changed and go straight to their resend.
//!
//! A failed refresh clears the session and broadcasts
//! [`SessionEvent::ReauthRequired`].

use std::sync::Arc;

use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::session::{Session, SessionEvent, SessionStore, mask_token};

/// Token refresh endpoint, relative to the base URL.
pub const REFRESH_PATH: &str = "/auth/token/refresh/";

/// Correlation header; a resend carries the same id as the first attempt.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// An outgoing request. Immutable once built; the pipeline may transmit it
/// twice but never changes it.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    authenticated: bool,
}

impl RequestDescriptor {
    /// `path` is relative to the base URL and starts with `/`.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            authenticated: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sends without credentials and without refresh handling.
    ///
    /// Used for the login-style endpoints, where a stale token in the header
    /// would only get in the way.
    #[must_use]
    pub fn anonymous(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

/// Which transmission of a request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Initial,
    /// The single resend after a successful refresh.
    Retry,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Bearer-token injecting HTTP client with refresh-once recovery.
pub struct Pipeline {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn SessionStore>,
    refresh_lock: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

impl Pipeline {
    /// Creates a pipeline with a default HTTP client.
    pub fn new(base_url: impl Into<String>, store: Arc<dyn SessionStore>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, store)
    }

    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let base_url: String = base_url.into();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
            refresh_lock: Mutex::new(()),
            events,
        }
    }

    /// Creates a pipeline using the configured base URL and timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &Config, store: Arc<dyn SessionStore>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self::with_client(http, config.effective_base_url(), store))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Subscribes to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Returns the stored session.
    ///
    /// # Errors
    /// Returns [`ApiError::Session`] if the store cannot be read.
    pub fn session(&self) -> Result<Option<Session>> {
        self.store.load().map_err(session_error)
    }

    /// Replaces the stored session and announces the sign-in.
    ///
    /// # Errors
    /// Returns [`ApiError::Session`] if the store cannot be written.
    pub fn sign_in(&self, session: &Session) -> Result<()> {
        self.store.save(session).map_err(session_error)?;
        info!(access = %mask_token(&session.access), "session stored");
        self.emit(SessionEvent::SignedIn);
        Ok(())
    }

    /// Clears the stored session. Returns true if there was one.
    ///
    /// # Errors
    /// Returns [`ApiError::Session`] if the store cannot be modified.
    pub fn sign_out(&self) -> Result<bool> {
        let had_session = self.store.clear().map_err(session_error)?;
        info!(had_session, "session cleared");
        self.emit(SessionEvent::SignedOut);
        Ok(had_session)
    }

    /// Sends a request, recovering once from an expired access token.
    ///
    /// Returns the response for any 2xx status. Other statuses become
    /// [`ApiError::Backend`] with the body attached, except a 401 on the first
    /// attempt, which is handled by refreshing.
    ///
    /// # Errors
    /// - [`ApiError::Network`] when no response arrives.
    /// - [`ApiError::AuthExpired`] on 401 when there is no refresh token.
    /// - [`ApiError::AuthFailed`] when the refresh itself fails.
    /// - [`ApiError::Backend`] for every other non-success status, including a
    ///   401 on the retry.
    pub async fn send(&self, request: &RequestDescriptor) -> Result<Response> {
        let request_id = Uuid::new_v4().to_string();
        let mut attempt = Attempt::Initial;
        loop {
            let access = if request.authenticated {
                self.store.access_token().map_err(session_error)?
            } else {
                None
            };

            let response = self
                .transmit(request, &request_id, access.as_deref(), attempt)
                .await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }
            if status != StatusCode::UNAUTHORIZED || !request.authenticated {
                return Err(backend_error(response).await);
            }

            match attempt {
                Attempt::Retry => {
                    warn!(
                        method = %request.method,
                        path = %request.path,
                        "still unauthorized after token refresh"
                    );
                    return Err(backend_error(response).await);
                }
                Attempt::Initial => {
                    let body = match response.text().await {
                        Ok(body) => body,
                        Err(e) => {
                            debug!(error = %e, "failed to read 401 response body");
                            String::new()
                        }
                    };
                    self.recover(access.as_deref(), body).await?;
                    attempt = Attempt::Retry;
                }
            }
        }
    }

    /// Sends a request and decodes the JSON body.
    ///
    /// # Errors
    /// Everything [`Pipeline::send`] returns, plus [`ApiError::Decode`].
    pub async fn send_json<T: DeserializeOwned>(&self, request: &RequestDescriptor) -> Result<T> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Sends a request and discards the body (`DELETE`, `204 No Content`).
    ///
    /// # Errors
    /// Everything [`Pipeline::send`] returns.
    pub async fn send_empty(&self, request: &RequestDescriptor) -> Result<()> {
        let response = self.send(request).await?;
        response.bytes().await?;
        Ok(())
    }

    async fn transmit(
        &self,
        request: &RequestDescriptor,
        request_id: &str,
        access: Option<&str>,
        attempt: Attempt,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self
            .http
            .request(request.method.clone(), url.as_str())
            .header(REQUEST_ID_HEADER, request_id);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = access {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(
            method = %request.method,
            path = %request.path,
            request_id,
            ?attempt,
            authorized = access.is_some(),
            "sending request"
        );

        let response = builder.send().await?;
        debug!(status = %response.status(), path = %request.path, "response received");
        Ok(response)
    }

    /// Handles a first-attempt 401. On `Ok` the caller resends.
    ///
    /// `stale_access` is the token the rejected request carried.
    async fn recover(&self, stale_access: Option<&str>, unauthorized_body: String) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        let Some(session) = self.store.load().map_err(session_error)? else {
            if stale_access.is_some() {
                // Cleared while we waited for the lock: a concurrent refresh failed
                // or the user logged out.
                return Err(ApiError::AuthFailed {
                    reason: "session was cleared while waiting for token refresh".to_string(),
                });
            }
            return Err(ApiError::AuthExpired {
                body: unauthorized_body,
            });
        };

        if stale_access != Some(session.access.as_str()) {
            debug!("access token changed since the request was sent; skipping refresh");
            return Ok(());
        }

        match self.refresh_access(&session.refresh).await {
            Ok(access) => {
                self.store.set_access(&access).map_err(session_error)?;
                info!(access = %mask_token(&access), "access token refreshed");
                self.emit(SessionEvent::Refreshed);
                Ok(())
            }
            Err(reason) => {
                warn!(%reason, "token refresh failed; clearing session");
                if let Err(e) = self.store.clear() {
                    warn!(error = %format!("{e:#}"), "failed to clear session");
                }
                self.emit(SessionEvent::ReauthRequired);
                Err(ApiError::AuthFailed { reason })
            }
        }
    }

    /// Exchanges the refresh token for a new access token.
    async fn refresh_access(&self, refresh: &str) -> std::result::Result<String, String> {
        let url = format!("{}{}", self.base_url, REFRESH_PATH);
        let response = self
            .http
            .post(url.as_str())
            .json(&serde_json::json!({ "refresh": refresh }))
            .send()
            .await
            .map_err(|e| format!("token refresh request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("token refresh rejected (HTTP {status}): {body}"));
        }

        let data: RefreshResponse = response
            .json()
            .await
            .map_err(|e| format!("failed to parse token refresh response: {e}"))?;
        Ok(data.access)
    }
}

async fn backend_error(response: Response) -> ApiError {
    let status = response.status();
    match response.text().await {
        Ok(body) => ApiError::Backend { status, body },
        Err(e) => ApiError::Network(e),
    }
}

fn session_error(err: anyhow::Error) -> ApiError {
    ApiError::Session(format!("{err:#}"))
}
