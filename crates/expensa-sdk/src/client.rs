//! Authenticated HTTP client for the Expensa REST API.
//!
//! [`ApiClient`] sends JSON requests relative to a configured base URL,
//! attaches the stored access token as a bearer credential, and recovers
//! from one expired access token per call by exchanging the refresh token.
//!
//! # Per-call lifecycle
//!
//! ```text
//! send ──► 2xx ───────────────────────────────────────► Ok(body)
//!      ├─► non-401 error / transport error ───────────► Err (unchanged)
//!      └─► 401 ─► refresh ─┬─► ok ─► resend ─► 2xx ───► Ok(body)
//!                          │                └► error ─► Err (incl. 401)
//!                          └─► failed / no token ─────► clear store,
//!                                                       Err(SessionExpired)
//! ```
//!
//! # Typical usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use expensa_models::Expense;
//! use expensa_sdk::{ApiClient, ClientConfig, MemorySessionStore};
//!
//! # async fn run() -> Result<(), expensa_sdk::SdkError> {
//! let client = ApiClient::new(ClientConfig::from_env(), Arc::new(MemorySessionStore::new()))?;
//! let expenses: Vec<Expense> = client.get("/expenses").await?;
//! println!("{} expense(s)", expenses.len());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use expensa_models::TokenRefreshResponse;

use crate::config::ClientConfig;
use crate::error::SdkError;
use crate::paths::ApiPaths;
use crate::session::{Session, SessionStore};

// ---------------------------------------------------------------------------
// Request options
// ---------------------------------------------------------------------------

/// Per-call extras: additional headers and query parameters.
///
/// ```
/// use expensa_sdk::RequestOptions;
///
/// let opts = RequestOptions::new()
///     .header("X-Request-Id", "abc")
///     .query("status", "SUBMITTED");
/// assert_eq!(opts.query.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Extra headers.  A stored access token always wins over a
    /// caller-supplied `Authorization` header.
    pub headers: Vec<(String, String)>,
    /// Query-string parameters, in order.
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    /// No extra headers or parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a query parameter.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }
}

/// Which transmission of a call is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// Original transmission; a 401 may trigger a refresh.
    First,
    /// Resend after a refresh; never eligible for another one.
    Retried,
}

/// Everything needed to (re)build one outbound request.
struct PendingRequest<'a> {
    method: Method,
    path: &'a str,
    body: Option<&'a Value>,
    options: &'a RequestOptions,
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// HTTP client bound to one API base URL and one [`SessionStore`].
///
/// Cloning is cheap; clones share the connection pool, the session store
/// and the refresh lock.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    session: Arc<dyn SessionStore>,
    refresh_lock: Arc<Mutex<()>>,
}

impl ApiClient {
    /// Create a client for `config`, reading and writing credentials
    /// through `session`.
    ///
    /// # Errors
    ///
    /// [`SdkError::Config`] for an unusable base URL, [`SdkError::Http`] if
    /// the underlying HTTP client cannot be built.
    pub fn new(config: ClientConfig, session: Arc<dyn SessionStore>) -> Result<Self, SdkError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            config: Arc::new(config),
            session,
            refresh_lock: Arc::new(Mutex::new(())),
        })
    }

    // ------------------------------------------------------------------
    // Typed verbs
    // ------------------------------------------------------------------

    /// `GET {base}{path}`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, SdkError> {
        self.send(Method::GET, path, None, &RequestOptions::default())
            .await
    }

    /// `GET {base}{path}` with extra headers / query parameters.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn get_with<T: DeserializeOwned>(
        &self,
        path: &str,
        options: &RequestOptions,
    ) -> Result<T, SdkError> {
        self.send(Method::GET, path, None, options).await
    }

    /// `POST {base}{path}` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, SdkError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.send(Method::POST, path, Some(&body), &RequestOptions::default())
            .await
    }

    /// `POST {base}{path}` without a body (state-transition actions).
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, SdkError> {
        self.send(Method::POST, path, None, &RequestOptions::default())
            .await
    }

    /// `PUT {base}{path}` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, SdkError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.send(Method::PUT, path, Some(&body), &RequestOptions::default())
            .await
    }

    /// `PATCH {base}{path}` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, SdkError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.send(Method::PATCH, path, Some(&body), &RequestOptions::default())
            .await
    }

    /// `DELETE {base}{path}`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, SdkError> {
        self.send(Method::DELETE, path, None, &RequestOptions::default())
            .await
    }

    // ------------------------------------------------------------------
    // Core
    // ------------------------------------------------------------------

    /// Send a request and decode the JSON response body.
    ///
    /// An empty success body decodes as JSON `null`, so `()` and
    /// `Option<_>` are valid targets for `204 No Content`.
    ///
    /// # Errors
    ///
    /// * [`SdkError::Status`] for any non-2xx answer, including a 401 on
    ///   the resend after a successful refresh.
    /// * [`SdkError::SessionExpired`] when a 401 could not be recovered
    ///   because no refresh token was stored or the exchange failed.  The
    ///   session store has been cleared by then.
    /// * [`SdkError::Http`] for transport failures (never retried).
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<T, SdkError> {
        let request = PendingRequest {
            method,
            path,
            body,
            options,
        };

        let mut attempt = Attempt::First;
        loop {
            let (response, sent_with) = self.dispatch(&request, attempt).await?;
            if response.status() != StatusCode::UNAUTHORIZED || attempt == Attempt::Retried {
                return decode(response).await;
            }

            tracing::debug!(method = %request.method, path, "access token rejected");
            self.recover_session(sent_with.as_deref()).await?;
            attempt = Attempt::Retried;
        }
    }

    /// `POST` to an endpoint that does not take the session's credentials
    /// (login, registration).  No bearer header is attached and a 401 is
    /// returned to the caller as-is.
    ///
    /// # Errors
    ///
    /// [`SdkError::Status`] for a non-2xx answer, [`SdkError::Http`] for
    /// transport failures.
    pub async fn post_public<T, B>(&self, path: &str, body: &B) -> Result<T, SdkError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        tracing::debug!(path, "sending unauthenticated request");
        let response = self
            .http
            .post(self.config.url(path))
            .json(body)
            .send()
            .await?;
        decode(response).await
    }

    /// Replace the stored session, or clear it with `None`.
    ///
    /// Waits for any refresh in flight, so a sign-in or sign-out is never
    /// overwritten by the pair that refresh obtains.
    pub async fn replace_session(&self, session: Option<Session>) {
        let _guard = self.refresh_lock.lock().await;
        match session {
            Some(session) => self.session.set(session),
            None => self.session.clear(),
        }
    }

    /// Exchange the stored refresh token for a new pair right now.
    ///
    /// Unlike the automatic path in [`send`](Self::send), a failure here
    /// leaves the session store untouched.
    ///
    /// # Errors
    ///
    /// [`SdkError::Auth`] if no refresh token is stored, otherwise the
    /// exchange failure.
    pub async fn refresh_session(&self) -> Result<Session, SdkError> {
        let _guard = self.refresh_lock.lock().await;
        let current = self
            .session
            .get()
            .filter(|s| s.refresh_token.is_some())
            .ok_or_else(|| SdkError::Auth("no refresh token available".into()))?;
        self.rotate(current).await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Build and send one transmission of `request`, returning the raw
    /// response and the access token it carried.
    async fn dispatch(
        &self,
        request: &PendingRequest<'_>,
        attempt: Attempt,
    ) -> Result<(Response, Option<String>), SdkError> {
        let token = self.session.access_token();

        let mut headers = HeaderMap::new();
        for (name, value) in &request.options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| SdkError::Config(format!("invalid header name `{name}`: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| SdkError::Config(format!("invalid value for header `{name}`: {e}")))?;
            headers.insert(name, value);
        }
        if let Some(token) = &token {
            headers.insert(AUTHORIZATION, bearer(token)?);
        }

        let mut builder = self
            .http
            .request(request.method.clone(), self.config.url(request.path))
            .headers(headers);
        if !request.options.query.is_empty() {
            builder = builder.query(&request.options.query);
        }
        if let Some(body) = request.body {
            builder = builder.json(body);
        }

        tracing::debug!(
            method = %request.method,
            path = request.path,
            ?attempt,
            authenticated = token.is_some(),
            "sending request"
        );
        let response = builder.send().await?;
        Ok((response, token))
    }

    /// Make the session usable again after a 401, or tear it down.
    ///
    /// Refreshes are serialized: a caller that waited behind another
    /// refresh and finds a different access token stored reuses that pair
    /// instead of spending the refresh token a second time.
    async fn recover_session(&self, sent_with: Option<&str>) -> Result<(), SdkError> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.session.get();
        if let Some(session) = &current {
            if Some(session.access_token.as_str()) != sent_with {
                tracing::debug!("credentials already rotated by a concurrent call");
                return Ok(());
            }
        }

        let Some(session) = current.filter(|s| s.refresh_token.is_some()) else {
            return Err(self.expire(SdkError::Auth("no refresh token available".into())));
        };

        match self.rotate(session).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_session_expired() => Err(e),
            Err(e) => Err(self.expire(e)),
        }
    }

    /// Exchange `current`'s refresh token and store the new pair.
    /// Callers must hold the refresh lock.
    ///
    /// The store is re-read after the exchange and only written if it still
    /// holds the spent refresh token.  A session replaced meanwhile (another
    /// client on the same store) is kept and returned; a cleared one ends
    /// in [`SdkError::SessionExpired`] without touching the store.
    async fn rotate(&self, current: Session) -> Result<Session, SdkError> {
        let spent = current
            .refresh_token
            .ok_or_else(|| SdkError::Auth("no refresh token available".into()))?;

        let refreshed = self.exchange_refresh_token(&spent).await?;
        match self.session.get() {
            Some(stored) if stored.refresh_token.as_deref() == Some(spent.as_str()) => {
                let session = stored.rotated(refreshed);
                self.session.set(session.clone());
                tracing::info!("access token refreshed");
                Ok(session)
            }
            Some(stored) => {
                tracing::debug!("session replaced during refresh, discarding rotated pair");
                Ok(stored)
            }
            None => {
                tracing::info!("signed out during refresh, discarding rotated pair");
                Err(SdkError::session_expired(SdkError::Auth(
                    "signed out while refreshing".into(),
                )))
            }
        }
    }

    /// `POST {base}/auth/refresh` authenticated with the refresh token
    /// itself.
    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, SdkError> {
        let response = self
            .http
            .post(self.config.url(ApiPaths::REFRESH))
            .header(AUTHORIZATION, bearer(refresh_token)?)
            .send()
            .await?;
        decode(response).await
    }

    fn expire(&self, cause: SdkError) -> SdkError {
        self.session.clear();
        tracing::warn!(error = %cause, "session expired, credentials cleared");
        SdkError::session_expired(cause)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The injected session store.
    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

fn bearer(token: &str) -> Result<HeaderValue, SdkError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| SdkError::Config(format!("token is not a valid header value: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Turn a response into `T`, or into [`SdkError::Status`] if it failed.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, SdkError> {
    let status = response.status();
    if !status.is_success() {
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(%status, error = %e, "could not read error response body");
                String::new()
            }
        };
        return Err(SdkError::Status { status, body });
    }

    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_value(Value::Null)?);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
