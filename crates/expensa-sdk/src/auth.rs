//! Sign-in, registration and identity queries.
//!
//! [`AuthService`] is the only writer of the session store besides the
//! refresh path inside [`ApiClient`].  Permission and role checks answer
//! from the cached identity snapshot and never hit the network; they only
//! decide what the console offers, the server still enforces access.

use expensa_models::{AuthenticationResponse, LoginRequest, RegisterRequest, User};

use crate::client::ApiClient;
use crate::error::SdkError;
use crate::paths::ApiPaths;
use crate::session::Session;

/// Authentication operations on top of an [`ApiClient`].
#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    /// Wrap `client`; the service writes to the client's session store.
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// The wrapped client, for resource calls.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Exchange user credentials for a new session.
    ///
    /// On success the credential pair and identity snapshot replace any
    /// previous session in one write.
    ///
    /// # Errors
    ///
    /// [`SdkError::Status`] with 401 for bad credentials; the existing
    /// session is left untouched on any failure.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<AuthenticationResponse, SdkError> {
        let response: AuthenticationResponse =
            self.client.post_public(ApiPaths::LOGIN, credentials).await?;
        self.store(&response).await;
        tracing::info!(user = %response.user.username, "signed in");
        Ok(response)
    }

    /// Create an account and sign in as that account.
    ///
    /// # Errors
    ///
    /// [`SdkError::Validation`] before any request if a required field is
    /// blank, otherwise the server's answer (409 for a taken username).
    pub async fn register(&self, data: &RegisterRequest) -> Result<AuthenticationResponse, SdkError> {
        data.validate()?;
        let response: AuthenticationResponse =
            self.client.post_public(ApiPaths::REGISTER, data).await?;
        self.store(&response).await;
        tracing::info!(user = %response.user.username, "account registered");
        Ok(response)
    }

    /// Rotate the credential pair now rather than waiting for a 401.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::refresh_session`].
    pub async fn refresh(&self) -> Result<Session, SdkError> {
        self.client.refresh_session().await
    }

    /// Forget the credential pair and identity snapshot.
    ///
    /// A refresh already in flight finishes first and its pair is then
    /// discarded with the rest of the session.
    pub async fn logout(&self) {
        self.client.replace_session(None).await;
        tracing::info!("signed out");
    }

    /// The cached identity snapshot.
    pub fn current_user(&self) -> Option<User> {
        self.client.session().user()
    }

    /// The stored access token.
    pub fn access_token(&self) -> Option<String> {
        self.client.session().access_token()
    }

    /// True iff an access token is stored.
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// Whether the signed-in user holds `permission_type`; false when signed out.
    pub fn has_permission(&self, permission_type: &str) -> bool {
        self.current_user()
            .is_some_and(|u| u.has_permission(permission_type))
    }

    /// Whether the signed-in user holds a role of `role_type`; false when signed out.
    pub fn has_role(&self, role_type: &str) -> bool {
        self.current_user().is_some_and(|u| u.has_role(role_type))
    }

    async fn store(&self, response: &AuthenticationResponse) {
        self.client
            .replace_session(Some(Session::from(response.clone())))
            .await;
    }
}
