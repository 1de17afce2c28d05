//! Authentication payloads and the signed-in user's identity.
//!
//! A [`User`] returned by the login, register or refresh endpoints is the
//! *identity snapshot*: it carries the roles and permissions the console
//! consults to decide which actions to offer, without a network round trip.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ModelError;
use crate::ids::UserId;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Body of `POST /auth/login`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Either the account's username or its e-mail address.
    pub username_or_email: String,
    /// Plain-text password (sent over TLS).
    pub password: String,
}

impl LoginRequest {
    /// Convenience constructor.
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}

/// Body of `POST /auth/register`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Desired login name.
    pub username: String,
    /// Contact e-mail, also accepted as a login name.
    pub email: String,
    /// Plain-text password.
    pub password: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Optional phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl RegisterRequest {
    /// Reject requests with a blank username, e-mail or password.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingField`] naming the first blank field.
    pub fn validate(&self) -> Result<(), ModelError> {
        for (field, value) in [
            ("username", &self.username),
            ("email", &self.email),
            ("password", &self.password),
        ] {
            if value.trim().is_empty() {
                return Err(ModelError::MissingField {
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A single grant attached to a [`Role`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    /// Server-side identifier.
    pub id: String,
    /// Machine name checked by the console, e.g. `USER_CREATE`.
    pub permission_type: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Resource the permission applies to, e.g. `USER`.
    #[serde(default)]
    pub resource: String,
    /// Action on that resource, e.g. `CREATE`.
    #[serde(default)]
    pub action: String,
}

/// A named bundle of permissions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// Server-side identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Machine name, e.g. `ADMIN`, `MANAGER`, `EMPLOYEE`.
    pub role_type: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Permissions granted by this role.
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// The authenticated principal's profile.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Account identifier.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Contact e-mail.
    pub email: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Optional phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    /// Department the user belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    /// Display name of that department.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_name: Option<String>,
    /// Roles held by the user.
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Whether the account is enabled.
    #[serde(default)]
    pub is_active: bool,
    /// Whether the account is locked after failed logins.
    #[serde(default)]
    pub account_locked: bool,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last modification timestamp (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// `first_name last_name`, as computed by the server.
    #[serde(default)]
    pub full_name: String,
}

impl User {
    /// Returns true if any of the user's roles grants `permission_type`.
    ///
    /// ```
    /// # use expensa_models::User;
    /// # let user: User = serde_json::from_value(serde_json::json!({
    /// #     "id": "u1", "username": "alice", "email": "a@x", "firstName": "A",
    /// #     "lastName": "L", "createdAt": "2024-01-01T00:00:00Z"
    /// # })).unwrap();
    /// assert!(!user.has_permission("USER_CREATE"));
    /// ```
    pub fn has_permission(&self, permission_type: &str) -> bool {
        self.roles
            .iter()
            .any(|role| role.permissions.iter().any(|p| p.permission_type == permission_type))
    }

    /// Returns true if the user holds a role of the given type.
    pub fn has_role(&self, role_type: &str) -> bool {
        self.roles.iter().any(|role| role.role_type == role_type)
    }

    /// All permission types granted across the user's roles, in role order.
    pub fn permission_types(&self) -> impl Iterator<Item = &str> {
        self.roles
            .iter()
            .flat_map(|role| role.permissions.iter().map(|p| p.permission_type.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Response of `POST /auth/login` and `POST /auth/register`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponse {
    /// Short-lived bearer token.
    pub access_token: String,
    /// Longer-lived token used only to mint a new access token.
    pub refresh_token: String,
    /// Always `Bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Access-token lifetime in seconds.
    #[serde(default)]
    pub expires_in: u64,
    /// Identity snapshot of the authenticated user.
    pub user: User,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Response of `POST /auth/refresh`.
///
/// Only the new pair is guaranteed; servers that also return the user
/// profile refresh the identity snapshot at the same time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenRefreshResponse {
    /// Replacement access token.
    pub access_token: String,
    /// Replacement refresh token.
    pub refresh_token: String,
    /// Updated identity snapshot, if the server sent a complete one.
    ///
    /// A profile that does not decode as a [`User`] is dropped rather than
    /// failing the whole response, so the new pair is never lost over it.
    #[serde(
        default,
        deserialize_with = "lenient_profile",
        skip_serializing_if = "Option::is_none"
    )]
    pub user: Option<User>,
}

fn lenient_profile<'de, D>(deserializer: D) -> Result<Option<User>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Profile {
        Complete(User),
        Partial(IgnoredAny),
    }

    Ok(match Option::<Profile>::deserialize(deserializer)? {
        Some(Profile::Complete(user)) => Some(user),
        Some(Profile::Partial(_)) | None => None,
    })
}

impl From<AuthenticationResponse> for TokenRefreshResponse {
    fn from(resp: AuthenticationResponse) -> Self {
        Self {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            user: Some(resp.user),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn permission(kind: &str) -> Permission {
        Permission {
            id: format!("p-{kind}"),
            permission_type: kind.to_string(),
            description: String::new(),
            resource: String::new(),
            action: String::new(),
        }
    }

    fn user_with(roles: Vec<Role>) -> User {
        User {
            id: UserId::new("u1"),
            username: "alice".into(),
            email: "alice@example.com".into(),
            first_name: "Alice".into(),
            last_name: "Liddell".into(),
            phone_number: None,
            department_id: None,
            department_name: None,
            roles,
            is_active: true,
            account_locked: false,
            created_at: "2024-01-01T00:00:00Z".into(),
            updated_at: None,
            full_name: "Alice Liddell".into(),
        }
    }

    #[test]
    fn login_request_uses_camel_case() {
        let req = LoginRequest::new("alice", "p1");
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value, json!({ "usernameOrEmail": "alice", "password": "p1" }));
    }

    #[test]
    fn register_request_omits_missing_phone() {
        let req = RegisterRequest {
            username: "bob".into(),
            email: "bob@example.com".into(),
            password: "pw".into(),
            first_name: "Bob".into(),
            last_name: "Builder".into(),
            phone_number: None,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("phoneNumber").is_none());
        assert_eq!(value["firstName"], "Bob");
    }

    #[test]
    fn register_request_rejects_blank_fields() {
        let mut req = RegisterRequest {
            username: "bob".into(),
            email: " ".into(),
            password: "pw".into(),
            first_name: "Bob".into(),
            last_name: "Builder".into(),
            phone_number: None,
        };
        assert_eq!(
            req.validate(),
            Err(ModelError::MissingField {
                field: "email".into()
            })
        );
        req.email = "bob@example.com".into();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn permission_and_role_queries() {
        let user = user_with(vec![
            Role {
                id: "r1".into(),
                name: "Manager".into(),
                role_type: "MANAGER".into(),
                description: String::new(),
                permissions: vec![permission("EXPENSE_APPROVE")],
            },
            Role {
                id: "r2".into(),
                name: "Employee".into(),
                role_type: "EMPLOYEE".into(),
                description: String::new(),
                permissions: vec![permission("EXPENSE_CREATE"), permission("EXPENSE_APPROVE")],
            },
        ]);

        assert!(user.has_permission("EXPENSE_APPROVE"));
        assert!(user.has_permission("EXPENSE_CREATE"));
        assert!(!user.has_permission("USER_DELETE"));
        assert!(user.has_role("MANAGER"));
        assert!(!user.has_role("ADMIN"));
        assert_eq!(
            user.permission_types().collect::<Vec<_>>(),
            ["EXPENSE_APPROVE", "EXPENSE_CREATE", "EXPENSE_APPROVE"]
        );
    }

    #[test]
    fn user_without_roles_has_nothing() {
        let user = user_with(Vec::new());
        assert!(!user.has_permission("USER_CREATE"));
        assert!(!user.has_role("ADMIN"));
    }

    #[test]
    fn refresh_response_without_user() {
        let resp: TokenRefreshResponse =
            serde_json::from_value(json!({ "accessToken": "A2", "refreshToken": "R2" })).unwrap();
        assert_eq!(resp.access_token, "A2");
        assert_eq!(resp.refresh_token, "R2");
        assert!(resp.user.is_none());
    }

    #[test]
    fn refresh_response_with_incomplete_profile_keeps_the_pair() {
        let resp: TokenRefreshResponse = serde_json::from_value(json!({
            "accessToken": "A2",
            "refreshToken": "R2",
            "user": { "id": "u1", "username": "alice" }
        }))
        .unwrap();
        assert_eq!(resp.access_token, "A2");
        assert_eq!(resp.refresh_token, "R2");
        assert!(resp.user.is_none());

        let resp: TokenRefreshResponse = serde_json::from_value(json!({
            "accessToken": "A3",
            "refreshToken": "R3",
            "user": null
        }))
        .unwrap();
        assert!(resp.user.is_none());
    }

    #[test]
    fn authentication_response_defaults_token_type() {
        let resp: AuthenticationResponse = serde_json::from_value(json!({
            "accessToken": "A1",
            "refreshToken": "R1",
            "user": {
                "id": "u1",
                "username": "alice",
                "email": "alice@example.com",
                "firstName": "Alice",
                "lastName": "Liddell",
                "createdAt": "2024-01-01T00:00:00Z"
            }
        }))
        .unwrap();
        assert_eq!(resp.token_type, "Bearer");
        assert_eq!(resp.user.username, "alice");
        assert!(resp.user.roles.is_empty());

        let refreshed = TokenRefreshResponse::from(resp);
        assert_eq!(refreshed.user.unwrap().username, "alice");
    }
}
