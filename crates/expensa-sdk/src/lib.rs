//! # Expensa SDK
//!
//! Client library for the **Expensa** expense-management REST API.
//!
//! The SDK provides:
//!
//! * [`ApiClient`]: JSON-over-HTTP client that attaches the stored bearer
//!   token and transparently refreshes it once per call on a 401.
//! * [`AuthService`]: login, registration, logout and permission checks
//!   against the cached identity snapshot.
//! * [`SessionStore`]: injected storage for the credential pair, with
//!   [`MemorySessionStore`] and [`FileSessionStore`] implementations.
//! * [`ApiPaths`]: canonical REST paths shared by clients and servers.
//! * [`SdkError`]: unified error type for all SDK operations.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use expensa_models::LoginRequest;
//! use expensa_sdk::{ApiClient, AuthService, ClientConfig, FileSessionStore, SdkError};
//!
//! # async fn run() -> Result<(), SdkError> {
//! let store = Arc::new(FileSessionStore::in_config_dir()?);
//! let auth = AuthService::new(ApiClient::new(ClientConfig::from_env(), store)?);
//! auth.login(&LoginRequest::new("alice", "p1")).await?;
//!
//! match auth.client().get::<serde_json::Value>("/expenses").await {
//!     Ok(expenses) => println!("{expenses}"),
//!     Err(SdkError::SessionExpired { .. }) => println!("please log in again"),
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod paths;
pub mod session;

pub use auth::AuthService;
pub use client::{ApiClient, RequestOptions};
pub use config::ClientConfig;
pub use error::SdkError;
pub use paths::{ApiPaths, Resource};
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore};
