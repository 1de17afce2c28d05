//! In-process stand-in for the Expensa REST API.
//!
//! Issues, rotates and expires credential pairs so the SDK and the console
//! can be exercised end to end without the real backend.
//!
//! | Route                                | Auth    | Notes                        |
//! |--------------------------------------|---------|------------------------------|
//! | `POST /auth/register`                | none    | 201, 409 on duplicate        |
//! | `POST /auth/login`                   | none    | 401 on bad credentials       |
//! | `POST /auth/refresh`                 | refresh | rotates, old token consumed  |
//! | `GET /users`, `GET /users/{id}`      | access  |                              |
//! | `GET`/`POST /expenses`               | access  | 400 if allocations != 100%   |
//! | `GET`/`DELETE /expenses/{id}`        | access  | DELETE answers 204           |
//! | `POST /expenses/{id}/submit`         | access  | submitter only               |
//! | `POST /expenses/{id}/approve`        | access  | needs `EXPENSE_APPROVE`      |
//! | `POST /expenses/{id}/reject`         | access  | needs `EXPENSE_APPROVE`      |
//!
//! Every route is nested under [`API_PREFIX`].

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

pub use config::{MockConfig, API_PREFIX};
pub use error::ApiError;
pub use state::MockState;

/// Build the router, with every route under [`API_PREFIX`].
pub fn router(state: Arc<MockState>) -> Router {
    let api = Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/users", get(handlers::list_users))
        .route("/users/{id}", get(handlers::get_user))
        .route(
            "/expenses",
            get(handlers::list_expenses).post(handlers::create_expense),
        )
        .route("/expenses/status/{status}", get(handlers::expenses_by_status))
        .route("/expenses/pending-approvals", get(handlers::pending_approvals))
        .route(
            "/expenses/{id}",
            get(handlers::get_expense).delete(handlers::delete_expense),
        )
        .route("/expenses/{id}/submit", post(handlers::submit_expense))
        .route("/expenses/{id}/approve", post(handlers::approve_expense))
        .route("/expenses/{id}/reject", post(handlers::reject_expense))
        .with_state(state);

    Router::new().nest(API_PREFIX, api)
}

/// Serve `state` on an already-bound listener until the task is dropped.
///
/// # Errors
///
/// Any I/O error from the accept loop.
pub async fn serve(listener: TcpListener, state: Arc<MockState>) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}

/// Bind an ephemeral port on `127.0.0.1` and serve `state` in the background.
///
/// Returns the API base URL (prefix included), e.g.
/// `http://127.0.0.1:49152/api/v1`.
///
/// # Errors
///
/// If the listener cannot be bound.
pub async fn spawn(state: Arc<MockState>) -> std::io::Result<String> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = serve(listener, state).await {
            tracing::error!(error = %e, "mock API stopped");
        }
    });
    Ok(format!("http://{addr}{API_PREFIX}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
