//! SDK against the in-process mock API: real token issue, expiry and rotation.

use std::sync::Arc;

use expensa_models::{
    CreateExpenseRequest, Expense, ExpenseStatus, LoginRequest, SegmentAllocationRequest, User,
};
use expensa_sdk::{
    ApiClient, ApiPaths, AuthService, ClientConfig, MemorySessionStore, Resource, SdkError,
    SessionStore,
};
use mock_api::{MockConfig, MockState};

async fn signed_in(
    user: &str,
    password: &str,
) -> (Arc<MockState>, AuthService, Arc<MemorySessionStore>) {
    let state = Arc::new(MockState::seeded(MockConfig::default()));
    let base = mock_api::spawn(state.clone()).await.unwrap();
    let store = Arc::new(MemorySessionStore::new());
    let client = ApiClient::new(ClientConfig::new(base), store.clone()).unwrap();
    let auth = AuthService::new(client);
    auth.login(&LoginRequest::new(user, password)).await.unwrap();
    (state, auth, store)
}

fn expense(percentages: &[f64]) -> CreateExpenseRequest {
    CreateExpenseRequest {
        expense_date: "2024-05-02".into(),
        vendor: Some("Rail".into()),
        total_amount: 120.0,
        currency: "EUR".into(),
        description: Some("Lyon trip".into()),
        segment_allocations: percentages
            .iter()
            .map(|p| SegmentAllocationRequest {
                segment_id: "travel".into(),
                percentage: *p,
                description: None,
            })
            .collect(),
    }
}

#[tokio::test]
async fn expired_access_token_is_refreshed_transparently() {
    let (state, auth, store) = signed_in("alice", "p1").await;
    let before = store.get().unwrap();
    assert!(auth.has_permission("EXPENSE_APPROVE"));

    state.expire_access_tokens();

    let users: Vec<User> = auth
        .client()
        .get(&ApiPaths::collection(Resource::Users))
        .await
        .unwrap();
    assert_eq!(users.len(), 2);

    let after = store.get().unwrap();
    assert_ne!(after.access_token, before.access_token);
    assert_ne!(after.refresh_token, before.refresh_token);
    assert_eq!(after.user.unwrap().username, "alice");
    assert_eq!(state.refresh_exchanges(), 1);
}

#[tokio::test]
async fn revoked_refresh_token_expires_the_session() {
    let (state, auth, store) = signed_in("alice", "p1").await;
    state.expire_access_tokens();
    state.revoke_refresh_tokens();

    let err = auth
        .client()
        .get::<Vec<User>>(&ApiPaths::collection(Resource::Users))
        .await
        .unwrap_err();

    assert!(err.is_session_expired());
    assert!(store.get().is_none());
    assert!(!auth.is_authenticated());
}

#[tokio::test]
async fn concurrent_calls_share_one_refresh() {
    let (state, auth, _store) = signed_in("alice", "p1").await;
    state.expire_access_tokens();

    let path = ApiPaths::collection(Resource::Users);
    let client = auth.client();
    let (a, b, c) = tokio::join!(
        client.get::<Vec<User>>(&path),
        client.get::<Vec<User>>(&path),
        client.get::<Vec<User>>(&path),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(state.refresh_exchanges(), 1);
}

#[tokio::test]
async fn expense_lifecycle_through_the_client() {
    let (_state, eve, _) = signed_in("eve", "p2").await;
    let created: Expense = eve
        .client()
        .post(&ApiPaths::collection(Resource::Expenses), &expense(&[70.0, 30.0]))
        .await
        .unwrap();
    assert_eq!(created.status, ExpenseStatus::Draft);

    let submitted: Expense = eve
        .client()
        .post_empty(&ApiPaths::expense_submit(&created.id))
        .await
        .unwrap();
    assert_eq!(submitted.status, ExpenseStatus::Submitted);

    // Approval is a server decision, not a session problem.
    let err = eve
        .client()
        .post_empty::<Expense>(&ApiPaths::expense_approve(&created.id))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(reqwest::StatusCode::FORBIDDEN));
    assert!(eve.is_authenticated());
}

#[tokio::test]
async fn server_rejects_unbalanced_allocations() {
    let (_state, auth, _) = signed_in("alice", "p1").await;

    let err = auth
        .client()
        .post::<Expense, _>(&ApiPaths::collection(Resource::Expenses), &expense(&[50.0]))
        .await
        .unwrap_err();

    match err {
        SdkError::Status { status, body } => {
            assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
            assert!(body.contains("current sum: 50%"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
