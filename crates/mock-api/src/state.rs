//! In-memory accounts, tokens and expenses.
//!
//! Tokens are opaque random strings.  Each refresh consumes the presented
//! refresh token and issues a brand-new pair, so a replayed refresh token
//! is rejected like an unknown one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use expensa_models::{
    AuthenticationResponse, CreateExpenseRequest, Expense, ExpenseId, ExpenseStatus, LoginRequest,
    Permission, RegisterRequest, Role, SegmentAllocation, User, UserId,
};

use crate::config::MockConfig;
use crate::error::ApiError;

/// Permission needed to approve or reject expenses.
pub const EXPENSE_APPROVE: &str = "EXPENSE_APPROVE";

const ADMIN_PERMISSIONS: &[&str] = &[
    "USER_CREATE",
    "USER_UPDATE",
    "USER_DELETE",
    "DEPARTMENT_CREATE",
    "DEPARTMENT_UPDATE",
    "DEPARTMENT_DELETE",
    "EXPENSE_CREATE",
    EXPENSE_APPROVE,
];

const EMPLOYEE_PERMISSIONS: &[&str] = &["EXPENSE_CREATE"];

struct Account {
    user: User,
    password: String,
}

struct AccessGrant {
    user_id: UserId,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    accounts: Vec<Account>,
    access_tokens: HashMap<String, AccessGrant>,
    refresh_tokens: HashMap<String, UserId>,
    expenses: Vec<Expense>,
}

/// Shared state behind every mock handler.
pub struct MockState {
    config: MockConfig,
    inner: Mutex<Inner>,
    refresh_exchanges: AtomicUsize,
}

impl MockState {
    /// Empty state: no accounts, no tokens.
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
            refresh_exchanges: AtomicUsize::new(0),
        }
    }

    /// State seeded with `alice` / `p1` (administrator, may approve) and
    /// `eve` / `p2` (employee, may only create expenses).
    pub fn seeded(config: MockConfig) -> Self {
        let state = Self::new(config);
        {
            let mut inner = state.lock();
            inner.accounts.push(Account {
                user: new_user("alice", "alice@example.com", "Alice", "Liddell", None, "ADMIN"),
                password: "p1".into(),
            });
            inner.accounts.push(Account {
                user: new_user("eve", "eve@example.com", "Eve", "Moneypenny", None, "EMPLOYEE"),
                password: "p2".into(),
            });
        }
        state
    }

    /// The configuration this state was built with.
    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Authentication
    // ------------------------------------------------------------------

    /// Create an account and sign it in.
    ///
    /// # Errors
    ///
    /// [`ApiError::Validation`] for blank fields, [`ApiError::Conflict`] if
    /// the username or e-mail is taken.
    pub fn register(&self, req: &RegisterRequest) -> Result<AuthenticationResponse, ApiError> {
        req.validate()?;
        let mut inner = self.lock();
        if inner
            .accounts
            .iter()
            .any(|a| a.user.username == req.username || a.user.email == req.email)
        {
            return Err(ApiError::Conflict(format!(
                "username or email already registered: {}",
                req.username
            )));
        }

        let user = new_user(
            &req.username,
            &req.email,
            &req.first_name,
            &req.last_name,
            req.phone_number.clone(),
            "EMPLOYEE",
        );
        inner.accounts.push(Account {
            user: user.clone(),
            password: req.password.clone(),
        });
        Ok(self.issue(&mut inner, user))
    }

    /// Check credentials and issue a new pair.
    ///
    /// # Errors
    ///
    /// [`ApiError::Unauthorized`] for an unknown login or wrong password.
    pub fn login(&self, req: &LoginRequest) -> Result<AuthenticationResponse, ApiError> {
        let mut inner = self.lock();
        let user = inner
            .accounts
            .iter()
            .find(|a| {
                (a.user.username == req.username_or_email || a.user.email == req.username_or_email)
                    && a.password == req.password
            })
            .map(|a| a.user.clone())
            .ok_or_else(|| ApiError::Unauthorized("invalid username or password".into()))?;
        Ok(self.issue(&mut inner, user))
    }

    /// Consume `refresh_token` and issue a new pair.
    ///
    /// # Errors
    ///
    /// [`ApiError::Unauthorized`] for an unknown or already used token.
    pub fn refresh(&self, refresh_token: &str) -> Result<AuthenticationResponse, ApiError> {
        self.refresh_exchanges.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.lock();
        let user_id = inner
            .refresh_tokens
            .remove(refresh_token)
            .ok_or_else(|| ApiError::Unauthorized("invalid refresh token".into()))?;
        let user = find_user(&inner, &user_id)?;
        Ok(self.issue(&mut inner, user))
    }

    /// Resolve a bearer access token to its user.
    ///
    /// # Errors
    ///
    /// [`ApiError::Unauthorized`] for an unknown or expired token.
    pub fn authenticate(&self, access_token: &str) -> Result<User, ApiError> {
        let inner = self.lock();
        let grant = inner
            .access_tokens
            .get(access_token)
            .ok_or_else(|| ApiError::Unauthorized("invalid access token".into()))?;
        if grant.expires_at <= Utc::now() {
            return Err(ApiError::Unauthorized("access token expired".into()));
        }
        find_user(&inner, &grant.user_id)
    }

    /// Invalidate every access token issued so far; refresh tokens stay valid.
    pub fn expire_access_tokens(&self) {
        self.lock().access_tokens.clear();
    }

    /// Invalidate every refresh token issued so far.
    pub fn revoke_refresh_tokens(&self) {
        self.lock().refresh_tokens.clear();
    }

    /// Number of `/auth/refresh` calls served, successful or not.
    pub fn refresh_exchanges(&self) -> usize {
        self.refresh_exchanges.load(Ordering::SeqCst)
    }

    fn issue(&self, inner: &mut Inner, user: User) -> AuthenticationResponse {
        let access_token = format!("at_{}", Uuid::new_v4().simple());
        let refresh_token = format!("rt_{}", Uuid::new_v4().simple());
        let ttl = self.config.access_token_ttl_secs;
        let now = Utc::now();
        let expires_at = i64::try_from(ttl)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        inner.access_tokens.retain(|_, grant| grant.expires_at > now);
        inner.access_tokens.insert(
            access_token.clone(),
            AccessGrant {
                user_id: user.id.clone(),
                expires_at,
            },
        );
        inner
            .refresh_tokens
            .insert(refresh_token.clone(), user.id.clone());

        tracing::info!(user = %user.username, "credential pair issued");
        AuthenticationResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".into(),
            expires_in: ttl,
            user,
        }
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Every account's profile.
    pub fn users(&self) -> Vec<User> {
        self.lock().accounts.iter().map(|a| a.user.clone()).collect()
    }

    /// One account's profile.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] if no such user.
    pub fn user(&self, id: &UserId) -> Result<User, ApiError> {
        find_user(&self.lock(), id)
    }

    // ------------------------------------------------------------------
    // Expenses
    // ------------------------------------------------------------------

    /// All expenses, oldest first.
    pub fn expenses(&self) -> Vec<Expense> {
        self.lock().expenses.clone()
    }

    /// One expense.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] if no such expense.
    pub fn expense(&self, id: &ExpenseId) -> Result<Expense, ApiError> {
        self.lock()
            .expenses
            .iter()
            .find(|e| &e.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("expense {id}")))
    }

    /// Record a new expense in `DRAFT` state.
    ///
    /// # Errors
    ///
    /// [`ApiError::Validation`] if the allocations do not sum to 100%.
    pub fn create_expense(
        &self,
        submitter: &User,
        req: CreateExpenseRequest,
    ) -> Result<Expense, ApiError> {
        req.validate()?;
        let allocations = req
            .segment_allocations
            .iter()
            .map(|a| SegmentAllocation {
                id: Uuid::new_v4().to_string(),
                segment_id: a.segment_id.clone(),
                segment_name: String::new(),
                segment_code: String::new(),
                amount: req.total_amount * a.percentage / 100.0,
                percentage: a.percentage,
                description: a.description.clone(),
            })
            .collect();

        let expense = Expense {
            id: ExpenseId::from(Uuid::new_v4().to_string()),
            submitter_id: submitter.id.clone(),
            submitter_name: submitter.full_name.clone(),
            expense_date: req.expense_date,
            vendor: req.vendor,
            total_amount: req.total_amount,
            currency: req.currency,
            description: req.description,
            status: ExpenseStatus::Draft,
            submission_date: None,
            approval_date: None,
            rejection_reason: None,
            segment_allocations: allocations,
            created_at: now(),
            updated_at: None,
        };
        self.lock().expenses.push(expense.clone());
        Ok(expense)
    }

    /// Move an expense from `DRAFT` to `SUBMITTED`.  Only its submitter may.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden` for another user's expense, `Conflict` if not a draft.
    pub fn submit_expense(&self, actor: &User, id: &ExpenseId) -> Result<Expense, ApiError> {
        self.transition(id, |expense| {
            if expense.submitter_id != actor.id {
                return Err(ApiError::Forbidden("only the submitter may submit".into()));
            }
            if expense.status != ExpenseStatus::Draft {
                return Err(ApiError::Conflict(format!("expense is {}", expense.status)));
            }
            expense.status = ExpenseStatus::Submitted;
            expense.submission_date = Some(now());
            Ok(())
        })
    }

    /// Approve a submitted expense.
    ///
    /// # Errors
    ///
    /// `Forbidden` without [`EXPENSE_APPROVE`], `NotFound`, `Conflict` if not submitted.
    pub fn approve_expense(&self, actor: &User, id: &ExpenseId) -> Result<Expense, ApiError> {
        require(actor, EXPENSE_APPROVE)?;
        self.transition(id, |expense| {
            if expense.status != ExpenseStatus::Submitted {
                return Err(ApiError::Conflict(format!("expense is {}", expense.status)));
            }
            expense.status = ExpenseStatus::Approved;
            expense.approval_date = Some(now());
            Ok(())
        })
    }

    /// Reject a submitted expense with a reason.
    ///
    /// # Errors
    ///
    /// Same as [`approve_expense`](Self::approve_expense).
    pub fn reject_expense(
        &self,
        actor: &User,
        id: &ExpenseId,
        reason: &str,
    ) -> Result<Expense, ApiError> {
        require(actor, EXPENSE_APPROVE)?;
        self.transition(id, |expense| {
            if expense.status != ExpenseStatus::Submitted {
                return Err(ApiError::Conflict(format!("expense is {}", expense.status)));
            }
            expense.status = ExpenseStatus::Rejected;
            expense.rejection_reason = Some(reason.to_string());
            Ok(())
        })
    }

    /// Delete a draft expense owned by `actor`.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden` for another user's expense, `Conflict` if not a draft.
    pub fn delete_expense(&self, actor: &User, id: &ExpenseId) -> Result<(), ApiError> {
        let mut inner = self.lock();
        let idx = inner
            .expenses
            .iter()
            .position(|e| &e.id == id)
            .ok_or_else(|| ApiError::NotFound(format!("expense {id}")))?;
        let expense = &inner.expenses[idx];
        if expense.submitter_id != actor.id {
            return Err(ApiError::Forbidden("only the submitter may delete".into()));
        }
        if expense.status != ExpenseStatus::Draft {
            return Err(ApiError::Conflict(format!("expense is {}", expense.status)));
        }
        inner.expenses.remove(idx);
        Ok(())
    }

    fn transition(
        &self,
        id: &ExpenseId,
        apply: impl FnOnce(&mut Expense) -> Result<(), ApiError>,
    ) -> Result<Expense, ApiError> {
        let mut inner = self.lock();
        let expense = inner
            .expenses
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| ApiError::NotFound(format!("expense {id}")))?;
        apply(expense)?;
        expense.updated_at = Some(now());
        Ok(expense.clone())
    }
}

fn require(user: &User, permission: &str) -> Result<(), ApiError> {
    if user.has_permission(permission) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("missing permission {permission}")))
    }
}

fn find_user(inner: &Inner, id: &UserId) -> Result<User, ApiError> {
    inner
        .accounts
        .iter()
        .find(|a| &a.user.id == id)
        .map(|a| a.user.clone())
        .ok_or_else(|| ApiError::NotFound(format!("user {id}")))
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn new_user(
    username: &str,
    email: &str,
    first_name: &str,
    last_name: &str,
    phone_number: Option<String>,
    role_type: &str,
) -> User {
    let permissions = if role_type == "ADMIN" {
        ADMIN_PERMISSIONS
    } else {
        EMPLOYEE_PERMISSIONS
    };
    let role = Role {
        id: Uuid::new_v4().to_string(),
        name: role_type.to_lowercase(),
        role_type: role_type.to_string(),
        description: String::new(),
        permissions: permissions
            .iter()
            .map(|kind| {
                let (resource, action) = kind.split_once('_').unwrap_or((kind, ""));
                Permission {
                    id: Uuid::new_v4().to_string(),
                    permission_type: (*kind).to_string(),
                    description: String::new(),
                    resource: resource.to_string(),
                    action: action.to_string(),
                }
            })
            .collect(),
    };

    User {
        id: UserId::from(Uuid::new_v4().to_string()),
        username: username.to_string(),
        email: email.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        phone_number,
        department_id: None,
        department_name: None,
        roles: vec![role],
        is_active: true,
        account_locked: false,
        created_at: now(),
        updated_at: None,
        full_name: format!("{first_name} {last_name}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use expensa_models::SegmentAllocationRequest;

    fn state() -> MockState {
        MockState::seeded(MockConfig::default())
    }

    fn expense_request(percentages: &[f64]) -> CreateExpenseRequest {
        CreateExpenseRequest {
            expense_date: "2024-05-02".into(),
            vendor: Some("Taxi".into()),
            total_amount: 80.0,
            currency: "EUR".into(),
            description: None,
            segment_allocations: percentages
                .iter()
                .map(|p| SegmentAllocationRequest {
                    segment_id: "seg-1".into(),
                    percentage: *p,
                    description: None,
                })
                .collect(),
        }
    }

    #[test]
    fn login_by_username_or_email() {
        let state = state();
        assert!(state.login(&LoginRequest::new("alice", "p1")).is_ok());
        assert!(state.login(&LoginRequest::new("alice@example.com", "p1")).is_ok());
        assert!(matches!(
            state.login(&LoginRequest::new("alice", "nope")),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn refresh_rotates_and_consumes() {
        let state = state();
        let first = state.login(&LoginRequest::new("alice", "p1")).unwrap();
        let second = state.refresh(&first.refresh_token).unwrap();

        assert_ne!(first.access_token, second.access_token);
        assert!(state.authenticate(&second.access_token).is_ok());
        assert!(matches!(
            state.refresh(&first.refresh_token),
            Err(ApiError::Unauthorized(_))
        ));
        assert_eq!(state.refresh_exchanges(), 2);
    }

    #[test]
    fn expired_access_tokens_are_rejected() {
        let state = state();
        let pair = state.login(&LoginRequest::new("alice", "p1")).unwrap();
        state.expire_access_tokens();
        assert!(state.authenticate(&pair.access_token).is_err());
        assert!(state.refresh(&pair.refresh_token).is_ok());
    }

    #[test]
    fn zero_ttl_tokens_expire_immediately() {
        let state = MockState::seeded(MockConfig {
            listen_port: 0,
            access_token_ttl_secs: 0,
        });
        let pair = state.login(&LoginRequest::new("alice", "p1")).unwrap();
        assert!(matches!(
            state.authenticate(&pair.access_token),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_grants_are_pruned_on_issue() {
        let state = MockState::seeded(MockConfig {
            listen_port: 0,
            access_token_ttl_secs: 0,
        });
        state.login(&LoginRequest::new("alice", "p1")).unwrap();
        state.login(&LoginRequest::new("eve", "p2")).unwrap();
        state.login(&LoginRequest::new("alice", "p1")).unwrap();
        assert_eq!(state.lock().access_tokens.len(), 1);
    }

    #[test]
    fn huge_ttl_is_clamped() {
        let state = MockState::seeded(MockConfig {
            listen_port: 0,
            access_token_ttl_secs: u64::MAX,
        });
        let pair = state.login(&LoginRequest::new("alice", "p1")).unwrap();
        assert_eq!(pair.expires_in, u64::MAX);
        assert!(state.authenticate(&pair.access_token).is_ok());

        let state = MockState::seeded(MockConfig {
            listen_port: 0,
            access_token_ttl_secs: 1 << 50,
        });
        let pair = state.login(&LoginRequest::new("alice", "p1")).unwrap();
        assert!(state.authenticate(&pair.access_token).is_ok());
    }

    #[test]
    fn register_rejects_duplicates() {
        let state = state();
        let req = RegisterRequest {
            username: "alice".into(),
            email: "other@example.com".into(),
            password: "x".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            phone_number: None,
        };
        assert!(matches!(state.register(&req), Err(ApiError::Conflict(_))));
    }

    #[test]
    fn expense_workflow() {
        let state = state();
        let alice = state.login(&LoginRequest::new("alice", "p1")).unwrap().user;
        let eve = state.login(&LoginRequest::new("eve", "p2")).unwrap().user;

        assert!(matches!(
            state.create_expense(&eve, expense_request(&[50.0, 40.0])),
            Err(ApiError::Validation(_))
        ));

        let expense = state
            .create_expense(&eve, expense_request(&[50.0, 50.0]))
            .unwrap();
        assert_eq!(expense.status, ExpenseStatus::Draft);
        assert!((expense.segment_allocations[0].amount - 40.0).abs() < f64::EPSILON);

        // Approval needs the expense to be submitted first.
        assert!(matches!(
            state.approve_expense(&alice, &expense.id),
            Err(ApiError::Conflict(_))
        ));
        state.submit_expense(&eve, &expense.id).unwrap();

        assert!(matches!(
            state.approve_expense(&eve, &expense.id),
            Err(ApiError::Forbidden(_))
        ));
        let approved = state.approve_expense(&alice, &expense.id).unwrap();
        assert_eq!(approved.status, ExpenseStatus::Approved);
        assert!(approved.approval_date.is_some());
    }

    #[test]
    fn only_drafts_of_the_owner_can_be_deleted() {
        let state = state();
        let alice = state.login(&LoginRequest::new("alice", "p1")).unwrap().user;
        let eve = state.login(&LoginRequest::new("eve", "p2")).unwrap().user;
        let expense = state
            .create_expense(&eve, expense_request(&[100.0]))
            .unwrap();

        assert!(matches!(
            state.delete_expense(&alice, &expense.id),
            Err(ApiError::Forbidden(_))
        ));
        state.delete_expense(&eve, &expense.id).unwrap();
        assert!(state.expenses().is_empty());
    }
}
