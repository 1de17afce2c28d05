//! Canonical REST paths for the Expensa API.
//!
//! Every path the console sends goes through [`ApiPaths`], relative to the
//! configured base URL (see [`crate::ClientConfig`]).  Identifiers are
//! percent-encoded so that an id can never inject extra path segments.
//!
//! # Path layout
//!
//! ```text
//! /auth/{login,register,refresh}         ← credential exchange
//! /{resource}                            ← collection (GET list, POST create)
//! /{resource}/{id}                       ← item (GET, PUT, PATCH, DELETE)
//! /{resource}/{id}/{action}              ← state transition (POST)
//! ```

use expensa_models::{ExpenseId, ExpenseStatus, UserId};

/// Top-level REST resources exposed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
pub enum Resource {
    /// `/users`
    Users,
    /// `/roles`
    Roles,
    /// `/departments`
    Departments,
    /// `/segments`
    Segments,
    /// `/expenses`
    Expenses,
    /// `/budgets`
    Budgets,
    /// `/budget-thresholds`
    BudgetThresholds,
    /// `/budget-alerts`
    BudgetAlerts,
    /// `/workflows`
    Workflows,
    /// `/workflow-history`
    WorkflowHistory,
    /// `/comments`
    Comments,
    /// `/reports`
    Reports,
    /// `/report-templates`
    ReportTemplates,
    /// `/dashboards`
    Dashboards,
    /// `/dashboard-widgets`
    DashboardWidgets,
    /// `/analytics`
    Analytics,
}

impl Resource {
    /// Collection path, with leading slash.
    pub fn root(self) -> &'static str {
        match self {
            Self::Users => "/users",
            Self::Roles => "/roles",
            Self::Departments => "/departments",
            Self::Segments => "/segments",
            Self::Expenses => "/expenses",
            Self::Budgets => "/budgets",
            Self::BudgetThresholds => "/budget-thresholds",
            Self::BudgetAlerts => "/budget-alerts",
            Self::Workflows => "/workflows",
            Self::WorkflowHistory => "/workflow-history",
            Self::Comments => "/comments",
            Self::Reports => "/reports",
            Self::ReportTemplates => "/report-templates",
            Self::Dashboards => "/dashboards",
            Self::DashboardWidgets => "/dashboard-widgets",
            Self::Analytics => "/analytics",
        }
    }
}

/// Central authority for API paths.
///
/// # Examples
///
/// ```
/// use expensa_sdk::{ApiPaths, Resource};
/// use expensa_models::ExpenseId;
///
/// assert_eq!(ApiPaths::LOGIN, "/auth/login");
/// assert_eq!(ApiPaths::item(Resource::Budgets, "b1"), "/budgets/b1");
/// assert_eq!(
///     ApiPaths::expense_approve(&ExpenseId::new("e7")),
///     "/expenses/e7/approve",
/// );
/// ```
pub struct ApiPaths;

impl ApiPaths {
    // ------------------------------------------------------------------
    // Authentication
    // ------------------------------------------------------------------

    /// Exchange user credentials for a credential pair.
    pub const LOGIN: &'static str = "/auth/login";
    /// Create an account and receive a credential pair.
    pub const REGISTER: &'static str = "/auth/register";
    /// Exchange a refresh token for a new credential pair.
    pub const REFRESH: &'static str = "/auth/refresh";

    // ------------------------------------------------------------------
    // Generic builders
    // ------------------------------------------------------------------

    /// Collection path of a resource.
    pub fn collection(resource: Resource) -> String {
        resource.root().to_string()
    }

    /// Path of a single item.
    pub fn item(resource: Resource, id: &str) -> String {
        format!("{}/{}", resource.root(), encode(id))
    }

    /// Path of an action on a single item, e.g. `/budgets/{id}/activate`.
    pub fn action(resource: Resource, id: &str, action: &str) -> String {
        format!("{}/{}/{action}", resource.root(), encode(id))
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// `/users/{id}`
    pub fn user(id: &UserId) -> String {
        Self::item(Resource::Users, id.as_str())
    }

    // ------------------------------------------------------------------
    // Expenses
    // ------------------------------------------------------------------

    /// `/expenses/{id}`
    pub fn expense(id: &ExpenseId) -> String {
        Self::item(Resource::Expenses, id.as_str())
    }

    /// `/expenses/{id}/submit`
    pub fn expense_submit(id: &ExpenseId) -> String {
        Self::action(Resource::Expenses, id.as_str(), "submit")
    }

    /// `/expenses/{id}/approve`
    pub fn expense_approve(id: &ExpenseId) -> String {
        Self::action(Resource::Expenses, id.as_str(), "approve")
    }

    /// `/expenses/{id}/reject`
    pub fn expense_reject(id: &ExpenseId) -> String {
        Self::action(Resource::Expenses, id.as_str(), "reject")
    }

    /// `/expenses/status/{status}`
    pub fn expenses_by_status(status: ExpenseStatus) -> String {
        format!("{}/status/{status}", Resource::Expenses.root())
    }

    /// `/expenses/submitter/{id}`
    pub fn expenses_by_submitter(submitter: &UserId) -> String {
        format!(
            "{}/submitter/{}",
            Resource::Expenses.root(),
            encode(submitter.as_str())
        )
    }

    /// `/expenses/pending-approvals`
    pub fn expenses_pending_approvals() -> String {
        format!("{}/pending-approvals", Resource::Expenses.root())
    }

    // ------------------------------------------------------------------
    // Analytics
    // ------------------------------------------------------------------

    /// `/analytics/{sub}`, e.g. `aggregate/department` or `snapshots/latest`.
    pub fn analytics(sub: &str) -> String {
        format!("{}/{}", Resource::Analytics.root(), sub.trim_start_matches('/'))
    }
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
