#![deny(missing_docs)]

//! # Expensa Models
//!
//! Data types exchanged with the Expensa expense-management API.
//!
//! ## Module layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`auth`] | Login / register / refresh payloads and the `User` identity snapshot |
//! | [`expense`] | Expense reports, statuses and segment allocations |
//! | [`ids`] | String-backed identifiers (`UserId`, `ExpenseId`) |
//! | [`error`] | Client-side validation errors |

pub mod auth;
pub mod error;
pub mod expense;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use auth::*;
pub use error::*;
pub use expense::*;
pub use ids::*;
