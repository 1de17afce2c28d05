//! Expense reports and their segment allocations.
//!
//! An expense is split across one or more accounting segments.  Each
//! allocation carries a percentage of the total, and the percentages of a
//! single expense must add up to exactly 100.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::ids::{ExpenseId, UserId};

/// Accumulated floating-point error tolerated when summing percentages.
const PERCENT_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// ExpenseStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of an expense report.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ExpenseStatus {
    /// Being edited by the submitter.
    Draft,
    /// Waiting in the approval workflow.
    Submitted,
    /// Accepted by every approval step.
    Approved,
    /// Refused by an approver.
    Rejected,
    /// Reimbursed.
    Paid,
}

// ---------------------------------------------------------------------------
// Allocations
// ---------------------------------------------------------------------------

/// Share of an expense charged to one segment, as sent by the client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SegmentAllocationRequest {
    /// Target segment.
    pub segment_id: String,
    /// Share of the total, in percent.
    pub percentage: f64,
    /// Optional free-text note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Share of an expense charged to one segment, as stored by the server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SegmentAllocation {
    /// Server-side identifier.
    pub id: String,
    /// Target segment.
    pub segment_id: String,
    /// Segment display name.
    #[serde(default)]
    pub segment_name: String,
    /// Segment accounting code.
    #[serde(default)]
    pub segment_code: String,
    /// Amount charged to the segment.
    pub amount: f64,
    /// Share of the total, in percent.
    pub percentage: f64,
    /// Optional free-text note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Check that allocation percentages sum to exactly 100.
///
/// # Errors
///
/// Returns [`ModelError::AllocationSum`] carrying the actual total otherwise
/// (an empty list totals 0).
///
/// ```
/// use expensa_models::{validate_allocations, SegmentAllocationRequest};
///
/// let half = |id: &str| SegmentAllocationRequest {
///     segment_id: id.into(),
///     percentage: 50.0,
///     description: None,
/// };
/// assert!(validate_allocations(&[half("a"), half("b")]).is_ok());
/// assert!(validate_allocations(&[half("a")]).is_err());
/// ```
pub fn validate_allocations(allocations: &[SegmentAllocationRequest]) -> Result<(), ModelError> {
    let total: f64 = allocations.iter().map(|a| a.percentage).sum();
    if (total - 100.0).abs() <= PERCENT_EPSILON {
        Ok(())
    } else {
        Err(ModelError::AllocationSum { total })
    }
}

// ---------------------------------------------------------------------------
// Expense
// ---------------------------------------------------------------------------

/// Body of `POST /expenses`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpenseRequest {
    /// Date the expense was incurred (`YYYY-MM-DD`).
    pub expense_date: String,
    /// Merchant name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    /// Total amount in `currency`.
    pub total_amount: f64,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Optional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// How the total is split across segments.
    pub segment_allocations: Vec<SegmentAllocationRequest>,
}

impl CreateExpenseRequest {
    /// Validate the request before it is sent.
    ///
    /// # Errors
    ///
    /// See [`validate_allocations`].
    pub fn validate(&self) -> Result<(), ModelError> {
        validate_allocations(&self.segment_allocations)
    }
}

/// Body of `POST /expenses/{id}/reject`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RejectExpenseRequest {
    /// Why the approver refused the expense.
    pub reason: String,
}

/// An expense report as returned by the server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    /// Identifier.
    pub id: ExpenseId,
    /// Author of the report.
    pub submitter_id: UserId,
    /// Author display name.
    #[serde(default)]
    pub submitter_name: String,
    /// Date the expense was incurred.
    pub expense_date: String,
    /// Merchant name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    /// Total amount in `currency`.
    pub total_amount: f64,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Optional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Current lifecycle state.
    pub status: ExpenseStatus,
    /// When the report entered the workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_date: Option<String>,
    /// When the report was approved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_date: Option<String>,
    /// Set when the report was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// Split across segments.
    #[serde(default)]
    pub segment_allocations: Vec<SegmentAllocation>,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last modification timestamp (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn alloc(percentage: f64) -> SegmentAllocationRequest {
        SegmentAllocationRequest {
            segment_id: "seg".into(),
            percentage,
            description: None,
        }
    }

    #[test]
    fn allocations_summing_to_100_are_valid() {
        assert!(validate_allocations(&[alloc(100.0)]).is_ok());
        assert!(validate_allocations(&[alloc(25.0), alloc(75.0)]).is_ok());
    }

    #[test]
    fn fractional_allocations_tolerate_rounding() {
        // 33.33 + 33.33 + 33.34 accumulates binary rounding error.
        assert!(validate_allocations(&[alloc(33.33), alloc(33.33), alloc(33.34)]).is_ok());
        assert!(validate_allocations(&[alloc(0.1), alloc(0.2), alloc(99.7)]).is_ok());
    }

    #[test]
    fn wrong_sum_reports_total() {
        let err = validate_allocations(&[alloc(40.0), alloc(50.0)]).unwrap_err();
        assert_eq!(err, ModelError::AllocationSum { total: 90.0 });
        assert_eq!(
            err.to_string(),
            "segment allocations must sum to 100%, current sum: 90%"
        );
    }

    #[test]
    fn empty_allocations_are_invalid() {
        let err = validate_allocations(&[]).unwrap_err();
        assert_eq!(err, ModelError::AllocationSum { total: 0.0 });
    }

    #[test]
    fn over_allocation_is_invalid() {
        assert!(validate_allocations(&[alloc(60.0), alloc(60.0)]).is_err());
    }

    #[test]
    fn status_wire_format() {
        assert_eq!(
            serde_json::to_string(&ExpenseStatus::Submitted).unwrap(),
            "\"SUBMITTED\""
        );
        assert_eq!(ExpenseStatus::Paid.to_string(), "PAID");
        assert_eq!(ExpenseStatus::from_str("approved").unwrap(), ExpenseStatus::Approved);
    }

    #[test]
    fn all_statuses_parse_back() {
        use strum::IntoEnumIterator;
        for status in ExpenseStatus::iter() {
            assert_eq!(ExpenseStatus::from_str(&status.to_string()).unwrap(), status);
        }
    }

    #[test]
    fn create_request_validates_its_allocations() {
        let req = CreateExpenseRequest {
            expense_date: "2024-03-01".into(),
            vendor: Some("Rail Co".into()),
            total_amount: 120.0,
            currency: "EUR".into(),
            description: None,
            segment_allocations: vec![alloc(50.0), alloc(40.0)],
        };
        assert!(req.validate().is_err());

        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["totalAmount"], 120.0);
        assert_eq!(value["segmentAllocations"][0]["segmentId"], "seg");
    }
}
