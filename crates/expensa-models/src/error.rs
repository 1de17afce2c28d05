//! Error types for the `expensa-models` crate.
//!
//! Client-side validation in this crate returns variants of [`ModelError`].

/// Errors produced when validating model types.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// Segment allocation percentages did not add up to 100.
    #[error("segment allocations must sum to 100%, current sum: {total}%")]
    AllocationSum {
        /// The actual sum of the percentages.
        total: f64,
    },

    /// A required field was missing or blank.
    #[error("missing required field: {field}")]
    MissingField {
        /// The name of the missing field.
        field: String,
    },
}
