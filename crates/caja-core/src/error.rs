//! # Error Types
//!
//! Domain-specific error types for caja-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caja-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  caja-db errors (separate crate)                                       │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── EngineError      - CoreError ∪ DbError at engine entry points     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure classes at checkout
//! The orchestrator distinguishes three classes:
//! - **Fatal pre-commit** (`NoOpenShift`, `NoActiveSeries`): the whole
//!   finalize aborts, nothing is persisted, safe to retry.
//! - **Fatal post-commit** (`RecipeCycle`, loyalty failures): the order is
//!   already committed; these degrade to warnings, never roll back payment.
//! - **Conflict** (`ShiftAlreadyOpen`, `ShiftNotOpen`): user-correctable,
//!   reported verbatim.

use thiserror::Error;

use crate::types::DocumentType;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// They should be caught and translated to user-friendly messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Finalize was attempted without an open cash drawer.
    ///
    /// Pre-commit fatal: nothing is persisted. The actionable message for
    /// the cashier is "open the cash drawer first".
    #[error("Cashier {cashier_id} has no open shift")]
    NoOpenShift { cashier_id: String },

    /// No active document series exists for the requested document type.
    ///
    /// Pre-commit fatal. Blocks receipt/invoice issuance until a series is
    /// configured; the ticket series is guaranteed always active.
    #[error("No active document series for type '{document_type}'")]
    NoActiveSeries { document_type: DocumentType },

    /// The cashier already has an open shift.
    #[error("Cashier {cashier_id} already has an open shift")]
    ShiftAlreadyOpen { cashier_id: String },

    /// The shift is not open (already closed, or never existed).
    #[error("Shift {shift_id} is not open")]
    ShiftNotOpen { shift_id: String },

    /// A composite product's recipe reaches itself.
    ///
    /// ## When This Occurs
    /// - A recipe edge was configured that closes a loop
    ///   (directly or through intermediate composites)
    ///
    /// Expansion fails before any stock mutation; the movement ledger and
    /// cached stock are untouched.
    #[error("Recipe cycle detected at product {product_id}")]
    RecipeCycle { product_id: String },

    /// Insufficient stock to complete the sale.
    ///
    /// Only raised when the negative-stock gate is explicitly enabled;
    /// the default policy lets stock go negative rather than block a sale.
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: f64,
        requested: f64,
    },

    /// Product cannot be found (or is soft-deleted).
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Order cannot be found, or is not in a state that allows the
    /// requested operation (e.g. voiding a completed order).
    #[error("Order not found or not amendable: {0}")]
    OrderNotFound(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Operation is not allowed for this value.
    #[error("{field} '{value}' does not allow this operation: {reason}")]
    NotAllowed {
        field: String,
        value: String,
        reason: String,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::NoOpenShift {
            cashier_id: "ana".to_string(),
        };
        assert_eq!(err.to_string(), "Cashier ana has no open shift");

        let err = CoreError::NoActiveSeries {
            document_type: DocumentType::Invoice,
        };
        assert_eq!(
            err.to_string(),
            "No active document series for type 'invoice'"
        );

        let err = CoreError::RecipeCycle {
            product_id: "latte".to_string(),
        };
        assert_eq!(err.to_string(), "Recipe cycle detected at product latte");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "series_code".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
