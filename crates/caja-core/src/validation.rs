//! # Validation Module
//!
//! Input validation utilities for Caja POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI layer (external)                                          │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engine entry points (Rust)                                   │
//! │  └── THIS MODULE: Business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── Partial unique indexes (series, shifts)                           │
//! │                                                                         │
//! │  Defense in depth: Multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line-item quantity.
///
/// ## Rules
/// - Must be positive and finite
/// - Must not exceed MAX_LINE_QUANTITY (999)
pub fn validate_quantity(qty: f64) -> ValidationResult<()> {
    if !qty.is_finite() || qty <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY as i64,
        });
    }

    Ok(())
}

/// Validates a monetary amount that must not be negative
/// (prices, starting cash, counted cash).
pub fn validate_cash_amount(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "cash amount".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a document series code (e.g. "F001").
///
/// ## Rules
/// - Must not be empty
/// - At most 10 characters
/// - Alphanumeric only - it becomes the prefix of every printed reference
pub fn validate_series_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "series_code".to_string(),
        });
    }

    if code.len() > 10 {
        return Err(ValidationError::TooLong {
            field: "series_code".to_string(),
            max: 10,
        });
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "series_code".to_string(),
            reason: "must contain only letters and digits".to_string(),
        });
    }

    Ok(())
}

/// Validates an actor/cashier/customer identifier is present.
pub fn validate_actor(id: &str, field: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a movement reason is present.
pub fn validate_reason(reason: &str) -> ValidationResult<()> {
    if reason.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates cart size (number of line items).
///
/// ## Rules
/// - Must have at least one line
/// - Must not exceed MAX_CART_LINES (100)
pub fn validate_cart_lines(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::Required {
            field: "cart lines".to_string(),
        });
    }

    if count > MAX_CART_LINES {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 1,
            max: MAX_CART_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1.0).is_ok());
        assert!(validate_quantity(0.25).is_ok());
        assert!(validate_quantity(999.0).is_ok());

        assert!(validate_quantity(0.0).is_err());
        assert!(validate_quantity(-1.0).is_err());
        assert!(validate_quantity(1000.0).is_err());
        assert!(validate_quantity(f64::NAN).is_err());
        assert!(validate_quantity(f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_cash_amount() {
        assert!(validate_cash_amount(0).is_ok());
        assert!(validate_cash_amount(10000).is_ok());
        assert!(validate_cash_amount(-1).is_err());
    }

    #[test]
    fn test_validate_series_code() {
        assert!(validate_series_code("F001").is_ok());
        assert!(validate_series_code("T1").is_ok());

        assert!(validate_series_code("").is_err());
        assert!(validate_series_code("   ").is_err());
        assert!(validate_series_code("F-001").is_err());
        assert!(validate_series_code("ABCDEFGHIJK").is_err());
    }

    #[test]
    fn test_validate_cart_lines() {
        assert!(validate_cart_lines(1).is_ok());
        assert!(validate_cart_lines(100).is_ok());
        assert!(validate_cart_lines(0).is_err());
        assert!(validate_cart_lines(101).is_err());
    }

    #[test]
    fn test_validate_actor() {
        assert!(validate_actor("ana", "cashier_id").is_ok());
        assert!(validate_actor("  ", "cashier_id").is_err());
    }
}
