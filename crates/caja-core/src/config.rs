//! # Checkout Policy
//!
//! The two behavioral knobs the engine deliberately leaves configurable,
//! plus the tenant tax rate.
//!
//! Both knobs exist because the desired behavior is a product decision,
//! not an engineering one:
//!
//! - `block_negative_stock`: the default policy never blocks a sale for
//!   inventory reasons, letting stock go negative and surfacing it as a
//!   low-stock signal. Sites that prefer a hard gate flip this on.
//! - `points_per_unit`: the loyalty accrual rate. Accrual happens per whole
//!   currency unit spent, independent of rule-triggered grants.

use serde::{Deserialize, Serialize};

use crate::types::TaxRate;

/// Tenant-level policy applied by the checkout and inventory engines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CheckoutPolicy {
    /// When true, order consumption fails with `InsufficientStock` instead
    /// of driving stock negative. Default: false (never block a sale).
    pub block_negative_stock: bool,

    /// Loyalty points accrued per whole currency unit spent. Default: 1.
    pub points_per_unit: i64,

    /// Tax applied on top of the cart subtotal at finalization.
    pub tax_rate: TaxRate,
}

impl Default for CheckoutPolicy {
    fn default() -> Self {
        CheckoutPolicy {
            block_negative_stock: false,
            points_per_unit: 1,
            tax_rate: TaxRate::zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_matches_source_behavior() {
        let policy = CheckoutPolicy::default();
        assert!(!policy.block_negative_stock);
        assert_eq!(policy.points_per_unit, 1);
        assert_eq!(policy.tax_rate.bps(), 0);
    }
}
