//! # Loyalty Rule Evaluation
//!
//! Pure evaluation of configured loyalty rules against a completed purchase.
//!
//! ## Evaluation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Order completed (total 52.00), customer attached                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  evaluate_rules(active_rules, order_total, monthly_spend)              │
//! │       │                                                                 │
//! │       ├── single_transaction_amount, threshold 50.00                    │
//! │       │      52.00 > 50.00  → GRANT "Café gratis"                      │
//! │       │                                                                 │
//! │       ├── rolling_monthly_spend, threshold 200.00                       │
//! │       │      month spend 180.00  → no grant                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  [RewardGrant { "Café gratis" }]   ← ALL firing rules, no precedence   │
//! │                                                                         │
//! │  Points accrue independently of grants: points_for(total, rate)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Thresholds are STRICT: a total of exactly 50.00 against a 50.00
//! threshold does not fire. This matches how the rules are advertised to
//! customers ("spend over 50").

use crate::types::{LoyaltyRule, RewardGrant, RuleCondition};

/// Evaluates active rules against one completed order.
///
/// ## Arguments
/// * `rules` - the active rule set (inactive rules must be filtered out
///   by the caller; this function evaluates everything it is given)
/// * `order_total_cents` - total of the current order
/// * `monthly_spend_cents` - the customer's completed-order spend in the
///   current calendar month, INCLUDING the current order
///
/// ## Returns
/// One grant per triggered rule. Multiple rules may fire for the same
/// order; the caller surfaces all of them.
pub fn evaluate_rules(
    rules: &[LoyaltyRule],
    order_total_cents: i64,
    monthly_spend_cents: i64,
) -> Vec<RewardGrant> {
    rules
        .iter()
        .filter(|rule| match rule.condition {
            RuleCondition::SingleTransactionAmount => order_total_cents > rule.threshold_cents,
            RuleCondition::RollingMonthlySpend => monthly_spend_cents > rule.threshold_cents,
        })
        .map(|rule| RewardGrant {
            rule_id: rule.id.clone(),
            reward_description: rule.reward_description.clone(),
            reward_product_id: rule.reward_product_id.clone(),
        })
        .collect()
}

/// Points earned for a purchase.
///
/// Accrues `points_per_unit` points per WHOLE currency unit spent
/// (floor division - 12.99 at rate 1 earns 12 points). Accrual is
/// independent of, and in addition to, rule-triggered grants.
///
/// The rate is a policy knob ([`crate::CheckoutPolicy::points_per_unit`]);
/// the default of 1 point per unit is pending product-owner confirmation.
pub fn points_for(order_total_cents: i64, points_per_unit: i64) -> i64 {
    if order_total_cents <= 0 || points_per_unit <= 0 {
        return 0;
    }
    (order_total_cents / 100) * points_per_unit
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RewardKind, RuleCondition};
    use chrono::Utc;

    fn rule(id: &str, condition: RuleCondition, threshold_cents: i64) -> LoyaltyRule {
        LoyaltyRule {
            id: id.to_string(),
            condition,
            threshold_cents,
            reward: RewardKind::Custom,
            reward_product_id: None,
            reward_description: format!("reward-{id}"),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_single_transaction_threshold_is_strict() {
        // "free coffee over 50": 50.00 exactly does NOT trigger, 50.01 does
        let rules = vec![rule("r1", RuleCondition::SingleTransactionAmount, 5000)];

        assert!(evaluate_rules(&rules, 5000, 0).is_empty());
        assert_eq!(evaluate_rules(&rules, 5001, 0).len(), 1);
    }

    #[test]
    fn test_rolling_monthly_spend_is_strict() {
        let rules = vec![rule("r1", RuleCondition::RollingMonthlySpend, 20000)];

        // month spend includes the current order
        assert!(evaluate_rules(&rules, 3000, 20000).is_empty());
        assert_eq!(evaluate_rules(&rules, 3000, 20001).len(), 1);
    }

    #[test]
    fn test_multiple_rules_all_fire() {
        let rules = vec![
            rule("r1", RuleCondition::SingleTransactionAmount, 1000),
            rule("r2", RuleCondition::SingleTransactionAmount, 2000),
            rule("r3", RuleCondition::RollingMonthlySpend, 5000),
        ];

        let grants = evaluate_rules(&rules, 2500, 6000);
        let ids: Vec<&str> = grants.iter().map(|g| g.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3"]);
    }

    #[test]
    fn test_grant_carries_reward_product() {
        let mut r = rule("r1", RuleCondition::SingleTransactionAmount, 100);
        r.reward = RewardKind::FreeProduct;
        r.reward_product_id = Some("espresso".to_string());

        let grants = evaluate_rules(&[r], 200, 0);
        assert_eq!(grants[0].reward_product_id.as_deref(), Some("espresso"));
    }

    #[test]
    fn test_points_accrual_floors_partial_units() {
        assert_eq!(points_for(1299, 1), 12);
        assert_eq!(points_for(1299, 2), 24);
        assert_eq!(points_for(99, 1), 0);
        assert_eq!(points_for(0, 1), 0);
        assert_eq!(points_for(-500, 1), 0);
        assert_eq!(points_for(1000, 0), 0);
    }
}
