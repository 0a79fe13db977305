//! # Loyalty Repository
//!
//! The loyalty rule engine: evaluates configured rules against a completed
//! purchase and maintains each customer's loyalty standing.
//!
//! ## Evaluation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  evaluate_for_order(order)                                              │
//! │       │                                                                 │
//! │       ├── no customer attached? ──► Ok([]) - anonymous sales simply    │
//! │       │                             skip loyalty, never an error       │
//! │       ▼                                                                 │
//! │  Load active rules + the customer's calendar-month completed spend     │
//! │  (the current order is already persisted, so it is included)           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  caja_core::loyalty::evaluate_rules  ← pure, strict thresholds         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ONE TRANSACTION:                                                      │
//! │    INSERT reward_grants (one per fired rule)                           │
//! │    UPSERT customer_loyalty:                                            │
//! │      points_balance       += points_for(total, rate)                   │
//! │      lifetime_spend_cents += total      ← atomic increments            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Failure here never blocks an already-accepted payment - the checkout
//! orchestrator downgrades it to a warning on the committed sale.

use chrono::{DateTime, Datelike, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbResult, EngineResult};
use caja_core::loyalty::{evaluate_rules, points_for};
use caja_core::{CheckoutPolicy, CustomerLoyaltyState, LoyaltyRule, Order, RewardGrant};

/// Repository hosting the loyalty rule engine.
#[derive(Debug, Clone)]
pub struct LoyaltyRepository {
    pool: SqlitePool,
}

impl LoyaltyRepository {
    /// Creates a new LoyaltyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LoyaltyRepository { pool }
    }

    /// Evaluates all active rules against a completed order and applies
    /// the side effects (grants + points + lifetime spend).
    ///
    /// No-op for anonymous orders (no customer attached).
    pub async fn evaluate_for_order(
        &self,
        order: &Order,
        policy: &CheckoutPolicy,
    ) -> EngineResult<Vec<RewardGrant>> {
        let customer_id = match &order.customer_id {
            Some(id) => id.clone(),
            None => {
                debug!(order_id = %order.id, "Anonymous sale, skipping loyalty");
                return Ok(Vec::new());
            }
        };

        let rules = self.active_rules().await?;

        // Completed spend this calendar month, current order included
        // (it is already persisted as completed when this runs).
        let since = month_start(order.created_at);
        let monthly_spend: i64 = {
            let total: Option<i64> = sqlx::query_scalar(
                r#"
                SELECT CAST(SUM(total_cents) AS INTEGER)
                FROM orders
                WHERE customer_id = ?1 AND status = 'completed' AND created_at >= ?2
                "#,
            )
            .bind(&customer_id)
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
            total.unwrap_or(0)
        };

        let grants = evaluate_rules(&rules, order.total_cents, monthly_spend);
        let points = points_for(order.total_cents, policy.points_per_unit);
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        for grant in &grants {
            sqlx::query(
                r#"
                INSERT INTO reward_grants (
                    id, rule_id, customer_id, order_id,
                    reward_description, reward_product_id, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&grant.rule_id)
            .bind(&customer_id)
            .bind(&order.id)
            .bind(&grant.reward_description)
            .bind(&grant.reward_product_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        // Atomic increments - two terminals finishing sales for the same
        // customer must both land their points.
        sqlx::query(
            r#"
            INSERT INTO customer_loyalty (customer_id, points_balance, lifetime_spend_cents, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(customer_id) DO UPDATE SET
                points_balance = points_balance + excluded.points_balance,
                lifetime_spend_cents = lifetime_spend_cents + excluded.lifetime_spend_cents,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&customer_id)
        .bind(points)
        .bind(order.total_cents)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            order_id = %order.id,
            customer_id = %customer_id,
            grants = grants.len(),
            points = points,
            "Evaluated loyalty rules"
        );
        Ok(grants)
    }

    /// Loads all active rules.
    pub async fn active_rules(&self) -> DbResult<Vec<LoyaltyRule>> {
        let rules = sqlx::query_as(
            r#"
            SELECT id, condition, threshold_cents, reward,
                   reward_product_id, reward_description, is_active, created_at
            FROM loyalty_rules
            WHERE is_active = 1
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rules)
    }

    /// Inserts a rule (management screens).
    pub async fn insert_rule(&self, rule: &LoyaltyRule) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO loyalty_rules (
                id, condition, threshold_cents, reward,
                reward_product_id, reward_description, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&rule.id)
        .bind(rule.condition)
        .bind(rule.threshold_cents)
        .bind(rule.reward)
        .bind(&rule.reward_product_id)
        .bind(&rule.reward_description)
        .bind(rule.is_active)
        .bind(rule.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// A customer's loyalty standing, if they have one yet.
    pub async fn state(&self, customer_id: &str) -> DbResult<Option<CustomerLoyaltyState>> {
        let state = sqlx::query_as(
            r#"
            SELECT customer_id, points_balance, lifetime_spend_cents, updated_at
            FROM customer_loyalty
            WHERE customer_id = ?1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(state)
    }

    /// Grants recorded for a customer, newest first.
    pub async fn grants_for_customer(&self, customer_id: &str) -> DbResult<Vec<(String, String)>> {
        let grants: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT order_id, reward_description
            FROM reward_grants
            WHERE customer_id = ?1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(grants)
    }
}

/// First instant of the calendar month containing `at`.
fn month_start(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive()
        .with_day(1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        // Day 1 at midnight always constructs; the fallback never fires
        .unwrap_or(at)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::order::generate_order_id;
    use caja_core::{
        DocumentType, OrderStatus, PaymentMethod, RewardKind, RuleCondition,
    };

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn rule(condition: RuleCondition, threshold_cents: i64, description: &str) -> LoyaltyRule {
        LoyaltyRule {
            id: Uuid::new_v4().to_string(),
            condition,
            threshold_cents,
            reward: RewardKind::Custom,
            reward_product_id: None,
            reward_description: description.to_string(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn completed_order(shift_id: &str, customer: Option<&str>, total_cents: i64) -> Order {
        let now = Utc::now();
        Order {
            id: generate_order_id(),
            shift_id: shift_id.to_string(),
            cashier_id: "ana".to_string(),
            customer_id: customer.map(str::to_string),
            subtotal_cents: total_cents,
            tax_cents: 0,
            total_cents,
            payment_method: PaymentMethod::Cash,
            payment_reference: None,
            tendered_cents: None,
            change_cents: None,
            status: OrderStatus::Completed,
            document_type: DocumentType::Ticket,
            document_series: Some("T001".to_string()),
            document_number: Some(1),
            table_reference: None,
            created_at: now,
            updated_at: now,
            completed_at: Some(now),
        }
    }

    async fn persist(db: &Database, order: &Order) {
        db.orders().save_with_items(order, &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_single_transaction_rule_strict_threshold() {
        let db = test_db().await;
        let shift_id = db.shifts().open("ana", 0).await.unwrap().id;
        let loyalty = db.loyalty();
        let policy = CheckoutPolicy::default();

        // "Café gratis" for orders over 50.00
        loyalty
            .insert_rule(&rule(
                RuleCondition::SingleTransactionAmount,
                5000,
                "Café gratis",
            ))
            .await
            .unwrap();

        // 50.00 exactly: no grant
        let at_threshold = completed_order(&shift_id, Some("cust-1"), 5000);
        persist(&db, &at_threshold).await;
        let grants = loyalty
            .evaluate_for_order(&at_threshold, &policy)
            .await
            .unwrap();
        assert!(grants.is_empty());

        // 50.01: grant
        let over = completed_order(&shift_id, Some("cust-1"), 5001);
        persist(&db, &over).await;
        let grants = loyalty.evaluate_for_order(&over, &policy).await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].reward_description, "Café gratis");
    }

    #[tokio::test]
    async fn test_rolling_monthly_spend_includes_current_order() {
        let db = test_db().await;
        let shift_id = db.shifts().open("ana", 0).await.unwrap().id;
        let loyalty = db.loyalty();
        let policy = CheckoutPolicy::default();

        loyalty
            .insert_rule(&rule(
                RuleCondition::RollingMonthlySpend,
                20000,
                "Postre del mes",
            ))
            .await
            .unwrap();

        // Prior spend this month: 150.00
        let prior = completed_order(&shift_id, Some("cust-1"), 15000);
        persist(&db, &prior).await;

        // 40.00 more → 190.00, not over 200.00
        let second = completed_order(&shift_id, Some("cust-1"), 4000);
        persist(&db, &second).await;
        assert!(loyalty
            .evaluate_for_order(&second, &policy)
            .await
            .unwrap()
            .is_empty());

        // 15.00 more → 205.00, strictly over → fires
        let third = completed_order(&shift_id, Some("cust-1"), 1500);
        persist(&db, &third).await;
        let grants = loyalty.evaluate_for_order(&third, &policy).await.unwrap();
        assert_eq!(grants.len(), 1);
    }

    #[tokio::test]
    async fn test_points_and_lifetime_spend_accumulate() {
        let db = test_db().await;
        let shift_id = db.shifts().open("ana", 0).await.unwrap().id;
        let loyalty = db.loyalty();
        let policy = CheckoutPolicy {
            points_per_unit: 2,
            ..CheckoutPolicy::default()
        };

        let first = completed_order(&shift_id, Some("cust-1"), 1250); // 12.50
        persist(&db, &first).await;
        loyalty.evaluate_for_order(&first, &policy).await.unwrap();

        let second = completed_order(&shift_id, Some("cust-1"), 2000); // 20.00
        persist(&db, &second).await;
        loyalty.evaluate_for_order(&second, &policy).await.unwrap();

        let state = loyalty.state("cust-1").await.unwrap().unwrap();
        // 12 whole units × 2 + 20 × 2
        assert_eq!(state.points_balance, 64);
        assert_eq!(state.lifetime_spend_cents, 3250);
    }

    #[tokio::test]
    async fn test_anonymous_sale_is_noop() {
        let db = test_db().await;
        let shift_id = db.shifts().open("ana", 0).await.unwrap().id;
        let loyalty = db.loyalty();
        let policy = CheckoutPolicy::default();

        loyalty
            .insert_rule(&rule(RuleCondition::SingleTransactionAmount, 100, "x"))
            .await
            .unwrap();

        let anonymous = completed_order(&shift_id, None, 99999);
        persist(&db, &anonymous).await;

        let grants = loyalty
            .evaluate_for_order(&anonymous, &policy)
            .await
            .unwrap();
        assert!(grants.is_empty());
    }

    #[tokio::test]
    async fn test_multiple_rules_all_surface_and_grants_persist() {
        let db = test_db().await;
        let shift_id = db.shifts().open("ana", 0).await.unwrap().id;
        let loyalty = db.loyalty();
        let policy = CheckoutPolicy::default();

        loyalty
            .insert_rule(&rule(RuleCondition::SingleTransactionAmount, 1000, "A"))
            .await
            .unwrap();
        loyalty
            .insert_rule(&rule(RuleCondition::SingleTransactionAmount, 2000, "B"))
            .await
            .unwrap();

        let order = completed_order(&shift_id, Some("cust-1"), 2500);
        persist(&db, &order).await;
        let grants = loyalty.evaluate_for_order(&order, &policy).await.unwrap();
        assert_eq!(grants.len(), 2);

        let persisted = loyalty.grants_for_customer("cust-1").await.unwrap();
        assert_eq!(persisted.len(), 2);
        assert!(persisted.iter().all(|(order_id, _)| order_id == &order.id));
    }

    #[test]
    fn test_month_start() {
        let at = chrono::DateTime::parse_from_rfc3339("2026-08-07T15:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let start = month_start(at);
        assert_eq!(start.to_rfc3339(), "2026-08-01T00:00:00+00:00");
        assert_eq!(start.day(), 1);
    }
}
