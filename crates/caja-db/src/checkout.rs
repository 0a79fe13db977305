//! # Checkout Orchestration
//!
//! The order finalization orchestrator: sequences number allocation, order
//! persistence, stock consumption and loyalty evaluation as one logical
//! unit of work.
//!
//! ## The Sequence (and what failure means at each step)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  finalize(request)                                                      │
//! │                                                                         │
//! │  1. Require open shift ───────── fail: NoOpenShift, nothing persisted  │
//! │  2. Allocate document number ─── fail: NoActiveSeries, nothing         │
//! │         │                        persisted (a claimed number that      │
//! │         │                        never meets an order is a permitted   │
//! │         │                        gap - duplicates are not)             │
//! │         ▼                                                               │
//! │  3. Upsert order as COMPLETED + replace line items (one transaction)   │
//! │         │                                                               │
//! │         │            ════ COMMIT POINT ════                            │
//! │         │   The sale is now accepted and irreversible from the         │
//! │         │   cashier's perspective.                                     │
//! │         ▼                                                               │
//! │  4. Inventory consumption ────── fail: DegradedStep(Inventory),        │
//! │  5. Loyalty evaluation ───────── fail: DegradedStep(Loyalty)           │
//! │                                                                         │
//! │  Steps 4-5 are BEST-EFFORT relative to step 3. This is a deliberate    │
//! │  trade-off - payment finality over perfect stock/loyalty consistency   │
//! │  - not a missing transaction. Collapsing 1-5 into one atomic unit     │
//! │  would change the UX contract (a recipe misconfiguration could then    │
//! │  retroactively reject an accepted payment).                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cashier sees: pre-commit errors block the sale with an actionable
//! message; post-commit warnings ride along on a successful confirmation.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::EngineResult;
use crate::repository::inventory::InventoryRepository;
use crate::repository::loyalty::LoyaltyRepository;
use crate::repository::order::{generate_order_id, generate_order_item_id, OrderRepository};
use crate::repository::series::SeriesRepository;
use crate::repository::shift::ShiftRepository;
use caja_core::validation::{validate_actor, validate_cart_lines, validate_quantity};
use caja_core::{
    CartLine, CheckoutPolicy, CoreError, DocumentType, Money, Order, OrderItem, OrderStatus,
    PaymentMethod, RewardGrant, ValidationError,
};

// =============================================================================
// Requests / Outcome
// =============================================================================

/// Payment details captured at the tender screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    /// External metadata (card auth code, transfer id, ...).
    pub reference: Option<String>,
    /// For cash: the amount handed over, used to compute change due.
    pub tendered_cents: Option<i64>,
}

/// Everything the orchestrator needs to finalize a sale.
///
/// Identity is explicit: the acting cashier and optional customer arrive
/// as arguments, never from ambient session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub cashier_id: String,
    pub customer_id: Option<String>,
    /// Open tab to finalize. If it vanished (e.g. concurrently voided),
    /// the sale proceeds under a fresh order id instead of failing.
    pub existing_order_id: Option<String>,
    pub document_type: DocumentType,
    pub table_reference: Option<String>,
    pub lines: Vec<CartLine>,
    pub payment: PaymentInfo,
}

/// Request to open or rewrite a pending tab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequest {
    pub cashier_id: String,
    pub customer_id: Option<String>,
    /// Tab to rewrite; a new tab is opened when absent (or vanished).
    pub existing_order_id: Option<String>,
    pub table_reference: Option<String>,
    pub lines: Vec<CartLine>,
}

/// A post-commit step that failed on an already-accepted sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeStep {
    Inventory,
    Loyalty,
}

/// Warning attached to a committed sale when a best-effort step failed.
/// The operator reconciles these manually; the payment stands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradedStep {
    pub step: FinalizeStep,
    pub detail: String,
}

/// The committed result of a finalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeOutcome {
    /// The persisted completed order - what the receipt collaborator
    /// renders (frozen prices, totals, document reference, change due).
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// Loyalty rewards triggered by this sale (all firing rules).
    pub grants: Vec<RewardGrant>,
    /// Empty on a fully clean finalize.
    pub warnings: Vec<DegradedStep>,
}

// =============================================================================
// Service
// =============================================================================

/// The order finalization orchestrator.
///
/// Construct via [`crate::Database::checkout`].
#[derive(Debug, Clone)]
pub struct CheckoutService {
    pool: SqlitePool,
    policy: CheckoutPolicy,
}

impl CheckoutService {
    /// Creates a new CheckoutService with the given policy.
    pub fn new(pool: SqlitePool, policy: CheckoutPolicy) -> Self {
        CheckoutService { pool, policy }
    }

    /// Finalizes a sale. See the module docs for the exact sequence and
    /// failure semantics.
    pub async fn finalize(&self, request: FinalizeRequest) -> EngineResult<FinalizeOutcome> {
        validate_actor(&request.cashier_id, "cashier_id")?;
        validate_lines(&request.lines)?;

        let shifts = ShiftRepository::new(self.pool.clone());
        let series = SeriesRepository::new(self.pool.clone());
        let orders = OrderRepository::new(self.pool.clone());

        // Step 1: an open drawer is a hard precondition
        let shift = shifts
            .find_open(&request.cashier_id)
            .await?
            .ok_or_else(|| CoreError::NoOpenShift {
                cashier_id: request.cashier_id.clone(),
            })?;

        // Step 2: claim the document number. Commits on its own; if we
        // fail past this point the number is a gap, never reused.
        let allocated = series.allocate(request.document_type).await?;

        // Step 3: persist the completed order + items in one transaction
        let now = Utc::now();
        let (order_id, created_at) = match &request.existing_order_id {
            Some(existing) => match orders.amendable(existing).await? {
                Some(tab) => (tab.id, tab.created_at),
                // Tab vanished under us: fall back to a fresh order
                None => (generate_order_id(), now),
            },
            None => (generate_order_id(), now),
        };

        let subtotal: Money = request
            .lines
            .iter()
            .fold(Money::zero(), |acc, line| acc + line.line_total());
        let tax = subtotal.calculate_tax(self.policy.tax_rate);
        let total = subtotal + tax;

        let change_cents = match (request.payment.method, request.payment.tendered_cents) {
            (PaymentMethod::Cash, Some(tendered)) => Some((tendered - total.cents()).max(0)),
            _ => None,
        };

        let order = Order {
            id: order_id.clone(),
            shift_id: shift.id.clone(),
            cashier_id: request.cashier_id.clone(),
            customer_id: request.customer_id.clone(),
            subtotal_cents: subtotal.cents(),
            tax_cents: tax.cents(),
            total_cents: total.cents(),
            payment_method: request.payment.method,
            payment_reference: request.payment.reference.clone(),
            tendered_cents: request.payment.tendered_cents,
            change_cents,
            status: OrderStatus::Completed,
            document_type: request.document_type,
            document_series: Some(allocated.series_code.clone()),
            document_number: Some(allocated.number),
            table_reference: request.table_reference.clone(),
            created_at,
            updated_at: now,
            completed_at: Some(now),
        };

        let items = build_items(&order_id, &request.lines);
        orders.save_with_items(&order, &items).await?;

        info!(
            order_id = %order.id,
            reference = %allocated.reference,
            total = %total,
            "Sale committed"
        );

        // ──── commit point: everything below is best-effort ────

        let mut warnings = Vec::new();

        // Step 4: stock consumption
        let inventory = InventoryRepository::new(self.pool.clone());
        if let Err(err) = inventory
            .consume_for_order(&order.id, &request.cashier_id, &items, &self.policy)
            .await
        {
            warn!(order_id = %order.id, error = %err, "Inventory consumption failed on committed sale");
            warnings.push(DegradedStep {
                step: FinalizeStep::Inventory,
                detail: err.to_string(),
            });
        }

        // Step 5: loyalty (skipped internally for anonymous sales)
        let loyalty = LoyaltyRepository::new(self.pool.clone());
        let grants = match loyalty.evaluate_for_order(&order, &self.policy).await {
            Ok(grants) => grants,
            Err(err) => {
                warn!(order_id = %order.id, error = %err, "Loyalty evaluation failed on committed sale");
                warnings.push(DegradedStep {
                    step: FinalizeStep::Loyalty,
                    detail: err.to_string(),
                });
                Vec::new()
            }
        };

        Ok(FinalizeOutcome {
            order,
            items,
            grants,
            warnings,
        })
    }

    /// Opens or rewrites a pending tab (e.g. a dine-in table).
    ///
    /// Line items are fully replaced on every save. No document number is
    /// allocated and no stock or loyalty effects happen until finalize.
    pub async fn save_pending(&self, request: PendingRequest) -> EngineResult<Order> {
        validate_actor(&request.cashier_id, "cashier_id")?;
        validate_lines(&request.lines)?;

        let shifts = ShiftRepository::new(self.pool.clone());
        let orders = OrderRepository::new(self.pool.clone());

        let shift = shifts
            .find_open(&request.cashier_id)
            .await?
            .ok_or_else(|| CoreError::NoOpenShift {
                cashier_id: request.cashier_id.clone(),
            })?;

        let now = Utc::now();
        let (order_id, created_at) = match &request.existing_order_id {
            Some(existing) => match orders.amendable(existing).await? {
                Some(tab) => (tab.id, tab.created_at),
                None => (generate_order_id(), now),
            },
            None => (generate_order_id(), now),
        };

        let subtotal: Money = request
            .lines
            .iter()
            .fold(Money::zero(), |acc, line| acc + line.line_total());
        let tax = subtotal.calculate_tax(self.policy.tax_rate);

        let order = Order {
            id: order_id.clone(),
            shift_id: shift.id,
            cashier_id: request.cashier_id,
            customer_id: request.customer_id,
            subtotal_cents: subtotal.cents(),
            tax_cents: tax.cents(),
            total_cents: (subtotal + tax).cents(),
            payment_method: PaymentMethod::Cash,
            payment_reference: None,
            tendered_cents: None,
            change_cents: None,
            status: OrderStatus::Pending,
            document_type: DocumentType::Ticket,
            document_series: None,
            document_number: None,
            table_reference: request.table_reference,
            created_at,
            updated_at: now,
            completed_at: None,
        };

        let items = build_items(&order_id, &request.lines);
        orders.save_with_items(&order, &items).await?;

        info!(order_id = %order.id, items = items.len(), "Saved pending tab");
        Ok(order)
    }

    /// Voids a pending tab. Completed orders are terminal.
    pub async fn void_pending(&self, order_id: &str) -> EngineResult<()> {
        OrderRepository::new(self.pool.clone())
            .void_pending(order_id)
            .await
    }
}

/// Validates cart lines: count bounds, positive quantities, and that any
/// modifiers payload is well-formed JSON (it is persisted verbatim and
/// parsed by the receipt/kitchen collaborators).
fn validate_lines(lines: &[CartLine]) -> EngineResult<()> {
    validate_cart_lines(lines.len())?;
    for line in lines {
        validate_quantity(line.quantity)?;
        if let Some(modifiers) = &line.modifiers {
            serde_json::from_str::<serde_json::Value>(modifiers).map_err(|e| {
                ValidationError::InvalidFormat {
                    field: "modifiers".to_string(),
                    reason: e.to_string(),
                }
            })?;
        }
    }
    Ok(())
}

/// Freezes cart lines into order items.
fn build_items(order_id: &str, lines: &[CartLine]) -> Vec<OrderItem> {
    lines
        .iter()
        .map(|line| OrderItem {
            id: generate_order_item_id(),
            order_id: order_id.to_string(),
            product_id: line.product_id.clone(),
            variant_id: line.variant_id.clone(),
            name_snapshot: line.name.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price_cents,
            modifiers: line.modifiers.clone(),
            notes: line.notes.clone(),
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::new_product;
    use caja_core::{MovementKind, ProductKind, RewardKind, RuleCondition, TaxRate};
    use chrono::Utc;
    use uuid::Uuid;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn line(product_id: &str, name: &str, qty: f64, price: i64) -> CartLine {
        CartLine {
            product_id: product_id.to_string(),
            variant_id: None,
            name: name.to_string(),
            quantity: qty,
            unit_price_cents: price,
            modifiers: None,
            notes: None,
        }
    }

    fn cash_request(lines: Vec<CartLine>, tendered: Option<i64>) -> FinalizeRequest {
        FinalizeRequest {
            cashier_id: "ana".to_string(),
            customer_id: None,
            existing_order_id: None,
            document_type: DocumentType::Ticket,
            table_reference: None,
            lines,
            payment: PaymentInfo {
                method: PaymentMethod::Cash,
                reference: None,
                tendered_cents: tendered,
            },
        }
    }

    async fn seed_simple_product(db: &Database, name: &str, price: i64, stock: f64) -> String {
        let product = new_product(name, ProductKind::Simple, price);
        db.products().insert(&product).await.unwrap();
        if stock != 0.0 {
            db.products().apply_stock_delta(&product.id, stock).await.unwrap();
        }
        product.id
    }

    #[tokio::test]
    async fn test_finalize_happy_path() {
        let db = test_db().await;
        db.shifts().open("ana", 10000).await.unwrap();
        let cola = seed_simple_product(&db, "Refresco", 900, 20.0).await;

        let checkout = db.checkout(CheckoutPolicy::default());
        let outcome = checkout
            .finalize(cash_request(
                vec![line(&cola, "Refresco", 2.0, 900)],
                Some(2000),
            ))
            .await
            .unwrap();

        assert!(outcome.warnings.is_empty());
        let order = &outcome.order;
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.total_cents, 1800);
        assert_eq!(order.change_cents, Some(200));
        assert_eq!(order.document_reference().as_deref(), Some("T001-00000001"));

        // Items frozen with unit prices
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].unit_price_cents, 900);

        // Stock deducted through the movement ledger
        let stock = db.products().get_by_id(&cola).await.unwrap().unwrap().stock;
        assert_eq!(stock, 18.0);
        let movements = db.inventory().movements_for_order(&order.id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].kind, MovementKind::Out);

        // The sale counts toward the open shift
        let summary = db.shifts().summary(&order.shift_id).await.unwrap();
        assert_eq!(summary.totals[0].total_cents, 1800);
    }

    #[tokio::test]
    async fn test_finalize_applies_tax_policy() {
        let db = test_db().await;
        db.shifts().open("ana", 0).await.unwrap();
        let cola = seed_simple_product(&db, "Refresco", 1000, 10.0).await;

        let checkout = db.checkout(CheckoutPolicy {
            tax_rate: TaxRate::from_bps(1600),
            ..CheckoutPolicy::default()
        });
        let outcome = checkout
            .finalize(cash_request(vec![line(&cola, "Refresco", 1.0, 1000)], None))
            .await
            .unwrap();

        assert_eq!(outcome.order.subtotal_cents, 1000);
        assert_eq!(outcome.order.tax_cents, 160);
        assert_eq!(outcome.order.total_cents, 1160);
    }

    #[tokio::test]
    async fn test_finalize_without_open_shift_commits_nothing() {
        let db = test_db().await;
        let cola = seed_simple_product(&db, "Refresco", 900, 5.0).await;

        let checkout = db.checkout(CheckoutPolicy::default());
        let err = checkout
            .finalize(cash_request(vec![line(&cola, "Refresco", 1.0, 900)], None))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::Domain(CoreError::NoOpenShift { .. })
        ));
        assert!(err.is_pre_commit());

        // Nothing persisted, counter untouched
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
        let ticket = db
            .series()
            .active_for(DocumentType::Ticket)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ticket.current_number, 0);
    }

    #[tokio::test]
    async fn test_finalize_invoice_without_series_commits_nothing() {
        let db = test_db().await;
        db.shifts().open("ana", 0).await.unwrap();
        let cola = seed_simple_product(&db, "Refresco", 900, 5.0).await;

        let checkout = db.checkout(CheckoutPolicy::default());
        let mut request = cash_request(vec![line(&cola, "Refresco", 1.0, 900)], None);
        request.document_type = DocumentType::Invoice;

        let err = checkout.finalize(request).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::NoActiveSeries { .. })
        ));
        assert!(err.is_pre_commit());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_recipe_failure_degrades_but_sale_stands() {
        let db = test_db().await;
        db.shifts().open("ana", 0).await.unwrap();

        // A composite whose recipe is broken with a self-loop, injected
        // behind the config-time guard's back
        let combo = new_product("Combo", ProductKind::Composite, 5000);
        db.products().insert(&combo).await.unwrap();
        sqlx::query(
            "INSERT INTO recipe_edges (parent_product_id, ingredient_product_id, quantity_per_unit)
             VALUES (?1, ?1, 1.0)",
        )
        .bind(&combo.id)
        .execute(db.pool())
        .await
        .unwrap();

        let checkout = db.checkout(CheckoutPolicy::default());
        let outcome = checkout
            .finalize(cash_request(vec![line(&combo.id, "Combo", 1.0, 5000)], None))
            .await
            .unwrap();

        // The payment stands: completed order with document number
        assert_eq!(outcome.order.status, OrderStatus::Completed);
        assert!(outcome.order.document_number.is_some());

        // ... with exactly one inventory warning and zero movements
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].step, FinalizeStep::Inventory);
        assert!(db
            .inventory()
            .movements_for_order(&outcome.order.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_finalize_with_customer_grants_and_points() {
        let db = test_db().await;
        db.shifts().open("ana", 0).await.unwrap();
        let cola = seed_simple_product(&db, "Refresco", 3000, 50.0).await;

        db.loyalty()
            .insert_rule(&caja_core::LoyaltyRule {
                id: Uuid::new_v4().to_string(),
                condition: RuleCondition::SingleTransactionAmount,
                threshold_cents: 5000,
                reward: RewardKind::FreeProduct,
                reward_product_id: Some(cola.clone()),
                reward_description: "Refresco gratis".to_string(),
                is_active: true,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let checkout = db.checkout(CheckoutPolicy::default());
        let mut request = cash_request(vec![line(&cola, "Refresco", 2.0, 3000)], None);
        request.customer_id = Some("cust-1".to_string());

        let outcome = checkout.finalize(request).await.unwrap();

        assert_eq!(outcome.grants.len(), 1);
        assert_eq!(outcome.grants[0].reward_product_id.as_deref(), Some(cola.as_str()));

        let state = db.loyalty().state("cust-1").await.unwrap().unwrap();
        assert_eq!(state.points_balance, 60); // 60.00 at 1 point/unit
        assert_eq!(state.lifetime_spend_cents, 6000);
    }

    #[tokio::test]
    async fn test_open_tab_rewrite_then_finalize() {
        let db = test_db().await;
        db.shifts().open("ana", 0).await.unwrap();
        let cafe = seed_simple_product(&db, "Café", 1200, 30.0).await;
        let tostada = seed_simple_product(&db, "Tostada", 1500, 30.0).await;

        let checkout = db.checkout(CheckoutPolicy::default());

        // Open the tab with one coffee
        let tab = checkout
            .save_pending(PendingRequest {
                cashier_id: "ana".to_string(),
                customer_id: None,
                existing_order_id: None,
                table_reference: Some("Mesa 4".to_string()),
                lines: vec![line(&cafe, "Café", 1.0, 1200)],
            })
            .await
            .unwrap();
        assert_eq!(tab.status, OrderStatus::Pending);
        assert!(tab.document_number.is_none());

        // The table orders more: rewrite fully
        checkout
            .save_pending(PendingRequest {
                cashier_id: "ana".to_string(),
                customer_id: None,
                existing_order_id: Some(tab.id.clone()),
                table_reference: Some("Mesa 4".to_string()),
                lines: vec![
                    line(&cafe, "Café", 2.0, 1200),
                    line(&tostada, "Tostada", 1.0, 1500),
                ],
            })
            .await
            .unwrap();

        // No stock was touched while pending
        assert_eq!(db.products().get_by_id(&cafe).await.unwrap().unwrap().stock, 30.0);

        // Finalize the same order id
        let mut request = cash_request(
            vec![
                line(&cafe, "Café", 2.0, 1200),
                line(&tostada, "Tostada", 1.0, 1500),
            ],
            Some(5000),
        );
        request.existing_order_id = Some(tab.id.clone());
        request.table_reference = Some("Mesa 4".to_string());

        let outcome = checkout.finalize(request).await.unwrap();
        assert_eq!(outcome.order.id, tab.id);
        assert_eq!(outcome.order.total_cents, 3900);
        assert_eq!(outcome.order.status, OrderStatus::Completed);

        // Only one order row exists for the whole tab lifecycle
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);

        // Stock consumed exactly once, at finalize
        assert_eq!(db.products().get_by_id(&cafe).await.unwrap().unwrap().stock, 28.0);
    }

    #[tokio::test]
    async fn test_finalize_falls_back_when_tab_vanished() {
        let db = test_db().await;
        db.shifts().open("ana", 0).await.unwrap();
        let cafe = seed_simple_product(&db, "Café", 1200, 10.0).await;

        let checkout = db.checkout(CheckoutPolicy::default());
        let tab = checkout
            .save_pending(PendingRequest {
                cashier_id: "ana".to_string(),
                customer_id: None,
                existing_order_id: None,
                table_reference: None,
                lines: vec![line(&cafe, "Café", 1.0, 1200)],
            })
            .await
            .unwrap();

        // Concurrently voided
        checkout.void_pending(&tab.id).await.unwrap();

        let mut request = cash_request(vec![line(&cafe, "Café", 1.0, 1200)], None);
        request.existing_order_id = Some(tab.id.clone());

        // Falls back to a new order rather than failing or resurrecting
        let outcome = checkout.finalize(request).await.unwrap();
        assert_ne!(outcome.order.id, tab.id);
        assert_eq!(outcome.order.status, OrderStatus::Completed);

        let voided = db.orders().get_by_id(&tab.id).await.unwrap().unwrap();
        assert_eq!(voided.status, OrderStatus::Voided);
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let db = test_db().await;
        db.shifts().open("ana", 0).await.unwrap();

        let checkout = db.checkout(CheckoutPolicy::default());
        let err = checkout.finalize(cash_request(vec![], None)).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_modifiers_rejected() {
        let db = test_db().await;
        db.shifts().open("ana", 0).await.unwrap();
        let cola = seed_simple_product(&db, "Refresco", 900, 5.0).await;

        let checkout = db.checkout(CheckoutPolicy::default());
        let mut bad = line(&cola, "Refresco", 1.0, 900);
        bad.modifiers = Some("not json".to_string());

        let err = checkout.finalize(cash_request(vec![bad], None)).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::Validation(_))
        ));

        // Well-formed modifiers pass
        let mut good = line(&cola, "Refresco", 1.0, 900);
        good.modifiers = Some(r#"["sin hielo"]"#.to_string());
        checkout.finalize(cash_request(vec![good], None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_document_numbers_advance_across_sales() {
        let db = test_db().await;
        db.shifts().open("ana", 0).await.unwrap();
        let cola = seed_simple_product(&db, "Refresco", 900, 50.0).await;

        let checkout = db.checkout(CheckoutPolicy::default());
        for expected in 1..=3i64 {
            let outcome = checkout
                .finalize(cash_request(vec![line(&cola, "Refresco", 1.0, 900)], None))
                .await
                .unwrap();
            assert_eq!(outcome.order.document_number, Some(expected));
        }
    }
}
