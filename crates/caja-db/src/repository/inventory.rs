//! # Inventory Repository
//!
//! The inventory consumption engine: turns sold line items into stock
//! deductions, expanding composite products through their recipes.
//!
//! ## Consumption Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  consume_for_order(order_id, lines)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Movements for this order already exist? ──► yes ──► no-op             │
//! │       │ no                    (idempotence: a retried step must not    │
//! │       ▼                        deduct twice)                           │
//! │  Load product/recipe read model (fresh, never cached)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  RecipeGraph::expand ──► cycle? ──► error, ZERO stock mutation         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ONE TRANSACTION per order:                                            │
//! │    for each aggregated ingredient:                                     │
//! │      INSERT inventory_movements (kind=out, reason='Venta', order id)   │
//! │      UPDATE products SET stock = stock - qty   ← atomic delta          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock is NOT a hard gate by default: consumption applies even if it
//! drives stock negative, and the deficit surfaces as a low-stock signal
//! in catalog views. Sites that want a hard gate set
//! `CheckoutPolicy::block_negative_stock`.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbResult, EngineResult};
use crate::repository::product::ProductRepository;
use caja_core::validation::{validate_actor, validate_quantity, validate_reason};
use caja_core::{
    CheckoutPolicy, Consumption, CoreError, InventoryMovement, MovementKind, OrderItem,
    REASON_SALE,
};

/// Outcome of order-driven consumption.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConsumptionResult {
    pub order_id: String,
    /// Aggregated `(simple product id, quantity deducted)`, in stable order.
    pub consumed: Vec<(String, f64)>,
    /// True when movements for this order already existed and nothing was
    /// re-applied (orchestrator retry after a crash).
    pub already_applied: bool,
}

/// Repository hosting the inventory consumption engine and the manual
/// movement operation used by inventory screens.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Applies stock consumption for a persisted order.
    ///
    /// ## Idempotence
    /// Keyed on `reference_order_id` + reason "Venta": if the orchestrator
    /// retries this step after a crash, existing movements are detected and
    /// nothing is re-applied.
    ///
    /// ## Errors
    /// - [`CoreError::RecipeCycle`] - expansion aborts before any mutation
    /// - [`CoreError::ProductNotFound`] - a line references an unknown product
    /// - [`CoreError::InsufficientStock`] - only with the explicit
    ///   `block_negative_stock` policy; the default applies the deduction
    ///   regardless
    pub async fn consume_for_order(
        &self,
        order_id: &str,
        actor: &str,
        items: &[OrderItem],
        policy: &CheckoutPolicy,
    ) -> EngineResult<ConsumptionResult> {
        validate_actor(actor, "actor")?;

        if self.has_sale_movements(order_id).await? {
            debug!(order_id = %order_id, "Consumption already applied, skipping");
            return Ok(ConsumptionResult {
                order_id: order_id.to_string(),
                consumed: Vec::new(),
                already_applied: true,
            });
        }

        let graph = ProductRepository::new(self.pool.clone())
            .load_recipe_graph()
            .await?;

        let lines: Vec<(String, f64)> = items
            .iter()
            .map(|item| (item.product_id.clone(), item.quantity))
            .collect();

        let consumption: Consumption = graph.expand(&lines)?;

        if policy.block_negative_stock {
            self.check_stock_covers(&consumption).await?;
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for (product_id, quantity) in &consumption {
            sqlx::query(
                r#"
                INSERT INTO inventory_movements (
                    id, product_id, kind, quantity, reason,
                    reference_order_id, actor, notes, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(product_id)
            .bind(MovementKind::Out)
            .bind(quantity)
            .bind(REASON_SALE)
            .bind(order_id)
            .bind(actor)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE products SET stock = stock - ?2, updated_at = ?3 WHERE id = ?1")
                .bind(product_id)
                .bind(quantity)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(
            order_id = %order_id,
            ingredients = consumption.len(),
            "Applied stock consumption"
        );

        Ok(ConsumptionResult {
            order_id: order_id.to_string(),
            consumed: consumption.into_iter().collect(),
            already_applied: false,
        })
    }

    /// Manual, non-recipe-driven adjustment used by inventory screens
    /// (intake, spoilage, count correction). Always updates cached stock
    /// directly, alongside the append-only ledger row.
    pub async fn add_movement(
        &self,
        product_id: &str,
        kind: MovementKind,
        quantity: f64,
        reason: &str,
        actor: &str,
        notes: Option<&str>,
    ) -> EngineResult<InventoryMovement> {
        validate_quantity(quantity)?;
        validate_reason(reason)?;
        validate_actor(actor, "actor")?;

        let movement = InventoryMovement {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            kind,
            quantity,
            reason: reason.trim().to_string(),
            reference_order_id: None,
            actor: actor.to_string(),
            notes: notes.map(str::to_string),
            created_at: Utc::now(),
        };

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE products SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(product_id)
        .bind(kind.signum() * quantity)
        .bind(movement.created_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(product_id.to_string()).into());
        }

        sqlx::query(
            r#"
            INSERT INTO inventory_movements (
                id, product_id, kind, quantity, reason,
                reference_order_id, actor, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7, ?8)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.product_id)
        .bind(movement.kind)
        .bind(movement.quantity)
        .bind(&movement.reason)
        .bind(&movement.actor)
        .bind(&movement.notes)
        .bind(movement.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            product_id = %product_id,
            kind = ?kind,
            quantity = %quantity,
            reason = %movement.reason,
            "Recorded manual inventory movement"
        );
        Ok(movement)
    }

    /// Movement history for a product, newest first.
    pub async fn history(&self, product_id: &str, limit: u32) -> DbResult<Vec<InventoryMovement>> {
        let movements = sqlx::query_as(
            r#"
            SELECT id, product_id, kind, quantity, reason,
                   reference_order_id, actor, notes, created_at
            FROM inventory_movements
            WHERE product_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// All movements recorded for an order.
    pub async fn movements_for_order(&self, order_id: &str) -> DbResult<Vec<InventoryMovement>> {
        let movements = sqlx::query_as(
            r#"
            SELECT id, product_id, kind, quantity, reason,
                   reference_order_id, actor, notes, created_at
            FROM inventory_movements
            WHERE reference_order_id = ?1
            ORDER BY product_id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Whether sale movements already exist for this order.
    async fn has_sale_movements(&self, order_id: &str) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM inventory_movements
             WHERE reference_order_id = ?1 AND reason = ?2",
        )
        .bind(order_id)
        .bind(REASON_SALE)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Pre-check gate for the `block_negative_stock` policy.
    async fn check_stock_covers(&self, consumption: &Consumption) -> EngineResult<()> {
        for (product_id, quantity) in consumption {
            let stock: Option<f64> =
                sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
                    .bind(product_id)
                    .fetch_optional(&self.pool)
                    .await?;

            let available =
                stock.ok_or_else(|| CoreError::ProductNotFound(product_id.clone()))?;

            if available < *quantity {
                return Err(CoreError::InsufficientStock {
                    product_id: product_id.clone(),
                    available,
                    requested: *quantity,
                }
                .into());
            }
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
