//! # Order Repository
//!
//! Database operations for orders and their line items.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. OPEN TAB (optional)                                                │
//! │     └── save_with_items() → Order { status: Pending }                  │
//! │         (rewritten freely: line items fully replaced each save)        │
//! │                                                                         │
//! │  2. FINALIZE (via CheckoutService)                                     │
//! │     └── save_with_items() → Order { status: Completed }                │
//! │         + document reference + payment info, items replaced once more  │
//! │                                                                         │
//! │  3. (OR) VOID                                                          │
//! │     └── void_pending() → Order { status: Voided }                      │
//! │         Only pending orders can be voided; completed is terminal.      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The order row and its items are always written in one transaction, so a
//! reader never sees a completed order with half-replaced items.

use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbResult, EngineResult};
use caja_core::{CoreError, Order, OrderItem, OrderStatus};
use chrono::{DateTime, Utc};

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

const ORDER_COLUMNS: &str = r#"
    id, shift_id, cashier_id, customer_id,
    subtotal_cents, tax_cents, total_cents,
    payment_method, payment_reference, tendered_cents, change_cents,
    status, document_type, document_series, document_number,
    table_reference, created_at, updated_at, completed_at
"#;

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets all line items for an order.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as(
            r#"
            SELECT id, order_id, product_id, variant_id, name_snapshot,
                   quantity, unit_price_cents, modifiers, notes
            FROM order_items
            WHERE order_id = ?1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Upserts an order and atomically replaces its line items.
    ///
    /// ## Used By
    /// - `save_pending`: rewriting an open tab (any number of times)
    /// - `finalize`: the one transition to `completed`
    ///
    /// One transaction covers the order row and the full item replacement.
    pub async fn save_with_items(&self, order: &Order, items: &[OrderItem]) -> DbResult<()> {
        debug!(
            id = %order.id,
            status = ?order.status,
            items = items.len(),
            "Saving order with items"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, shift_id, cashier_id, customer_id,
                subtotal_cents, tax_cents, total_cents,
                payment_method, payment_reference, tendered_cents, change_cents,
                status, document_type, document_series, document_number,
                table_reference, created_at, updated_at, completed_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7,
                ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15,
                ?16, ?17, ?18, ?19
            )
            ON CONFLICT(id) DO UPDATE SET
                shift_id = excluded.shift_id,
                cashier_id = excluded.cashier_id,
                customer_id = excluded.customer_id,
                subtotal_cents = excluded.subtotal_cents,
                tax_cents = excluded.tax_cents,
                total_cents = excluded.total_cents,
                payment_method = excluded.payment_method,
                payment_reference = excluded.payment_reference,
                tendered_cents = excluded.tendered_cents,
                change_cents = excluded.change_cents,
                status = excluded.status,
                document_type = excluded.document_type,
                document_series = excluded.document_series,
                document_number = excluded.document_number,
                table_reference = excluded.table_reference,
                updated_at = excluded.updated_at,
                completed_at = excluded.completed_at
            "#,
        )
        .bind(&order.id)
        .bind(&order.shift_id)
        .bind(&order.cashier_id)
        .bind(&order.customer_id)
        .bind(order.subtotal_cents)
        .bind(order.tax_cents)
        .bind(order.total_cents)
        .bind(order.payment_method)
        .bind(&order.payment_reference)
        .bind(order.tendered_cents)
        .bind(order.change_cents)
        .bind(order.status)
        .bind(order.document_type)
        .bind(&order.document_series)
        .bind(order.document_number)
        .bind(&order.table_reference)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.completed_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM order_items WHERE order_id = ?1")
            .bind(&order.id)
            .execute(&mut *tx)
            .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, variant_id, name_snapshot,
                    quantity, unit_price_cents, modifiers, notes
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&item.id)
            .bind(&item.order_id)
            .bind(&item.product_id)
            .bind(&item.variant_id)
            .bind(&item.name_snapshot)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(&item.modifiers)
            .bind(&item.notes)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    /// Voids a pending order (open tab abandoned or cancelled).
    ///
    /// Completed orders are terminal and cannot be voided through the
    /// engine; corrections happen as new documents.
    pub async fn void_pending(&self, order_id: &str) -> EngineResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'voided', updated_at = ?2
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(order_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::OrderNotFound(order_id.to_string()).into());
        }

        debug!(id = %order_id, "Voided pending order");
        Ok(())
    }

    /// Returns the order id if it exists as a still-amendable pending tab.
    ///
    /// Finalize uses this for the existing-order fallback: a tab that was
    /// concurrently voided (or never existed) yields `None` and the sale
    /// proceeds under a fresh order id.
    pub async fn amendable(&self, order_id: &str) -> DbResult<Option<Order>> {
        let order: Option<Order> = self.get_by_id(order_id).await?;
        Ok(order.filter(|o| o.status == OrderStatus::Pending))
    }

    /// Sum of completed order totals for a customer since `since`.
    ///
    /// Backs the rolling-monthly-spend loyalty condition; the caller passes
    /// the first instant of the current calendar month.
    pub async fn completed_spend_since(
        &self,
        customer_id: &str,
        since: DateTime<Utc>,
    ) -> DbResult<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT CAST(SUM(total_cents) AS INTEGER)
            FROM orders
            WHERE customer_id = ?1 AND status = 'completed' AND created_at >= ?2
            "#,
        )
        .bind(customer_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(0))
    }

    /// Lists orders belonging to a shift, newest first.
    pub async fn list_by_shift(&self, shift_id: &str) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE shift_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }
}

/// Generates a new order ID.
pub fn generate_order_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new order item ID.
pub fn generate_order_item_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
