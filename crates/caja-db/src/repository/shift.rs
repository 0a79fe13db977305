//! # Shift Repository
//!
//! The shift ledger: tracks each cashier's open cash-drawer period and
//! reconciles expected vs counted cash at close.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Shift Lifecycle                                    │
//! │                                                                         │
//! │  open(cashier, 100.00)                                                 │
//! │       │  plain INSERT - the partial unique index on                    │
//! │       │  (cashier_id WHERE end_time IS NULL) turns a double-open       │
//! │       │  into ShiftAlreadyOpen, atomically                             │
//! │       ▼                                                                 │
//! │  OPEN ── completed orders reference shift_id ──┐                       │
//! │       │                                        │  totals are DERIVED   │
//! │       │                                        │  by summing orders,   │
//! │       │                                        │  never stored         │
//! │       ▼                                        │                       │
//! │  close(shift, counted=140.00)  ◄───────────────┘                       │
//! │       │  expected = 100.00 + Σ cash orders (25.50 + 14.00) = 139.50    │
//! │       │  discrepancy = counted - expected = +0.50 (reported verbatim)  │
//! │       ▼                                                                 │
//! │  CLOSED (terminal; only audit notes may be added)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult, EngineResult};
use caja_core::validation::validate_cash_amount;
use caja_core::{CoreError, MethodTotal, Shift, ShiftSummary};

/// Result of closing a shift: the reconciliation the operator sees.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ShiftCloseResult {
    pub shift: Shift,
    pub expected_cash_cents: i64,
    pub counted_cash_cents: i64,
    /// counted - expected. Positive = surplus, negative = shortage.
    /// Reported, never auto-corrected.
    pub discrepancy_cents: i64,
}

/// Repository for shift database operations.
#[derive(Debug, Clone)]
pub struct ShiftRepository {
    pool: SqlitePool,
}

impl ShiftRepository {
    /// Creates a new ShiftRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ShiftRepository { pool }
    }

    /// Opens a shift for a cashier.
    ///
    /// Check-and-insert in ONE round trip: the insert itself collides with
    /// the partial unique index if the cashier already has an open shift,
    /// so two terminals racing to open can never both succeed.
    ///
    /// ## Errors
    /// - [`CoreError::ShiftAlreadyOpen`] - cashier has an open shift
    pub async fn open(&self, cashier_id: &str, start_cash_cents: i64) -> EngineResult<Shift> {
        caja_core::validation::validate_actor(cashier_id, "cashier_id")?;
        validate_cash_amount(start_cash_cents)?;

        let shift = Shift {
            id: Uuid::new_v4().to_string(),
            cashier_id: cashier_id.to_string(),
            start_time: Utc::now(),
            start_cash_cents,
            end_time: None,
            end_cash_cents: None,
            expected_cash_cents: None,
            notes: None,
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO shifts (id, cashier_id, start_time, start_cash_cents)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&shift.id)
        .bind(&shift.cashier_id)
        .bind(shift.start_time)
        .bind(shift.start_cash_cents)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {
                info!(shift_id = %shift.id, cashier_id = %cashier_id, "Opened shift");
                Ok(shift)
            }
            Err(err) => match DbError::from(err) {
                DbError::UniqueViolation { .. } => Err(CoreError::ShiftAlreadyOpen {
                    cashier_id: cashier_id.to_string(),
                }
                .into()),
                other => Err(other.into()),
            },
        }
    }

    /// The cashier's open shift, if any.
    pub async fn find_open(&self, cashier_id: &str) -> DbResult<Option<Shift>> {
        let shift = sqlx::query_as(
            r#"
            SELECT id, cashier_id, start_time, start_cash_cents,
                   end_time, end_cash_cents, expected_cash_cents, notes
            FROM shifts
            WHERE cashier_id = ?1 AND end_time IS NULL
            "#,
        )
        .bind(cashier_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(shift)
    }

    /// Cheap "has open shift" check backing the session layer's
    /// sign-out block.
    pub async fn has_open(&self, cashier_id: &str) -> DbResult<bool> {
        Ok(self.find_open(cashier_id).await?.is_some())
    }

    /// Gets a shift by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Shift>> {
        let shift = sqlx::query_as(
            r#"
            SELECT id, cashier_id, start_time, start_cash_cents,
                   end_time, end_cash_cents, expected_cash_cents, notes
            FROM shifts
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(shift)
    }

    /// Sales within a shift, grouped by payment method.
    ///
    /// Derived on demand from the completed orders that reference this
    /// shift - the shift row itself stores no running totals.
    pub async fn totals_by_method(&self, shift_id: &str) -> DbResult<Vec<MethodTotal>> {
        let totals = sqlx::query_as(
            r#"
            SELECT payment_method,
                   COUNT(*) AS order_count,
                   CAST(SUM(total_cents) AS INTEGER) AS total_cents
            FROM orders
            WHERE shift_id = ?1 AND status = 'completed'
            GROUP BY payment_method
            ORDER BY payment_method
            "#,
        )
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(totals)
    }

    /// Closes a shift against the physically counted cash.
    ///
    /// `expected = start_cash + Σ cash-method completed order totals`.
    /// Both counted and expected are persisted verbatim; the signed
    /// discrepancy is returned for the operator, never corrected.
    ///
    /// ## Errors
    /// - [`CoreError::ShiftNotOpen`] - shift is unknown, or already closed
    ///   (the guarded UPDATE makes a racing double-close lose cleanly)
    pub async fn close(
        &self,
        shift_id: &str,
        counted_cash_cents: i64,
    ) -> EngineResult<ShiftCloseResult> {
        validate_cash_amount(counted_cash_cents)?;

        let shift = self
            .get_by_id(shift_id)
            .await?
            .ok_or_else(|| CoreError::ShiftNotOpen {
                shift_id: shift_id.to_string(),
            })?;

        let cash_sales: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT CAST(SUM(total_cents) AS INTEGER)
            FROM orders
            WHERE shift_id = ?1 AND status = 'completed' AND payment_method = 'cash'
            "#,
        )
        .bind(shift_id)
        .fetch_one(&self.pool)
        .await?;

        let expected_cash_cents = shift.start_cash_cents + cash_sales.unwrap_or(0);
        let end_time = Utc::now();

        // Guarded UPDATE: only an open shift transitions. A second closer
        // (or a closer racing a concurrent close) affects zero rows.
        let result = sqlx::query(
            r#"
            UPDATE shifts
            SET end_time = ?2, end_cash_cents = ?3, expected_cash_cents = ?4
            WHERE id = ?1 AND end_time IS NULL
            "#,
        )
        .bind(shift_id)
        .bind(end_time)
        .bind(counted_cash_cents)
        .bind(expected_cash_cents)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ShiftNotOpen {
                shift_id: shift_id.to_string(),
            }
            .into());
        }

        let discrepancy_cents = counted_cash_cents - expected_cash_cents;
        info!(
            shift_id = %shift_id,
            expected = expected_cash_cents,
            counted = counted_cash_cents,
            discrepancy = discrepancy_cents,
            "Closed shift"
        );

        let closed = Shift {
            end_time: Some(end_time),
            end_cash_cents: Some(counted_cash_cents),
            expected_cash_cents: Some(expected_cash_cents),
            ..shift
        };

        Ok(ShiftCloseResult {
            shift: closed,
            expected_cash_cents,
            counted_cash_cents,
            discrepancy_cents,
        })
    }

    /// Shift row plus derived per-method totals, for shift-detail views.
    pub async fn summary(&self, shift_id: &str) -> EngineResult<ShiftSummary> {
        let shift = self
            .get_by_id(shift_id)
            .await?
            .ok_or_else(|| DbError::not_found("Shift", shift_id))?;

        let totals = self.totals_by_method(shift_id).await?;

        Ok(ShiftSummary { shift, totals })
    }

    /// Appends an audit note. The only mutation allowed on a closed shift.
    pub async fn add_note(&self, shift_id: &str, note: &str) -> DbResult<()> {
        debug!(shift_id = %shift_id, "Adding shift note");

        let result = sqlx::query(
            r#"
            UPDATE shifts
            SET notes = CASE
                WHEN notes IS NULL OR notes = '' THEN ?2
                ELSE notes || char(10) || ?2
            END
            WHERE id = ?1
            "#,
        )
        .bind(shift_id)
        .bind(note)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Shift", shift_id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::pool::{Database, DbConfig};
    use crate::repository::order::generate_order_id;
    use caja_core::{DocumentType, Order, OrderStatus, PaymentMethod};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn record_completed_sale(
        db: &Database,
        shift_id: &str,
        method: PaymentMethod,
        total_cents: i64,
    ) {
        let now = Utc::now();
        let order = Order {
            id: generate_order_id(),
            shift_id: shift_id.to_string(),
            cashier_id: "ana".to_string(),
            customer_id: None,
            subtotal_cents: total_cents,
            tax_cents: 0,
            total_cents,
            payment_method: method,
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
        };
        db.orders().save_with_items(&order, &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_double_open_rejected_without_second_row() {
        let db = test_db().await;
        let shifts = db.shifts();

        shifts.open("ana", 10000).await.unwrap();

        let err = shifts.open("ana", 5000).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::ShiftAlreadyOpen { .. })
        ));

        // No second row was created; a different cashier is unaffected
        assert!(shifts.has_open("ana").await.unwrap());
        shifts.open("luis", 5000).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shifts")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_close_reconciles_cash_example() {
        // The canonical drawer example: open with 100.00, two cash sales
        // of 25.50 and 14.00, count 140.00 → expected 139.50, surplus 0.50
        let db = test_db().await;
        let shifts = db.shifts();

        let shift = shifts.open("ana", 10000).await.unwrap();
        record_completed_sale(&db, &shift.id, PaymentMethod::Cash, 2550).await;
        record_completed_sale(&db, &shift.id, PaymentMethod::Cash, 1400).await;
        // Card sales never count toward drawer cash
        record_completed_sale(&db, &shift.id, PaymentMethod::Card, 9999).await;

        let result = shifts.close(&shift.id, 14000).await.unwrap();

        assert_eq!(result.expected_cash_cents, 13950);
        assert_eq!(result.counted_cash_cents, 14000);
        assert_eq!(result.discrepancy_cents, 50);

        // Both values persisted verbatim
        let stored = shifts.get_by_id(&shift.id).await.unwrap().unwrap();
        assert_eq!(stored.end_cash_cents, Some(14000));
        assert_eq!(stored.expected_cash_cents, Some(13950));
        assert_eq!(stored.discrepancy_cents(), Some(50));
        assert!(!stored.is_open());
    }

    #[tokio::test]
    async fn test_close_twice_fails() {
        let db = test_db().await;
        let shifts = db.shifts();

        let shift = shifts.open("ana", 0).await.unwrap();
        shifts.close(&shift.id, 0).await.unwrap();

        let err = shifts.close(&shift.id, 0).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::ShiftNotOpen { .. })
        ));

        // Unknown shift fails the same way
        let err = shifts.close("missing", 0).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::ShiftNotOpen { .. })
        ));
    }

    #[tokio::test]
    async fn test_reopen_after_close_creates_new_instance() {
        let db = test_db().await;
        let shifts = db.shifts();

        let first = shifts.open("ana", 1000).await.unwrap();
        shifts.close(&first.id, 1000).await.unwrap();

        // Closed is terminal per instance; the next period is a new row
        let second = shifts.open("ana", 2000).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(
            shifts.find_open("ana").await.unwrap().unwrap().id,
            second.id
        );
    }

    #[tokio::test]
    async fn test_totals_by_method_derive_from_orders() {
        let db = test_db().await;
        let shifts = db.shifts();

        let shift = shifts.open("ana", 0).await.unwrap();
        record_completed_sale(&db, &shift.id, PaymentMethod::Cash, 2550).await;
        record_completed_sale(&db, &shift.id, PaymentMethod::Cash, 1400).await;
        record_completed_sale(&db, &shift.id, PaymentMethod::Card, 5000).await;

        let summary = shifts.summary(&shift.id).await.unwrap();
        assert_eq!(summary.totals.len(), 2);

        let cash = summary
            .totals
            .iter()
            .find(|t| t.payment_method == PaymentMethod::Cash)
            .unwrap();
        assert_eq!(cash.order_count, 2);
        assert_eq!(cash.total_cents, 3950);

        let card = summary
            .totals
            .iter()
            .find(|t| t.payment_method == PaymentMethod::Card)
            .unwrap();
        assert_eq!(card.total_cents, 5000);
    }

    #[tokio::test]
    async fn test_audit_notes_append_after_close() {
        let db = test_db().await;
        let shifts = db.shifts();

        let shift = shifts.open("ana", 0).await.unwrap();
        shifts.close(&shift.id, 0).await.unwrap();

        shifts.add_note(&shift.id, "faltante autorizado").await.unwrap();
        shifts.add_note(&shift.id, "revisado por gerencia").await.unwrap();

        let stored = shifts.get_by_id(&shift.id).await.unwrap().unwrap();
        let notes = stored.notes.unwrap();
        assert!(notes.contains("faltante autorizado"));
        assert!(notes.contains("revisado por gerencia"));
    }

    #[tokio::test]
    async fn test_negative_start_cash_rejected() {
        let db = test_db().await;
        assert!(db.shifts().open("ana", -1).await.is_err());
    }
}
