//! # Document Series Repository
//!
//! The document number allocator: issues the next sequential number for a
//! document series (ticket/receipt/invoice).
//!
//! ## The One Rule That Matters
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Allocating a Document Number                            │
//! │                                                                         │
//! │  ❌ WRONG: read-then-write (two round trips, lost updates under race)  │
//! │     SELECT current_number FROM document_series WHERE ...               │
//! │     UPDATE document_series SET current_number = <n+1> WHERE ...        │
//! │                                                                         │
//! │  ✅ CORRECT: one atomic claim                                          │
//! │     UPDATE document_series                                             │
//! │     SET current_number = current_number + 1                            │
//! │     WHERE document_type = ? AND is_active = 1                          │
//! │     RETURNING series_code, current_number                              │
//! │                                                                         │
//! │  Two terminals checking out at once each get their own number.         │
//! │  k concurrent callers starting at counter N receive exactly            │
//! │  {N+1 .. N+k} - no duplicates, no gaps beyond the increment.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The claim commits before the order row is written. If the enclosing
//! finalize later fails, the number is burned - a gap in the sequence is
//! acceptable, a duplicate never is.

use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult, EngineResult};
use caja_core::validation::validate_series_code;
use caja_core::{CoreError, DocumentNumber, DocumentSeries, DocumentType, ValidationError};

/// Repository for document series and number allocation.
#[derive(Debug, Clone)]
pub struct SeriesRepository {
    pool: SqlitePool,
}

impl SeriesRepository {
    /// Creates a new SeriesRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SeriesRepository { pool }
    }

    /// Allocates the next number from the active series of `document_type`.
    ///
    /// ## Guarantees
    /// - Serialized per series: concurrent allocations never observe the
    ///   same number (single-statement atomic increment)
    /// - The new counter value is durable before this returns; callers
    ///   must treat the allocation as committed even if their own work
    ///   later fails
    ///
    /// ## Errors
    /// - [`CoreError::NoActiveSeries`] when no active series exists for
    ///   the type. `Ticket` always has one (seeded by migration and
    ///   protected from deactivation), so ticket checkout cannot block.
    pub async fn allocate(&self, document_type: DocumentType) -> EngineResult<DocumentNumber> {
        let claimed: Option<(String, i64)> = sqlx::query_as(
            r#"
            UPDATE document_series
            SET current_number = current_number + 1
            WHERE document_type = ?1 AND is_active = 1
            RETURNING series_code, current_number
            "#,
        )
        .bind(document_type)
        .fetch_optional(&self.pool)
        .await?;

        match claimed {
            Some((series_code, number)) => {
                let allocated = DocumentNumber::new(series_code, number);
                debug!(
                    document_type = %document_type,
                    reference = %allocated.reference,
                    "Allocated document number"
                );
                Ok(allocated)
            }
            None => Err(CoreError::NoActiveSeries { document_type }.into()),
        }
    }

    /// Creates a new series.
    ///
    /// ## Arguments
    /// * `document_type` - class of document the series numbers
    /// * `series_code` - printed prefix, e.g. "F001" (alphanumeric)
    /// * `activate` - make this the active series for its type, atomically
    ///   deactivating the current one
    pub async fn create(
        &self,
        document_type: DocumentType,
        series_code: &str,
        activate: bool,
    ) -> EngineResult<DocumentSeries> {
        validate_series_code(series_code)?;

        let series = DocumentSeries {
            id: Uuid::new_v4().to_string(),
            document_type,
            series_code: series_code.trim().to_string(),
            current_number: 0,
            is_active: activate,
        };

        let mut tx = self.pool.begin().await?;

        if activate {
            // Make room under the one-active-per-type unique index
            sqlx::query("UPDATE document_series SET is_active = 0 WHERE document_type = ?1")
                .bind(document_type)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO document_series (id, document_type, series_code, current_number, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&series.id)
        .bind(series.document_type)
        .bind(&series.series_code)
        .bind(series.current_number)
        .bind(series.is_active)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            document_type = %document_type,
            series_code = %series.series_code,
            active = activate,
            "Created document series"
        );
        Ok(series)
    }

    /// Makes `id` the active series for its document type, deactivating
    /// the current active series of that type in the same transaction.
    pub async fn set_active(&self, id: &str) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;

        let target: Option<DocumentSeries> = sqlx::query_as(
            "SELECT id, document_type, series_code, current_number, is_active
             FROM document_series WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let target = target.ok_or_else(|| DbError::not_found("DocumentSeries", id))?;

        sqlx::query("UPDATE document_series SET is_active = 0 WHERE document_type = ?1")
            .bind(target.document_type)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE document_series SET is_active = 1 WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(series_code = %target.series_code, "Activated document series");
        Ok(())
    }

    /// Deactivates a series, blocking issuance for its type until another
    /// series is activated.
    ///
    /// The ticket type must always stay issuable, so deactivating a ticket
    /// series is rejected.
    pub async fn deactivate(&self, id: &str) -> EngineResult<()> {
        let target: Option<DocumentSeries> = sqlx::query_as(
            "SELECT id, document_type, series_code, current_number, is_active
             FROM document_series WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let target = target.ok_or_else(|| DbError::not_found("DocumentSeries", id))?;

        if target.document_type == DocumentType::Ticket {
            return Err(ValidationError::NotAllowed {
                field: "document_type".to_string(),
                value: DocumentType::Ticket.to_string(),
                reason: "the ticket series must always stay active".to_string(),
            }
            .into());
        }

        sqlx::query("UPDATE document_series SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!(series_code = %target.series_code, "Deactivated document series");
        Ok(())
    }

    /// Returns the active series for a document type, if any.
    pub async fn active_for(&self, document_type: DocumentType) -> DbResult<Option<DocumentSeries>> {
        let series = sqlx::query_as(
            "SELECT id, document_type, series_code, current_number, is_active
             FROM document_series
             WHERE document_type = ?1 AND is_active = 1",
        )
        .bind(document_type)
        .fetch_optional(&self.pool)
        .await?;

        Ok(series)
    }

    /// Lists all series, active first.
    pub async fn list(&self) -> DbResult<Vec<DocumentSeries>> {
        let series = sqlx::query_as(
            "SELECT id, document_type, series_code, current_number, is_active
             FROM document_series
             ORDER BY is_active DESC, document_type, series_code",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(series)
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

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_sequential_allocation() {
        let db = test_db().await;
        let repo = db.series();

        let first = repo.allocate(DocumentType::Ticket).await.unwrap();
        let second = repo.allocate(DocumentType::Ticket).await.unwrap();
        let third = repo.allocate(DocumentType::Ticket).await.unwrap();

        assert_eq!(first.number, 1);
        assert_eq!(second.number, 2);
        assert_eq!(third.number, 3);
        assert_eq!(first.reference, "T001-00000001");
    }

    #[tokio::test]
    async fn test_no_active_series_blocks_issuance() {
        let db = test_db().await;
        let repo = db.series();

        let err = repo.allocate(DocumentType::Invoice).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::NoActiveSeries {
                document_type: DocumentType::Invoice
            })
        ));

        // Configuring a series unblocks it
        repo.create(DocumentType::Invoice, "F001", true).await.unwrap();
        let allocated = repo.allocate(DocumentType::Invoice).await.unwrap();
        assert_eq!(allocated.reference, "F001-00000001");
    }

    #[tokio::test]
    async fn test_concurrent_allocations_are_unique_and_gapless() {
        let db = test_db().await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let repo = db.series();
            handles.push(tokio::spawn(async move {
                repo.allocate(DocumentType::Ticket).await.unwrap().number
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap());
        }
        numbers.sort_unstable();

        // Exactly {1..10}: no duplicates, no gaps
        assert_eq!(numbers, (1..=10).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_counters_are_independent_per_type() {
        let db = test_db().await;
        let repo = db.series();
        repo.create(DocumentType::Receipt, "B001", true).await.unwrap();

        repo.allocate(DocumentType::Ticket).await.unwrap();
        repo.allocate(DocumentType::Ticket).await.unwrap();
        let receipt = repo.allocate(DocumentType::Receipt).await.unwrap();

        assert_eq!(receipt.number, 1);
    }

    #[tokio::test]
    async fn test_set_active_switches_within_type() {
        let db = test_db().await;
        let repo = db.series();

        let first = repo.create(DocumentType::Receipt, "B001", true).await.unwrap();
        let second = repo.create(DocumentType::Receipt, "B002", false).await.unwrap();

        repo.set_active(&second.id).await.unwrap();

        let active = repo.active_for(DocumentType::Receipt).await.unwrap().unwrap();
        assert_eq!(active.id, second.id);

        // Exactly one active receipt series remains
        let receipts: Vec<_> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .filter(|s| s.document_type == DocumentType::Receipt && s.is_active)
            .collect();
        assert_eq!(receipts.len(), 1);
        assert_ne!(first.id, receipts[0].id);
    }

    #[tokio::test]
    async fn test_ticket_series_cannot_be_deactivated() {
        let db = test_db().await;
        let repo = db.series();

        let ticket = repo.active_for(DocumentType::Ticket).await.unwrap().unwrap();
        let err = repo.deactivate(&ticket.id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(CoreError::Validation(_))
        ));

        // Still active
        assert!(repo.active_for(DocumentType::Ticket).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalid_series_code_rejected() {
        let db = test_db().await;
        let repo = db.series();

        assert!(repo.create(DocumentType::Receipt, "", true).await.is_err());
        assert!(repo.create(DocumentType::Receipt, "B-01", true).await.is_err());
    }
}
