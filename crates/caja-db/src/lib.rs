//! # caja-db: Database Layer for Caja POS
//!
//! This crate provides database access for the Caja POS system, plus the
//! order finalization engines that must hit the authoritative store on
//! every call. It uses SQLite for local storage with sqlx for async
//! operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja POS Data Flow                               │
//! │                                                                         │
//! │  UI/API layer: finalize(cart, payment, ...), openShift, closeShift     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     caja-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐   ┌────────────────────┐   ┌─────────────┐  │   │
//! │  │   │   Database   │   │    Repositories    │   │  Checkout   │  │   │
//! │  │   │  (pool.rs)   │   │ series  inventory  │   │  (service)  │  │   │
//! │  │   │              │◄──│ orders  loyalty    │◄──│  finalize   │  │   │
//! │  │   │  SqlitePool  │   │ shifts  products   │   │  sequence   │  │   │
//! │  │   └──────────────┘   └────────────────────┘   └─────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL mode, embedded migrations)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and engine error types
//! - [`repository`] - Repository implementations (series, orders, ...)
//! - [`checkout`] - The order finalization orchestrator
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caja_db::{Database, DbConfig};
//! use caja_core::CheckoutPolicy;
//!
//! let db = Database::new(DbConfig::new("path/to/caja.db")).await?;
//!
//! // Shift ledger
//! let shift = db.shifts().open("ana", 10_000).await?;
//!
//! // Finalize a sale
//! let outcome = db.checkout(CheckoutPolicy::default()).finalize(request).await?;
//!
//! // Reconcile the drawer
//! let close = db.shifts().close(&shift.id, 14_000).await?;
//! println!("discrepancy: {}", close.discrepancy_cents);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, EngineError};
pub use pool::{Database, DbConfig};

// Engine re-exports for convenience
pub use checkout::{
    CheckoutService, DegradedStep, FinalizeOutcome, FinalizeRequest, FinalizeStep, PaymentInfo,
    PendingRequest,
};
pub use repository::inventory::{ConsumptionResult, InventoryRepository};
pub use repository::loyalty::LoyaltyRepository;
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
pub use repository::series::SeriesRepository;
pub use repository::shift::{ShiftCloseResult, ShiftRepository};
