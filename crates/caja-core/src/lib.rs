//! # caja-core: Pure Business Logic for Caja POS
//!
//! This crate is the **heart** of Caja POS. It contains all business logic
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                UI / API layer (external collaborator)           │   │
//! │  │    Catalog UI ──► Cart UI ──► Tender UI ──► Receipt printing   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ caja-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  recipe   │  │  loyalty  │  │   │
//! │  │   │  Product  │  │   Money   │  │ expansion │  │   rules   │  │   │
//! │  │   │   Order   │  │  TaxRate  │  │  + cycles │  │ + points  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    caja-db (Database Layer)                     │   │
//! │  │     SQLite repositories, migrations, checkout orchestration    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Order, Shift, DocumentSeries, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`recipe`] - Composite product expansion with cycle detection
//! - [`loyalty`] - Loyalty rule evaluation and point accrual
//! - [`config`] - Checkout policy knobs
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit identity**: every operation takes `cashier_id`/`customer_id` as
//!    arguments - there is no ambient "current user" anywhere in the engine
//! 5. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod loyalty;
pub mod money;
pub mod recipe;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use caja_core::Money` instead of
// `use caja_core::money::Money`

pub use config::CheckoutPolicy;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use recipe::{Consumption, RecipeGraph};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Width of the numeric part of a document reference.
///
/// A reference is rendered as `SERIES-NNNNNNNN`, e.g. `F001-00000042`.
pub const DOCUMENT_NUMBER_WIDTH: usize = 8;

/// Movement reason recorded for order-driven stock consumption.
///
/// Inventory-history views group by this string, so it is a stable constant
/// rather than free text.
pub const REASON_SALE: &str = "Venta";

/// Maximum quantity of a single line item.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
/// Configurable per-tenant in future versions.
pub const MAX_LINE_QUANTITY: f64 = 999.0;

/// Maximum line items allowed in a single cart.
///
/// ## Business Reason
/// Prevents runaway carts and ensures reasonable transaction sizes.
pub const MAX_CART_LINES: usize = 100;
