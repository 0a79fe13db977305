//! # Domain Types
//!
//! Core domain types used throughout Caja POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Order       │   │     Shift       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  kind           │   │  document ref   │   │  cashier_id     │       │
//! │  │  stock          │   │  status/totals  │   │  start/end cash │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ DocumentSeries  │   │InventoryMovement│   │  LoyaltyRule    │       │
//! │  │  one active per │   │  append-only    │   │  threshold +    │       │
//! │  │  document type  │   │  stock ledger   │   │  reward         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity has a UUID v4 string `id` used for database relations.
//! Cashiers and customers are referenced by opaque ids owned by the
//! surrounding user-management / registry collaborators; the engine never
//! resolves them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::DOCUMENT_NUMBER_WIDTH;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1600 bps = 16% (e.g., IVA general)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Product
// =============================================================================

/// Whether a product tracks its own stock or derives it from a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    /// Stock is tracked directly on the product row.
    Simple,
    /// Stock derives from recipe edges; selling one expands into
    /// consumption of its (recursively simple) ingredients.
    Composite,
}

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown to cashier and on the printed document.
    pub name: String,

    /// Simple (tracked stock) or composite (recipe-driven).
    pub kind: ProductKind,

    /// Unit the stock level is counted in ("unit", "kg", "l", ...).
    pub unit_of_measure: String,

    /// Base price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Cached stock level. Meaningful only for `Simple` products; kept
    /// consistent with the inventory_movements ledger by writing both in
    /// the same transaction. May go negative under the default policy.
    pub stock: f64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the base price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// True when the cached stock level is at or below zero.
    ///
    /// Negative stock is legal (sales are not gated on inventory by
    /// default) and is surfaced to catalog views through this signal.
    #[inline]
    pub fn is_stock_depleted(&self) -> bool {
        matches!(self.kind, ProductKind::Simple) && self.stock <= 0.0
    }
}

/// A quantity relationship from a composite product to one ingredient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RecipeEdge {
    pub parent_product_id: String,
    pub ingredient_product_id: String,
    /// How much of the ingredient one unit of the parent consumes.
    pub quantity_per_unit: f64,
}

// =============================================================================
// Documents
// =============================================================================

/// The class of sale document issued at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Internal ticket. Always has an active series; never blocked.
    Ticket,
    /// Simplified receipt (boleta).
    Receipt,
    /// Full tax invoice (factura).
    Invoice,
}

impl DocumentType {
    /// Stable lowercase name, matching the persisted representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Ticket => "ticket",
            DocumentType::Receipt => "receipt",
            DocumentType::Invoice => "invoice",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, independently-numbered sequence for one class of document.
///
/// `current_number` is the single source of truth for numbering. It only
/// increases, and only via an atomic increment-and-return - never a
/// read-modify-write in application code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DocumentSeries {
    pub id: String,
    pub document_type: DocumentType,
    pub series_code: String,
    pub current_number: i64,
    pub is_active: bool,
}

/// The result of allocating one number from a series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentNumber {
    pub series_code: String,
    pub number: i64,
    /// Rendered `SERIES-NNNNNNNN` reference, e.g. `F001-00000042`.
    pub reference: String,
}

impl DocumentNumber {
    /// Builds an allocation result, rendering the zero-padded reference.
    pub fn new(series_code: impl Into<String>, number: i64) -> Self {
        let series_code = series_code.into();
        let reference = format!(
            "{}-{:0width$}",
            series_code,
            number,
            width = DOCUMENT_NUMBER_WIDTH
        );
        DocumentNumber {
            series_code,
            number,
            reference,
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

/// The status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Open tab (e.g. dine-in table). Line items may be fully replaced
    /// any number of times before finalization.
    Pending,
    /// Paid and finalized. Terminal; line items are frozen.
    Completed,
    /// Cancelled before finalization. Terminal.
    Voided,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

/// How an order was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash. The only method that affects drawer reconciliation.
    Cash,
    /// Card payment on an external terminal.
    Card,
    /// Bank transfer / QR payment.
    Transfer,
}

/// A sale, either an open tab or a finalized document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    /// Shift this order counts toward for cash reconciliation.
    pub shift_id: String,
    pub cashier_id: String,
    /// Absent for anonymous sales; loyalty is skipped in that case.
    pub customer_id: Option<String>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    /// External payment metadata (card auth code, transfer id, ...).
    pub payment_reference: Option<String>,
    /// For cash: amount the customer handed over.
    pub tendered_cents: Option<i64>,
    /// For cash: change returned to the customer.
    pub change_cents: Option<i64>,
    pub status: OrderStatus,
    pub document_type: DocumentType,
    /// Series code of the allocated document number. None while pending.
    pub document_series: Option<String>,
    /// Allocated sequential number. None while pending.
    pub document_number: Option<i64>,
    /// Dine-in table label for open tabs.
    pub table_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Returns the total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Rendered document reference, when a number has been allocated.
    pub fn document_reference(&self) -> Option<String> {
        match (&self.document_series, self.document_number) {
            (Some(series), Some(number)) => Some(DocumentNumber::new(series.clone(), number).reference),
            _ => None,
        }
    }
}

/// A line item on an order.
/// Uses the snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    /// Quantity sold. Fractional for weight-sold products.
    pub quantity: f64,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Free-form modifier list as JSON (e.g. `["sin azúcar"]`).
    pub modifiers: Option<String>,
    pub notes: Option<String>,
}

impl OrderItem {
    /// Returns the frozen unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Line total (unit price × quantity), rounded to the cent.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

/// One line of an incoming cart, before it becomes a persisted OrderItem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub variant_id: Option<String>,
    /// Display name captured by the UI at add-to-cart time.
    pub name: String,
    pub quantity: f64,
    /// Price at add-to-cart time; frozen onto the order item.
    pub unit_price_cents: i64,
    pub modifiers: Option<String>,
    pub notes: Option<String>,
}

impl CartLine {
    /// Line total (unit price × quantity), rounded to the cent.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// Direction of an inventory movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    In,
    Out,
}

impl MovementKind {
    /// Signed multiplier applied to the cached stock value.
    #[inline]
    pub const fn signum(&self) -> f64 {
        match self {
            MovementKind::In => 1.0,
            MovementKind::Out => -1.0,
        }
    }
}

/// One row of the append-only stock ledger.
///
/// The cached `Product.stock` is a running sum of these rows; both are
/// always written in the same transaction so they cannot drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryMovement {
    pub id: String,
    pub product_id: String,
    pub kind: MovementKind,
    /// Always positive; direction is carried by `kind`.
    pub quantity: f64,
    pub reason: String,
    /// Set for order-driven consumption; the idempotence key.
    pub reference_order_id: Option<String>,
    /// Cashier or manager who caused the movement. Explicit, never ambient.
    pub actor: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Loyalty
// =============================================================================

/// What a loyalty rule tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum RuleCondition {
    /// Fires when a single order total strictly exceeds the threshold.
    SingleTransactionAmount,
    /// Fires when the customer's completed spend in the current calendar
    /// month (including the current order) strictly exceeds the threshold.
    RollingMonthlySpend,
}

/// What a triggered rule grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    /// A specific product comped on a future visit.
    FreeProduct,
    /// Free-text reward honored manually by staff.
    Custom,
}

/// A configured loyalty rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LoyaltyRule {
    pub id: String,
    pub condition: RuleCondition,
    pub threshold_cents: i64,
    pub reward: RewardKind,
    pub reward_product_id: Option<String>,
    pub reward_description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// The output of a loyalty rule firing.
///
/// Multiple rules may fire for the same order; all grants are surfaced,
/// with no implicit precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardGrant {
    pub rule_id: String,
    pub reward_description: String,
    pub reward_product_id: Option<String>,
}

/// A customer's accumulated loyalty standing.
/// Mutated only by the loyalty engine; read by customer-facing UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CustomerLoyaltyState {
    pub customer_id: String,
    pub points_balance: i64,
    pub lifetime_spend_cents: i64,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Shifts
// =============================================================================

/// A cashier's open cash-drawer period.
///
/// ## Lifecycle
/// ```text
/// open(cashier, start_cash) ──► accumulates completed orders ──► close(counted)
/// ```
/// At most one open shift (end_time = NULL) per cashier, enforced by a
/// partial unique index. Totals are never stored on the row; they are
/// derived by summing the completed orders that reference it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Shift {
    pub id: String,
    pub cashier_id: String,
    pub start_time: DateTime<Utc>,
    pub start_cash_cents: i64,
    pub end_time: Option<DateTime<Utc>>,
    /// Cash physically counted at close. Persisted verbatim.
    pub end_cash_cents: Option<i64>,
    /// start_cash + Σ cash-method completed order totals, computed at close.
    pub expected_cash_cents: Option<i64>,
    /// Audit notes; the only field writable after close.
    pub notes: Option<String>,
}

impl Shift {
    /// Whether this shift is still open.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Signed counted-minus-expected difference, once closed.
    /// Positive = surplus, negative = shortage. Reported, never corrected.
    pub fn discrepancy_cents(&self) -> Option<i64> {
        match (self.end_cash_cents, self.expected_cash_cents) {
            (Some(counted), Some(expected)) => Some(counted - expected),
            _ => None,
        }
    }
}

/// Aggregated sales for one payment method within a shift.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MethodTotal {
    pub payment_method: PaymentMethod,
    pub order_count: i64,
    pub total_cents: i64,
}

/// Shift row plus derived totals, for shift-detail reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftSummary {
    pub shift: Shift,
    pub totals: Vec<MethodTotal>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_reference_padding() {
        let n = DocumentNumber::new("F001", 42);
        assert_eq!(n.reference, "F001-00000042");

        let n = DocumentNumber::new("T001", 12345678);
        assert_eq!(n.reference, "T001-12345678");
    }

    #[test]
    fn test_document_type_as_str() {
        assert_eq!(DocumentType::Ticket.as_str(), "ticket");
        assert_eq!(DocumentType::Invoice.to_string(), "invoice");
    }

    #[test]
    fn test_order_status_default() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_cart_line_total() {
        let line = CartLine {
            product_id: "p1".to_string(),
            variant_id: None,
            name: "Café americano".to_string(),
            quantity: 2.0,
            unit_price_cents: 1275,
            modifiers: None,
            notes: None,
        };
        assert_eq!(line.line_total().cents(), 2550);
    }

    #[test]
    fn test_shift_discrepancy() {
        let mut shift = Shift {
            id: "s1".to_string(),
            cashier_id: "c1".to_string(),
            start_time: Utc::now(),
            start_cash_cents: 10000,
            end_time: None,
            end_cash_cents: None,
            expected_cash_cents: None,
            notes: None,
        };
        assert!(shift.is_open());
        assert_eq!(shift.discrepancy_cents(), None);

        shift.end_time = Some(Utc::now());
        shift.end_cash_cents = Some(14000);
        shift.expected_cash_cents = Some(13950);
        assert!(!shift.is_open());
        assert_eq!(shift.discrepancy_cents(), Some(50));
    }

    #[test]
    fn test_movement_kind_signum() {
        assert_eq!(MovementKind::In.signum(), 1.0);
        assert_eq!(MovementKind::Out.signum(), -1.0);
    }
}
