//! # Repository Module
//!
//! Database repository implementations for Caja POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Caller                                                                │
//! │       │                                                                 │
//! │       │  db.series().allocate(DocumentType::Ticket)                    │
//! │       ▼                                                                 │
//! │  SeriesRepository                                                      │
//! │  ├── allocate(&self, document_type)                                    │
//! │  ├── create(&self, ...)                                                │
//! │  └── set_active(&self, id)                                             │
//! │       │                                                                 │
//! │       │  Atomic SQL (UPDATE ... RETURNING)                             │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • Concurrency-critical SQL is isolated in one place per aggregate     │
//! │  • Clean separation of concerns                                        │
//! │  • Each engine is testable in isolation against in-memory SQLite       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`series::SeriesRepository`] - Document number allocation
//! - [`product::ProductRepository`] - Products, recipes, stock cache
//! - [`order::OrderRepository`] - Orders and line items
//! - [`inventory::InventoryRepository`] - Consumption engine + manual movements
//! - [`loyalty::LoyaltyRepository`] - Loyalty rules, grants, points
//! - [`shift::ShiftRepository`] - Cash drawer ledger

pub mod inventory;
pub mod loyalty;
pub mod order;
pub mod product;
pub mod series;
pub mod shift;
