//! # Product Repository
//!
//! Database operations for products and recipe edges.
//!
//! ## Stock Cache Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                                │
//! │                                                                         │
//! │  ❌ WRONG: Absolute update (loses concurrent sales)                    │
//! │     UPDATE products SET stock = 7 WHERE id = ?                         │
//! │                                                                         │
//! │  ✅ CORRECT: Delta update                                              │
//! │     UPDATE products SET stock = stock - 3                              │
//! │                                                                         │
//! │  Terminal A: sells 3 → stock - 3                                       │
//! │  Terminal B: sells 2 → stock - 2                                       │
//! │  Both deltas land regardless of interleaving: -5 total                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cached `stock` column is a running sum of the inventory_movements
//! ledger. The inventory engine writes both inside one transaction; this
//! repository only exposes the delta primitive, never an absolute setter.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult, EngineResult};
use caja_core::{CoreError, Product, ProductKind, RecipeEdge};

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as(
            r#"
            SELECT id, name, kind, unit_of_measure, price_cents, stock,
                   is_active, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as(
            r#"
            SELECT id, name, kind, unit_of_measure, price_cents, stock,
                   is_active, created_at, updated_at
            FROM products
            WHERE is_active = 1
            ORDER BY name
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists active products whose cached stock is at or below `threshold`.
    ///
    /// Backs the low/negative-stock signal in catalog views; composite
    /// products are excluded because their stock column is not meaningful.
    pub async fn list_low_stock(&self, threshold: f64) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as(
            r#"
            SELECT id, name, kind, unit_of_measure, price_cents, stock,
                   is_active, created_at, updated_at
            FROM products
            WHERE is_active = 1 AND kind = 'simple' AND stock <= ?1
            ORDER BY stock ASC
            "#,
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product.
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, kind, unit_of_measure, price_cents, stock,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.kind)
        .bind(&product.unit_of_measure)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product.clone())
    }

    /// Applies a stock delta (negative for consumption, positive for intake).
    ///
    /// Atomic single-statement update; concurrent deltas all land.
    pub async fn apply_stock_delta(&self, id: &str, delta: f64) -> DbResult<()> {
        debug!(id = %id, delta = %delta, "Applying stock delta");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock + ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// Historical orders and movements still reference the row.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    // =========================================================================
    // Recipe edges
    // =========================================================================

    /// Adds a recipe edge: one unit of `parent` consumes
    /// `quantity_per_unit` of `ingredient`.
    ///
    /// ## Errors
    /// - [`CoreError::ProductNotFound`] if either product is missing
    /// - [`CoreError::RecipeCycle`] if the edge would close a loop -
    ///   checked here at configuration time so the expansion-time guard
    ///   stays a last line of defense
    pub async fn add_recipe_edge(
        &self,
        parent_id: &str,
        ingredient_id: &str,
        quantity_per_unit: f64,
    ) -> EngineResult<()> {
        caja_core::validation::validate_quantity(quantity_per_unit)?;

        let parent = self
            .get_by_id(parent_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(parent_id.to_string()))?;
        self.get_by_id(ingredient_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(ingredient_id.to_string()))?;

        let graph = self.load_recipe_graph().await?;
        if graph.would_cycle(parent_id, ingredient_id) {
            return Err(CoreError::RecipeCycle {
                product_id: parent.id,
            }
            .into());
        }

        sqlx::query(
            r#"
            INSERT INTO recipe_edges (parent_product_id, ingredient_product_id, quantity_per_unit)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(parent_id)
        .bind(ingredient_id)
        .bind(quantity_per_unit)
        .execute(&self.pool)
        .await?;

        debug!(parent = %parent_id, ingredient = %ingredient_id, "Added recipe edge");
        Ok(())
    }

    /// Lists the direct recipe edges of a composite product.
    pub async fn recipe_of(&self, parent_id: &str) -> DbResult<Vec<RecipeEdge>> {
        let edges = sqlx::query_as(
            r#"
            SELECT parent_product_id, ingredient_product_id, quantity_per_unit
            FROM recipe_edges
            WHERE parent_product_id = ?1
            "#,
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(edges)
    }

    /// Loads the whole product/recipe graph as a pure read model.
    ///
    /// Loaded fresh on every consumption call - the engine never caches
    /// catalog state across calls.
    pub async fn load_recipe_graph(&self) -> DbResult<caja_core::RecipeGraph> {
        let products: Vec<(String, ProductKind)> =
            sqlx::query_as("SELECT id, kind FROM products")
                .fetch_all(&self.pool)
                .await?;

        let edges: Vec<RecipeEdge> = sqlx::query_as(
            "SELECT parent_product_id, ingredient_product_id, quantity_per_unit FROM recipe_edges",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(caja_core::RecipeGraph::from_rows(products, edges))
    }
}

/// Helper to build a new product with generated id and timestamps.
pub fn new_product(name: &str, kind: ProductKind, price_cents: i64) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        kind,
        unit_of_measure: "unit".to_string(),
        price_cents,
        stock: 0.0,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
