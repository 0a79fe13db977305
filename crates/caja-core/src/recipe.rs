//! # Recipe Expansion
//!
//! Pure expansion of composite products into raw-ingredient consumption.
//!
//! ## How Expansion Works
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │            Sell 2 × "Latte" (composite)                                 │
//! │                                                                         │
//! │  Latte ──► 1 × Espresso (composite) ──► 0.018 kg Coffee beans (simple) │
//! │        └─► 0.25 l Milk (simple)                                         │
//! │                                                                         │
//! │  expand([("latte", 2.0)])                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  { "coffee-beans": 0.036, "milk": 0.5 }                                │
//! │                                                                         │
//! │  Quantities multiply along the path and aggregate per simple           │
//! │  ingredient across all lines.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Cycle Safety
//! The recipe graph must be acyclic, but configuration mistakes happen.
//! Expansion keeps an on-path set and fails with [`CoreError::RecipeCycle`]
//! the moment a composite is re-entered, BEFORE any stock mutation.
//! Traversal uses an explicit stack, so a miswired deep recipe cannot blow
//! the call stack either.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{CoreError, CoreResult};
use crate::types::{ProductKind, RecipeEdge};

/// Aggregated consumption: simple product id → total quantity to deduct.
///
/// BTreeMap so iteration (and therefore movement insertion) is
/// deterministic, which keeps tests and ledgers stable.
pub type Consumption = BTreeMap<String, f64>;

/// In-memory read model of the product/recipe graph.
///
/// Built by the inventory engine from the `products` and `recipe_edges`
/// tables right before expansion; never cached across calls.
#[derive(Debug, Default, Clone)]
pub struct RecipeGraph {
    /// product id → simple/composite
    kinds: HashMap<String, ProductKind>,
    /// composite product id → (ingredient id, quantity per unit)
    edges: HashMap<String, Vec<(String, f64)>>,
}

impl RecipeGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        RecipeGraph::default()
    }

    /// Builds a graph from product rows and recipe edges.
    pub fn from_rows(
        products: impl IntoIterator<Item = (String, ProductKind)>,
        edges: impl IntoIterator<Item = RecipeEdge>,
    ) -> Self {
        let mut graph = RecipeGraph::new();
        for (id, kind) in products {
            graph.add_product(id, kind);
        }
        for edge in edges {
            graph.add_edge(
                edge.parent_product_id,
                edge.ingredient_product_id,
                edge.quantity_per_unit,
            );
        }
        graph
    }

    /// Registers a product node.
    pub fn add_product(&mut self, id: impl Into<String>, kind: ProductKind) {
        self.kinds.insert(id.into(), kind);
    }

    /// Registers a recipe edge (parent consumes ingredient).
    pub fn add_edge(
        &mut self,
        parent: impl Into<String>,
        ingredient: impl Into<String>,
        quantity_per_unit: f64,
    ) {
        self.edges
            .entry(parent.into())
            .or_default()
            .push((ingredient.into(), quantity_per_unit));
    }

    /// Whether adding `parent → ingredient` would close a loop.
    ///
    /// Used by the recipe-management path to reject a bad edge at
    /// configuration time, so expansion-time detection stays a last line
    /// of defense.
    pub fn would_cycle(&self, parent: &str, ingredient: &str) -> bool {
        if parent == ingredient {
            return true;
        }
        // Is `parent` reachable from `ingredient` through existing edges?
        let mut stack = vec![ingredient];
        let mut seen: HashSet<&str> = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == parent {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(children) = self.edges.get(id) {
                stack.extend(children.iter().map(|(child, _)| child.as_str()));
            }
        }
        false
    }

    /// Expands sold lines `(product_id, quantity)` into aggregated
    /// consumption of simple products.
    ///
    /// ## Errors
    /// - [`CoreError::ProductNotFound`] for a line or ingredient that is
    ///   not in the graph
    /// - [`CoreError::RecipeCycle`] when a composite is reachable from
    ///   itself; nothing is returned, so the caller mutates no stock
    pub fn expand(&self, lines: &[(String, f64)]) -> CoreResult<Consumption> {
        let mut consumption = Consumption::new();
        for (product_id, quantity) in lines {
            self.expand_one(product_id, *quantity, &mut consumption)?;
        }
        Ok(consumption)
    }

    /// Expands a single line, accumulating into `acc`.
    ///
    /// Depth-first with an explicit stack. `path` holds the composites on
    /// the current root-to-node path; re-entering one is a cycle.
    fn expand_one(&self, product_id: &str, quantity: f64, acc: &mut Consumption) -> CoreResult<()> {
        enum Frame {
            Enter(String, f64),
            Leave(String),
        }

        let mut stack = vec![Frame::Enter(product_id.to_string(), quantity)];
        let mut path: HashSet<String> = HashSet::new();

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(id, multiplier) => match self.kinds.get(&id) {
                    None => return Err(CoreError::ProductNotFound(id)),
                    Some(ProductKind::Simple) => {
                        *acc.entry(id).or_insert(0.0) += multiplier;
                    }
                    Some(ProductKind::Composite) => {
                        if !path.insert(id.clone()) {
                            return Err(CoreError::RecipeCycle { product_id: id });
                        }
                        stack.push(Frame::Leave(id.clone()));
                        if let Some(children) = self.edges.get(&id) {
                            for (ingredient, per_unit) in children {
                                stack.push(Frame::Enter(
                                    ingredient.clone(),
                                    multiplier * per_unit,
                                ));
                            }
                        }
                    }
                },
                Frame::Leave(id) => {
                    path.remove(&id);
                }
            }
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

    fn edge(parent: &str, ingredient: &str, qty: f64) -> RecipeEdge {
        RecipeEdge {
            parent_product_id: parent.to_string(),
            ingredient_product_id: ingredient.to_string(),
            quantity_per_unit: qty,
        }
    }

    fn coffee_graph() -> RecipeGraph {
        // latte = espresso + 0.25 milk; espresso = 0.018 beans
        RecipeGraph::from_rows(
            [
                ("latte".to_string(), ProductKind::Composite),
                ("espresso".to_string(), ProductKind::Composite),
                ("beans".to_string(), ProductKind::Simple),
                ("milk".to_string(), ProductKind::Simple),
            ],
            [
                edge("latte", "espresso", 1.0),
                edge("latte", "milk", 0.25),
                edge("espresso", "beans", 0.018),
            ],
        )
    }

    #[test]
    fn test_simple_product_passes_through() {
        let graph = coffee_graph();
        let consumption = graph.expand(&[("milk".to_string(), 3.0)]).unwrap();
        assert_eq!(consumption.len(), 1);
        assert_eq!(consumption["milk"], 3.0);
    }

    #[test]
    fn test_multi_level_expansion() {
        let graph = coffee_graph();
        let consumption = graph.expand(&[("latte".to_string(), 2.0)]).unwrap();

        assert_eq!(consumption.len(), 2);
        assert!((consumption["beans"] - 0.036).abs() < 1e-9);
        assert_eq!(consumption["milk"], 0.5);
    }

    #[test]
    fn test_shared_ingredient_aggregates_across_lines() {
        let graph = coffee_graph();
        // 1 latte (0.25 milk) + 2 loose milk
        let consumption = graph
            .expand(&[("latte".to_string(), 1.0), ("milk".to_string(), 2.0)])
            .unwrap();
        assert_eq!(consumption["milk"], 2.25);
    }

    #[test]
    fn test_expansion_independent_of_edge_order() {
        let forward = coffee_graph();
        let reversed = RecipeGraph::from_rows(
            [
                ("latte".to_string(), ProductKind::Composite),
                ("espresso".to_string(), ProductKind::Composite),
                ("beans".to_string(), ProductKind::Simple),
                ("milk".to_string(), ProductKind::Simple),
            ],
            [
                edge("espresso", "beans", 0.018),
                edge("latte", "milk", 0.25),
                edge("latte", "espresso", 1.0),
            ],
        );

        let lines = [("latte".to_string(), 4.0)];
        assert_eq!(forward.expand(&lines).unwrap(), reversed.expand(&lines).unwrap());
    }

    #[test]
    fn test_direct_cycle_detected() {
        let mut graph = RecipeGraph::new();
        graph.add_product("combo", ProductKind::Composite);
        graph.add_edge("combo", "combo", 1.0);

        let err = graph.expand(&[("combo".to_string(), 1.0)]).unwrap_err();
        assert!(matches!(err, CoreError::RecipeCycle { product_id } if product_id == "combo"));
    }

    #[test]
    fn test_transitive_cycle_detected() {
        let mut graph = RecipeGraph::new();
        graph.add_product("a", ProductKind::Composite);
        graph.add_product("b", ProductKind::Composite);
        graph.add_product("c", ProductKind::Simple);
        graph.add_edge("a", "b", 1.0);
        graph.add_edge("b", "a", 2.0);
        graph.add_edge("b", "c", 1.0);

        let err = graph.expand(&[("a".to_string(), 1.0)]).unwrap_err();
        assert!(matches!(err, CoreError::RecipeCycle { .. }));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        // a → b, a → c, b → d, c → d: d is visited twice but never on the
        // same path, so this must expand, not error.
        let mut graph = RecipeGraph::new();
        graph.add_product("a", ProductKind::Composite);
        graph.add_product("b", ProductKind::Composite);
        graph.add_product("c", ProductKind::Composite);
        graph.add_product("d", ProductKind::Simple);
        graph.add_edge("a", "b", 1.0);
        graph.add_edge("a", "c", 1.0);
        graph.add_edge("b", "d", 2.0);
        graph.add_edge("c", "d", 3.0);

        let consumption = graph.expand(&[("a".to_string(), 1.0)]).unwrap();
        assert_eq!(consumption["d"], 5.0);
    }

    #[test]
    fn test_unknown_product_rejected() {
        let graph = coffee_graph();
        let err = graph.expand(&[("ghost".to_string(), 1.0)]).unwrap_err();
        assert!(matches!(err, CoreError::ProductNotFound(id) if id == "ghost"));
    }

    #[test]
    fn test_would_cycle() {
        let graph = coffee_graph();
        // espresso → latte would close latte → espresso → latte
        assert!(graph.would_cycle("espresso", "latte"));
        // self-edge
        assert!(graph.would_cycle("latte", "latte"));
        // a brand new ingredient is fine
        assert!(!graph.would_cycle("latte", "sugar"));
    }
}
