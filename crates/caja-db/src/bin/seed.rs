//! # Seed Data Generator
//!
//! Populates the database with a small demo catalog for development:
//! a café menu with composite recipes, a receipt series, and a couple of
//! loyalty rules.
//!
//! ## Usage
//! ```bash
//! # Seed the default dev database
//! cargo run -p caja-db --bin seed
//!
//! # Specify database path
//! cargo run -p caja-db --bin seed -- --db ./data/caja.db
//! ```

use chrono::Utc;
use std::env;
use uuid::Uuid;

use caja_core::{DocumentType, LoyaltyRule, ProductKind, RewardKind, RuleCondition};
use caja_db::repository::product::new_product;
use caja_db::{Database, DbConfig};

/// Simple ingredients: (name, unit, stock)
const INGREDIENTS: &[(&str, &str, f64)] = &[
    ("Granos de café", "kg", 5.0),
    ("Leche entera", "l", 20.0),
    ("Pan artesanal", "unit", 30.0),
    ("Jamón serrano", "kg", 2.0),
    ("Azúcar", "kg", 8.0),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./caja_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Caja POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./caja_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Caja POS Seed Data Generator");
    println!("===============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().list_active(1).await?;
    if !existing.is_empty() {
        println!("⚠ Database already has products");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Simple ingredients
    println!();
    println!("Seeding catalog...");

    let mut ids = std::collections::HashMap::new();
    for (name, unit, stock) in INGREDIENTS {
        let mut product = new_product(name, ProductKind::Simple, 0);
        product.unit_of_measure = unit.to_string();
        db.products().insert(&product).await?;
        db.products().apply_stock_delta(&product.id, *stock).await?;
        ids.insert(*name, product.id);
    }

    // Composite menu items with recipes
    let espresso = new_product("Espresso", ProductKind::Composite, 1800);
    let latte = new_product("Latte", ProductKind::Composite, 2500);
    let tostada = new_product("Tostada de jamón", ProductKind::Composite, 4500);
    for p in [&espresso, &latte, &tostada] {
        db.products().insert(p).await?;
    }

    db.products()
        .add_recipe_edge(&espresso.id, &ids["Granos de café"], 0.018)
        .await?;
    db.products().add_recipe_edge(&latte.id, &espresso.id, 1.0).await?;
    db.products()
        .add_recipe_edge(&latte.id, &ids["Leche entera"], 0.25)
        .await?;
    db.products()
        .add_recipe_edge(&tostada.id, &ids["Pan artesanal"], 1.0)
        .await?;
    db.products()
        .add_recipe_edge(&tostada.id, &ids["Jamón serrano"], 0.05)
        .await?;

    println!("  {} products, 5 recipe edges", INGREDIENTS.len() + 3);

    // Receipt series (the ticket series ships with the schema)
    db.series().create(DocumentType::Receipt, "B001", true).await?;
    db.series().create(DocumentType::Invoice, "F001", true).await?;
    println!("  Document series: B001 (receipt), F001 (invoice)");

    // Loyalty rules
    let now = Utc::now();
    db.loyalty()
        .insert_rule(&LoyaltyRule {
            id: Uuid::new_v4().to_string(),
            condition: RuleCondition::SingleTransactionAmount,
            threshold_cents: 5000,
            reward: RewardKind::FreeProduct,
            reward_product_id: Some(espresso.id.clone()),
            reward_description: "Espresso gratis por compra mayor a 50".to_string(),
            is_active: true,
            created_at: now,
        })
        .await?;
    db.loyalty()
        .insert_rule(&LoyaltyRule {
            id: Uuid::new_v4().to_string(),
            condition: RuleCondition::RollingMonthlySpend,
            threshold_cents: 30000,
            reward: RewardKind::Custom,
            reward_description: "Postre de cortesía del mes".to_string(),
            reward_product_id: None,
            is_active: true,
            created_at: now,
        })
        .await?;
    println!("  2 loyalty rules");

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
