//! # Seed Data Generator
//!
//! Populates the database with a small catalog for manual testing.
//!
//! ## Usage
//! ```bash
//! # Seed ./caja_dev.db
//! cargo run -p caja-db --bin seed
//!
//! # Specify database path
//! cargo run -p caja-db --bin seed -- --db ./data/caja.db
//! ```
//!
//! ## Generated Catalog
//! - Weighted categories (sold per kg): produce, meat
//! - Unit categories: groceries, beverages, dairy
//!
//! Stock is generated so a few products start at or below their minimum
//! and show up in the low stock report.

use std::env;

use caja_db::migrations::migration_status;
use caja_db::{Database, DbConfig, NewProduct};

/// (category name, is_weighted, products)
///
/// Product tuple: (name, brand, price in cents per unit or kg, discount bps, IVA exempt)
const CATALOG: &[(&str, bool, &[(&str, &str, i64, u32, bool)])] = &[
    (
        "Frutas y Verduras",
        true,
        &[
            ("Manzana Fuji", "Granel", 1_990_00, 0, true),
            ("Plátano", "Granel", 1_290_00, 0, true),
            ("Tomate", "Granel", 1_490_00, 1000, true),
            ("Palta Hass", "Granel", 4_990_00, 0, true),
            ("Papa", "Granel", 990_00, 0, true),
        ],
    ),
    (
        "Carnes",
        true,
        &[
            ("Posta Negra", "Carnicería", 11_990_00, 0, false),
            ("Pechuga de Pollo", "Carnicería", 5_490_00, 500, false),
            ("Chuleta de Cerdo", "Carnicería", 6_990_00, 0, false),
        ],
    ),
    (
        "Abarrotes",
        false,
        &[
            ("Arroz Grado 1 1kg", "Tucapel", 1_590_00, 0, false),
            ("Aceite Vegetal 1L", "Belmont", 2_690_00, 0, false),
            ("Fideos Spaghetti 400g", "Carozzi", 890_00, 0, false),
            ("Azúcar 1kg", "Iansa", 1_290_00, 0, false),
        ],
    ),
    (
        "Bebidas",
        false,
        &[
            ("Bebida Cola 1.5L", "Coca-Cola", 1_890_00, 0, false),
            ("Agua Mineral 1.6L", "Cachantun", 990_00, 0, false),
            ("Jugo Naranja 1L", "Watt's", 1_390_00, 1500, false),
        ],
    ),
    (
        "Lácteos",
        false,
        &[
            ("Leche Entera 1L", "Colun", 1_150_00, 0, false),
            ("Yogurt Frutilla", "Soprole", 390_00, 0, false),
            ("Queso Gauda 250g", "Colun", 3_290_00, 0, false),
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
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

    let (total, applied) = migration_status(db.pool()).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied ({}/{})", applied, total);

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating catalog...");

    let mut generated = 0;
    for (category_name, is_weighted, products) in CATALOG {
        let category = db.categories().insert(category_name, *is_weighted).await?;
        println!(
            "  {} ({})",
            category.name,
            if category.is_weighted { "per kg" } else { "per unit" }
        );

        for (idx, (name, brand, price_cents, discount_bps, is_iva_exempt)) in
            products.iter().enumerate()
        {
            let product = seed_product(
                category.id,
                *is_weighted,
                name,
                brand,
                *price_cents,
                *discount_bps,
                *is_iva_exempt,
                generated + idx,
            );

            if let Err(e) = db.products().insert(&product).await {
                eprintln!("Failed to insert {}: {}", product.name, e);
                continue;
            }
        }
        generated += products.len();
    }

    let iva = db.tax_rates().current(caja_core::DEFAULT_TAX_KIND).await?;
    let low = db.products().low_stock().await?;

    println!();
    println!("✓ Generated {} products", db.products().count().await?);
    println!("  IVA rate: {}", iva.rate().fraction());
    println!("  Low stock products: {}", low.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds one product with deterministic stock and barcode.
#[allow(clippy::too_many_arguments)]
fn seed_product(
    category_id: i64,
    is_weighted: bool,
    name: &str,
    brand: &str,
    price_cents: i64,
    discount_bps: u32,
    is_iva_exempt: bool,
    seed: usize,
) -> NewProduct {
    // Every fourth product starts below its minimum
    let units = if seed % 4 == 3 { 2 } else { 20 + (seed % 7) as i64 * 5 };

    // Weighted products get a fractional part (e.g. 27.350 kg)
    let stock_milli = if is_weighted {
        units * 1_000 + (seed as i64 * 350) % 1_000
    } else {
        units * 1_000
    };

    NewProduct {
        category_id,
        bar_code: Some(format!("780{:010}", seed)),
        name: name.to_string(),
        description: None,
        brand: Some(brand.to_string()),
        stock_milli,
        min_stock_milli: 5_000,
        price_cents,
        discount_bps: (discount_bps > 0).then_some(discount_bps),
        is_iva_exempt,
    }
}
