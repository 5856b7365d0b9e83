//! # Seed Data Generator
//!
//! Populates the database with demo users, products, and SKUs.
//!
//! ## Usage
//! ```bash
//! # Default database and product count
//! cargo run -p mall-db --bin seed
//!
//! # Custom amount and path
//! cargo run -p mall-db --bin seed -- --products 200 --db ./data/mall.db
//! ```
//!
//! ## Generated Data
//! - Users `alice`, `bob` (active) and `mallory` (disabled)
//! - Products across a few departments; roughly half are sold through
//!   SKUs (colour / size variants with their own price and stock), the
//!   rest carry product-level stock
//! - Every tenth product is off sale

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::env;

use mall_core::{Money, SaleStatus, UserStatus};
use mall_db::{Database, DbConfig};

/// Departments and the product names drawn from them.
const DEPARTMENTS: &[(&str, &[&str])] = &[
    (
        "PHN",
        &["Nova Phone", "Pixel Slate", "Aurora Mini", "Zephyr Pro", "Lumen Max"],
    ),
    (
        "AUD",
        &["Echo Buds", "Bass Cube", "Studio Cans", "Pocket Radio"],
    ),
    (
        "APP",
        &["Linen Shirt", "Trail Jacket", "Wool Scarf", "Canvas Sneakers", "Denim Jeans"],
    ),
    (
        "HOM",
        &["Ceramic Mug", "Desk Lamp", "Cotton Towel", "Chef Knife", "Tea Kettle"],
    ),
];

/// Variant axes used when a product is sold through SKUs.
const VARIANTS: &[(&str, i64)] = &[("Black", 0), ("White", 0), ("Blue", 500), ("Red", 500)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 40;
    let mut db_path = String::from("./mall_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--products" | "-p" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(count);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Mall Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --products <N>  Number of products to generate (default: 40)");
                println!("  -d, --db <PATH>     Database file path (default: ./mall_dev.db)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Mall Seed Data Generator");
    println!("===========================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let catalog = db.catalog();
    let existing = catalog.count_products().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    for (username, status) in [
        ("alice", UserStatus::Active),
        ("bob", UserStatus::Active),
        ("mallory", UserStatus::Disabled),
    ] {
        let user = catalog.insert_user(username, status).await?;
        println!("  user {:>3}  {}", user.id, user.username);
    }

    // Fixed seed so every developer gets the same catalog.
    let mut rng = StdRng::seed_from_u64(20_24);
    let names: Vec<(&str, &str)> = DEPARTMENTS
        .iter()
        .flat_map(|(code, names)| names.iter().map(move |name| (*code, *name)))
        .collect();

    let mut products = 0;
    let mut skus = 0;
    let start = std::time::Instant::now();

    for n in 0..count {
        let (code, base_name) = names[n % names.len()];
        let edition = n / names.len();
        let name = if edition == 0 {
            base_name.to_string()
        } else {
            format!("{} Gen {}", base_name, edition + 1)
        };

        let price = Money::from_cents(rng.gen_range(9..=499) * 100 - 1);
        let status = if n % 10 == 9 {
            SaleStatus::OffSale
        } else {
            SaleStatus::OnSale
        };
        let with_skus = n % 2 == 0;
        let stock = if with_skus { 0 } else { rng.gen_range(0..=50) };

        let product = catalog.insert_product(&name, price, stock, status).await?;
        products += 1;

        if with_skus {
            for (variant, addon) in VARIANTS {
                let sku_code = format!("{}-{:04}-{}", code, product.id, &variant[..3].to_uppercase());
                let sku_price = price + Money::from_cents(*addon);
                let sku_stock = rng.gen_range(0..=20);
                if let Err(e) = catalog
                    .insert_sku(product.id, &sku_code, variant, sku_price, sku_stock, SaleStatus::OnSale)
                    .await
                {
                    eprintln!("Failed to insert {}: {}", sku_code, e);
                    continue;
                }
                skus += 1;
            }
        }
    }

    println!();
    println!(
        "✓ Generated {} products and {} SKUs in {:?}",
        products,
        skus,
        start.elapsed()
    );
    println!("✓ Seed complete!");

    Ok(())
}
