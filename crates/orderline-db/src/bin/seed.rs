//! # Seed Data Generator
//!
//! Populates a database with a demo menu and one open table session.
//!
//! ## Usage
//! ```bash
//! # Seed the default demo store
//! cargo run -p orderline-db --bin seed
//!
//! # Specify database path and store
//! cargo run -p orderline-db --bin seed -- --db ./data/orderline.db --store <UUID>
//! ```
//!
//! Each menu item gets:
//! - SKU: `{CATEGORY}-{INDEX}`
//! - Price in minor units
//! - Stock between 20 and 120
//!
//! The printed session token can be used as a QR payload when testing
//! dine-in ordering.

use chrono::{Duration, Utc};
use std::env;
use orderline_core::{Product, TableSession, TABLE_SESSION_TTL_HOURS};
use orderline_db::repository::{product, session};
use orderline_db::{Database, DbConfig};

/// Demo store used when `--store` is not given.
const DEMO_STORE_ID: &str = "00000000-0000-4000-8000-000000000001";

/// Menu by category, prices in minor units.
const MENU: &[(&str, &[(&str, i64)])] = &[
    (
        "FOOD",
        &[
            ("Nasi Goreng", 25_000),
            ("Mie Goreng", 23_000),
            ("Sate Ayam", 30_000),
            ("Ayam Bakar", 35_000),
            ("Gado-Gado", 20_000),
            ("Soto Ayam", 22_000),
            ("Rendang", 40_000),
            ("Bakso", 18_000),
        ],
    ),
    (
        "DRNK",
        &[
            ("Es Teh Manis", 5_000),
            ("Es Jeruk", 8_000),
            ("Kopi Tubruk", 10_000),
            ("Es Kopi Susu", 18_000),
            ("Jus Alpukat", 15_000),
            ("Air Mineral", 4_000),
        ],
    ),
    (
        "DSRT",
        &[
            ("Es Campur", 15_000),
            ("Pisang Goreng", 12_000),
            ("Klepon", 10_000),
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./orderline_dev.db");
    let mut store_id = String::from(DEMO_STORE_ID);

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--store" | "-s" => {
                if i + 1 < args.len() {
                    store_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Orderline Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: ./orderline_dev.db)");
                println!("  -s, --store <UUID>   Store to seed (default: {DEMO_STORE_ID})");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Orderline Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!("Store:    {}", store_id);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let mut conn = db.acquire().await?;

    let existing = product::count_for_store(&mut conn, &store_id).await?;
    if existing > 0 {
        println!("⚠ Store already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    println!();
    println!("Generating menu...");

    let mut generated = 0;
    for (category_idx, (category, items)) in MENU.iter().enumerate() {
        for (item_idx, (name, price)) in items.iter().enumerate() {
            let item = generate_product(&store_id, category, name, *price, category_idx * 100 + item_idx);

            if let Err(e) = product::insert(&mut conn, &item).await {
                eprintln!("Failed to insert {}: {}", item.sku, e);
                continue;
            }

            println!("  {:<10} {:<16} {:>8}", item.sku, item.name, item.price().to_string());
            generated += 1;
        }
    }

    let now = Utc::now();
    let table_session = TableSession {
        id: session::generate_session_id(),
        store_id: store_id.clone(),
        table_id: session::generate_session_id(),
        token: session::generate_token(),
        expires_at: now + Duration::hours(TABLE_SESSION_TTL_HOURS),
        is_active: true,
        created_at: now,
    };
    session::insert(&mut conn, &table_session).await?;

    println!();
    println!("✓ Generated {} products", generated);
    println!("✓ Table session {} (token {})", table_session.id, table_session.token);
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds a catalog entry with deterministic stock.
fn generate_product(store_id: &str, category: &str, name: &str, price: i64, seed: usize) -> Product {
    let now = Utc::now();

    Product {
        id: product::generate_product_id(),
        store_id: store_id.to_string(),
        sku: format!("{}-{:03}", category, seed),
        name: name.to_string(),
        price,
        stock: 20 + ((seed * 37) % 101) as i32,
        is_available: true,
        created_at: now,
        updated_at: now,
    }
}
