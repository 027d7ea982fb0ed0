//! # Seed Data Generator
//!
//! Populates a database with a small demo shop for development.
//!
//! ## Usage
//! ```bash
//! cargo run -p shopkeep-db --bin seed
//!
//! # Specify database path
//! cargo run -p shopkeep-db --bin seed -- --db ./data/shopkeep.db
//! ```
//!
//! ## Generated Data
//! - Grocery, bakery and gift products with card prices and PROVE reserves
//! - One gift basket composed of items and packaging, with 3 assembled
//! - Two customers, a few sales and a donation
//! - Monthly rent and a one-off expense, plus one payable and one receivable

use chrono::{Duration, Utc};
use std::env;

use shopkeep_core::cart::Discount;
use shopkeep_core::{
    Account, AccountKind, ComponentRole, Customer, Expense, PaymentMethod, Product, RecordType, Recurrence,
    DEFAULT_STORE_ID,
};
use shopkeep_db::repository::{generate_id, today};
use shopkeep_db::{ComponentInput, Database, DbConfig, NewSale, SaleLineInput};

/// (sku, name, category, cost, price, card price, stock, prove, min)
const CATALOG: &[(&str, &str, &str, i64, i64, Option<i64>, i64, i64, i64)] = &[
    ("CAFE-500", "Café Torrado 500g", "Mercearia", 1450, 2290, Some(2390), 40, 2, 5),
    ("GELEIA-250", "Geleia de Morango 250g", "Mercearia", 980, 1790, None, 25, 1, 4),
    ("MEL-300", "Mel Silvestre 300g", "Mercearia", 1800, 3190, Some(3350), 18, 0, 3),
    ("BISC-200", "Biscoito Amanteigado 200g", "Padaria", 650, 1290, None, 60, 3, 10),
    ("PANET-500", "Panetone Artesanal 500g", "Padaria", 2100, 3990, None, 12, 0, 2),
    ("CANECA-01", "Caneca de Cerâmica", "Presentes", 1200, 2790, None, 15, 1, 3),
    ("CESTO-M", "Cesto de Vime Médio", "Embalagens", 1500, 1500, None, 30, 0, 5),
    ("LACO-01", "Laço de Cetim", "Embalagens", 90, 90, None, 200, 0, 20),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./shopkeep_dev.db");

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
                println!("Shopkeep Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./shopkeep_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Shopkeep Seed Data Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Catalog
    let mut ids = Vec::with_capacity(CATALOG.len());
    for &(sku, name, category, cost, price, card, stock, prove, min) in CATALOG {
        let mut product = new_product(sku, name, category, cost, price, stock);
        product.card_price_cents = card;
        product.prove_stock = prove;
        product.min_stock = min;
        let product = db.products().insert(&product).await?;
        ids.push(product.id);
    }
    println!("✓ Inserted {} products", ids.len());

    // Gift basket: coffee, jam, biscuits and a mug in a wicker basket with a bow
    let basket = db
        .products()
        .insert(&Product {
            is_basket: true,
            min_stock: 1,
            ..new_product("CESTA-CAFE", "Cesta Café da Manhã", "Cestas", 0, 0, 0)
        })
        .await?;
    let component = |idx: usize, role: ComponentRole, quantity: i64| ComponentInput {
        component_id: ids[idx].clone(),
        role,
        quantity,
    };
    let composition = db
        .baskets()
        .set_components(
            &basket.id,
            &[
                component(0, ComponentRole::Item, 1),
                component(1, ComponentRole::Item, 1),
                component(3, ComponentRole::Item, 2),
                component(5, ComponentRole::Item, 1),
                component(6, ComponentRole::Packaging, 1),
                component(7, ComponentRole::Extra, 1),
            ],
            &Discount::Percentage(500),
        )
        .await?;
    db.baskets().assemble(&basket.id, 3, Some("Montagem inicial".to_string())).await?;
    println!(
        "✓ Basket {} priced at {} cents (cost {}), 3 assembled",
        composition.basket.sku, composition.pricing.price.cents(), composition.pricing.cost.cents()
    );

    // Customers
    let ana = db.customers().insert(&new_customer("Ana Souza", "(11) 98765-4321")).await?;
    db.customers().insert(&new_customer("Bruno Lima", "(11) 91234-5678")).await?;
    println!("✓ Inserted 2 customers");

    // Sales over the last few days
    let today = today();
    let line = |idx: usize, quantity: i64| SaleLineInput {
        product_id: ids[idx].clone(),
        quantity,
    };
    let sales = [
        (3, vec![line(0, 1), line(3, 2)], PaymentMethod::Cash, RecordType::Sale, None),
        (2, vec![line(2, 1)], PaymentMethod::CreditCard, RecordType::Sale, Some(ana.id.clone())),
        (1, vec![line(4, 1), line(1, 1)], PaymentMethod::Transfer, RecordType::Sale, None),
        (0, vec![line(3, 1)], PaymentMethod::Cash, RecordType::Donation, None),
    ];
    let mut recorded = 0;
    for (days_ago, lines, payment_method, record_type, customer_id) in sales {
        db.sales()
            .create(
                &NewSale {
                    lines,
                    payment_method,
                    record_type,
                    customer_id,
                    sold_on: Some(today - Duration::days(days_ago)),
                    ..NewSale::default()
                },
                300,
            )
            .await?;
        recorded += 1;
    }
    let basket_sale = NewSale {
        lines: vec![SaleLineInput {
            product_id: basket.id.clone(),
            quantity: 1,
        }],
        payment_method: PaymentMethod::DebitCard,
        customer_id: Some(ana.id.clone()),
        sold_on: Some(today),
        ..NewSale::default()
    };
    db.sales().create(&basket_sale, 300).await?;
    println!("✓ Recorded {} sales", recorded + 1);

    // Expenses and accounts
    let month_start = today - Duration::days(30);
    db.expenses()
        .insert(&new_expense("Aluguel da loja", "Aluguel", 250_000, month_start, Recurrence::Monthly))
        .await?;
    db.expenses()
        .insert(&new_expense("Sacolas e etiquetas", "Insumos", 8_990, today, Recurrence::None))
        .await?;
    let generated = db.expenses().generate_recurring(today + Duration::days(30)).await?;
    println!("✓ Inserted expenses ({} recurring occurrences generated)", generated.len());

    db.accounts()
        .insert(&new_account(AccountKind::Payable, "Torrefação Serra Azul", 45_000, today + Duration::days(5)))
        .await?;
    db.accounts()
        .insert(&new_account(AccountKind::Receivable, "Ana Souza", 12_000, today - Duration::days(2)))
        .await?;
    println!("✓ Inserted 2 accounts");

    let low = db.products().low_stock().await?;
    println!();
    println!("  Low stock products: {}", low.len());
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn new_product(sku: &str, name: &str, category: &str, cost: i64, price: i64, stock: i64) -> Product {
    let now = Utc::now();
    Product {
        id: generate_id(),
        store_id: DEFAULT_STORE_ID.to_string(),
        sku: sku.to_string(),
        barcode: None,
        name: name.to_string(),
        description: None,
        category: Some(category.to_string()),
        unit: "un".to_string(),
        cost_cents: cost,
        price_cents: price,
        card_price_cents: None,
        stock,
        prove_stock: 0,
        min_stock: 0,
        is_basket: false,
        photo_path: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn new_customer(name: &str, phone: &str) -> Customer {
    let now = Utc::now();
    Customer {
        id: generate_id(),
        store_id: DEFAULT_STORE_ID.to_string(),
        name: name.to_string(),
        phone: Some(phone.to_string()),
        email: None,
        document: None,
        address: None,
        notes: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn new_expense(
    description: &str,
    category: &str,
    amount_cents: i64,
    due_date: chrono::NaiveDate,
    recurrence: Recurrence,
) -> Expense {
    let now = Utc::now();
    Expense {
        id: generate_id(),
        store_id: DEFAULT_STORE_ID.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        amount_cents,
        due_date,
        paid_on: None,
        recurrence,
        recurrence_end: None,
        series_id: None,
        notes: None,
        created_at: now,
        updated_at: now,
    }
}

fn new_account(kind: AccountKind, counterparty: &str, amount_cents: i64, due_date: chrono::NaiveDate) -> Account {
    let now = Utc::now();
    Account {
        id: generate_id(),
        store_id: DEFAULT_STORE_ID.to_string(),
        kind,
        counterparty: counterparty.to_string(),
        description: "Boleto".to_string(),
        amount_cents,
        due_date,
        settled_on: None,
        customer_id: None,
        notes: None,
        created_at: now,
        updated_at: now,
    }
}
