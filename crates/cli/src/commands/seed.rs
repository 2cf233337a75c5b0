//! Catalog seeding command.
//!
//! Inserts a small set of demo products for local development. Existing
//! SKUs are left untouched, so the command is safe to run repeatedly.

use rust_decimal::Decimal;

use super::CommandError;

struct SeedProduct {
    name: &'static str,
    sku: &'static str,
    price: Decimal,
    stock: i32,
}

const fn seed_products() -> [SeedProduct; 5] {
    [
        SeedProduct {
            name: "Cafetera Moka 300ml",
            sku: "CM-300",
            price: Decimal::from_parts(2500, 0, 0, false, 2),
            stock: 25,
        },
        SeedProduct {
            name: "Guayabera Clasica",
            sku: "GB-01",
            price: Decimal::from_parts(1950, 0, 0, false, 2),
            stock: 40,
        },
        SeedProduct {
            name: "Cafe Tostado 500g",
            sku: "CT-500",
            price: Decimal::from_parts(899, 0, 0, false, 2),
            stock: 120,
        },
        SeedProduct {
            name: "Sombrero de Yarey",
            sku: "SY-10",
            price: Decimal::from_parts(1200, 0, 0, false, 2),
            stock: 15,
        },
        SeedProduct {
            name: "Mermelada de Guayaba",
            sku: "MG-250",
            price: Decimal::from_parts(450, 0, 0, false, 2),
            stock: 60,
        },
    ]
}

/// Insert demo products into the catalog.
pub async fn run() -> Result<(), CommandError> {
    let pool = super::connect().await?;

    let mut inserted = 0_u64;
    for product in seed_products() {
        let result = sqlx::query(
            r"
            INSERT INTO products (name, sku, price, stock, active)
            VALUES ($1, $2, $3, $4, TRUE)
            ON CONFLICT (sku) DO NOTHING
            ",
        )
        .bind(product.name)
        .bind(product.sku)
        .bind(product.price)
        .bind(product.stock)
        .execute(&pool)
        .await?;
        inserted += result.rows_affected();
    }

    tracing::info!(inserted, "Catalog seeding complete");
    Ok(())
}
