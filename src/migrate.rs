use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            category_id TEXT NOT NULL,
            name TEXT NOT NULL,
            brand TEXT,
            attributes_json TEXT NOT NULL DEFAULT '{}',
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS variants (
            id TEXT NOT NULL,
            product_id TEXT NOT NULL,
            attributes_json TEXT NOT NULL DEFAULT '{}',
            PRIMARY KEY (product_id, id),
            FOREIGN KEY (product_id) REFERENCES products(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // variant_id is '' for offers attached to the product itself.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS offers (
            id TEXT NOT NULL,
            product_id TEXT NOT NULL,
            variant_id TEXT NOT NULL DEFAULT '',
            retailer_id TEXT NOT NULL,
            price REAL NOT NULL,
            shipping REAL,
            original_price REAL,
            in_stock INTEGER NOT NULL DEFAULT 1,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (product_id, variant_id, id),
            FOREIGN KEY (product_id) REFERENCES products(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_category ON products(category_id)")
        .execute(&pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_offers_product ON offers(product_id, variant_id)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
