//! SQLite-backed [`Catalog`] implementation.
//!
//! A product without variants yields one record. A product with variants
//! yields one record per variant, plus a product-level record when offers
//! are attached to the product itself (`variant_id = ''`).
//!
//! Filters are not pushed into SQL; the comparator applies them after the
//! fetch.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use pareto_core::catalog::Catalog;
use pareto_core::models::{Attributes, CandidateRecord, Filters, Offer, Product, Variant};

pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces one record: the product row, the variant row when
    /// present, and the full offer set of that product/variant pair.
    pub async fn upsert_record(&self, record: &CandidateRecord) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let product = &record.product;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (id, category_id, name, brand, attributes_json, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                category_id = excluded.category_id,
                name = excluded.name,
                brand = excluded.brand,
                attributes_json = excluded.attributes_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&product.id)
        .bind(&product.category_id)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(serde_json::to_string(&product.attributes)?)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let variant_id = match &record.variant {
            Some(variant) => {
                sqlx::query(
                    r#"
                    INSERT INTO variants (id, product_id, attributes_json)
                    VALUES (?, ?, ?)
                    ON CONFLICT(product_id, id) DO UPDATE SET
                        attributes_json = excluded.attributes_json
                    "#,
                )
                .bind(&variant.id)
                .bind(&product.id)
                .bind(serde_json::to_string(&variant.attributes)?)
                .execute(&mut *tx)
                .await?;
                variant.id.as_str()
            }
            None => "",
        };

        sqlx::query("DELETE FROM offers WHERE product_id = ? AND variant_id = ?")
            .bind(&product.id)
            .bind(variant_id)
            .execute(&mut *tx)
            .await?;

        for offer in &record.offers {
            sqlx::query(
                r#"
                INSERT INTO offers (id, product_id, variant_id, retailer_id, price,
                                    shipping, original_price, in_stock, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&offer.id)
            .bind(&product.id)
            .bind(variant_id)
            .bind(&offer.retailer_id)
            .bind(offer.price)
            .bind(offer.shipping)
            .bind(offer.original_price)
            .bind(offer.in_stock)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn parse_attributes(raw: &str, owner: &str) -> Result<Attributes> {
    serde_json::from_str(raw).with_context(|| format!("invalid attributes_json for {}", owner))
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn fetch_candidates(
        &self,
        category_id: &str,
        _filters: &Filters,
    ) -> Result<Vec<CandidateRecord>> {
        let product_rows = sqlx::query(
            "SELECT id, category_id, name, brand, attributes_json FROM products WHERE category_id = ? ORDER BY id",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        let variant_rows = sqlx::query(
            r#"
            SELECT v.id, v.product_id, v.attributes_json
            FROM variants v
            JOIN products p ON p.id = v.product_id
            WHERE p.category_id = ?
            ORDER BY v.product_id, v.id
            "#,
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        let offer_rows = sqlx::query(
            r#"
            SELECT o.id, o.product_id, o.variant_id, o.retailer_id, o.price,
                   o.shipping, o.original_price, o.in_stock
            FROM offers o
            JOIN products p ON p.id = o.product_id
            WHERE p.category_id = ?
            ORDER BY o.product_id, o.variant_id, o.id
            "#,
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        let mut variants: BTreeMap<String, Vec<Variant>> = BTreeMap::new();
        for row in &variant_rows {
            let id: String = row.get("id");
            let product_id: String = row.get("product_id");
            let attributes_json: String = row.get("attributes_json");
            let attributes = parse_attributes(&attributes_json, &format!("{}/{}", product_id, id))?;
            variants
                .entry(product_id)
                .or_default()
                .push(Variant { id, attributes });
        }

        let mut offers: BTreeMap<(String, String), Vec<Offer>> = BTreeMap::new();
        for row in &offer_rows {
            let product_id: String = row.get("product_id");
            let variant_id: String = row.get("variant_id");
            offers.entry((product_id, variant_id)).or_default().push(Offer {
                id: row.get("id"),
                retailer_id: row.get("retailer_id"),
                price: row.get("price"),
                shipping: row.get("shipping"),
                original_price: row.get("original_price"),
                in_stock: row.get("in_stock"),
            });
        }

        let mut records = Vec::new();
        for row in &product_rows {
            let id: String = row.get("id");
            let attributes_json: String = row.get("attributes_json");
            let product = Product {
                attributes: parse_attributes(&attributes_json, &id)?,
                id,
                name: row.get("name"),
                category_id: row.get("category_id"),
                brand: row.get("brand"),
            };

            let product_offers = offers.remove(&(product.id.clone(), String::new()));
            match variants.remove(&product.id) {
                None => records.push(CandidateRecord {
                    product,
                    variant: None,
                    offers: product_offers.unwrap_or_default(),
                }),
                Some(product_variants) => {
                    if let Some(product_offers) = product_offers {
                        records.push(CandidateRecord {
                            product: product.clone(),
                            variant: None,
                            offers: product_offers,
                        });
                    }
                    for variant in product_variants {
                        let variant_offers = offers
                            .remove(&(product.id.clone(), variant.id.clone()))
                            .unwrap_or_default();
                        records.push(CandidateRecord {
                            product: product.clone(),
                            variant: Some(variant),
                            offers: variant_offers,
                        });
                    }
                }
            }
        }

        Ok(records)
    }
}

/// Connects to the configured database and wraps it in a [`SqliteCatalog`].
pub async fn open(config: &crate::config::Config) -> Result<SqliteCatalog> {
    let pool = crate::db::connect(&config.db).await?;
    Ok(SqliteCatalog::new(pool))
}
