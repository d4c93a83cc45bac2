mod dim;
mod fact;

pub use dim::DimKind;
pub use fact::FactCounts;

use crate::error::EtlError;
use crate::record::ProductRecord;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::{debug, info};

/// Star-schema DDL, idempotent. The grain constraint on fact_sales is what
/// makes re-running a load safe.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS dim_brand (
        brand_id INTEGER PRIMARY KEY AUTOINCREMENT,
        brand_name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS dim_source (
        source_id INTEGER PRIMARY KEY AUTOINCREMENT,
        source_name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS dim_product (
        product_id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_name TEXT NOT NULL UNIQUE,
        currency TEXT
    )",
    "CREATE TABLE IF NOT EXISTS dim_time (
        time_id INTEGER PRIMARY KEY AUTOINCREMENT,
        crawl_date DATE NOT NULL,
        crawl_hour INTEGER NOT NULL,
        UNIQUE (crawl_date, crawl_hour)
    )",
    "CREATE TABLE IF NOT EXISTS fact_sales (
        fact_id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id INTEGER NOT NULL REFERENCES dim_product (product_id),
        brand_id INTEGER NOT NULL REFERENCES dim_brand (brand_id),
        source_id INTEGER NOT NULL REFERENCES dim_source (source_id),
        time_id INTEGER NOT NULL REFERENCES dim_time (time_id),
        price INTEGER NOT NULL,
        sold_count INTEGER,
        timestamp DATETIME,
        UNIQUE (product_id, source_id, time_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_fact_brand ON fact_sales (brand_id)",
    "CREATE INDEX IF NOT EXISTS idx_fact_time ON fact_sales (time_id)",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct LoadReport {
    pub rows_written: u64,
    pub rows_skipped: u64,
}

pub struct Warehouse {
    pool: SqlitePool,
}

impl Warehouse {
    /// Open (or create) the warehouse database. A single connection is
    /// enough: the load stage is strictly sequential.
    pub async fn connect(db: &str) -> Result<Warehouse, EtlError> {
        let opt = if db.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(db)?
        } else {
            SqliteConnectOptions::new().filename(db).create_if_missing(true)
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opt)
            .await?;
        Ok(Warehouse { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Make sure every dimension table, the fact table and the grain
    /// constraint exist. Fatal on failure: without the schema no load may
    /// proceed.
    pub async fn ensure_schema(&self) -> Result<(), EtlError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("warehouse schema ready");
        Ok(())
    }

    /// Load a batch: resolve and commit dimensions first, then upsert facts
    /// in their own transaction. A crash between the phases leaves the
    /// dimensions durable and the facts untouched, so the whole load can
    /// simply be retried.
    pub async fn load(&self, records: &[ProductRecord]) -> Result<LoadReport, EtlError> {
        if records.is_empty() {
            info!("empty batch, nothing to load");
            return Ok(LoadReport::default());
        }

        self.ensure_schema().await?;

        let brands: BTreeSet<String> =
            records.iter().map(|r| r.brand.trim().to_uppercase()).collect();
        let sources: BTreeSet<String> =
            records.iter().map(|r| r.source.trim().to_lowercase()).collect();
        let products: BTreeSet<String> =
            records.iter().map(|r| r.product_name.trim().to_string()).collect();
        let buckets: BTreeSet<(NaiveDate, u32)> =
            records.iter().map(ProductRecord::time_bucket).collect();

        let mut tx = self.pool.begin().await?;
        let brand_ids = dim::resolve(&mut tx, DimKind::Brand, &brands).await?;
        let source_ids = dim::resolve(&mut tx, DimKind::Source, &sources).await?;
        let product_ids = dim::resolve(&mut tx, DimKind::Product, &products).await?;
        let time_ids = dim::resolve_time(&mut tx, &buckets).await?;
        tx.commit().await?;
        info!(
            "dimensions upserted: {} brand, {} source, {} product, {} time",
            brand_ids.len(),
            source_ids.len(),
            product_ids.len(),
            time_ids.len()
        );

        let mut tx = self.pool.begin().await?;
        let counts = fact::upsert_facts(
            &mut tx,
            records,
            &brand_ids,
            &source_ids,
            &product_ids,
            &time_ids,
        )
        .await?;
        tx.commit().await?;

        info!(
            "fact_sales load done: {} written, {} skipped",
            counts.written, counts.skipped
        );
        Ok(LoadReport {
            rows_written: counts.written,
            rows_skipped: counts.skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{parse_price, CURRENCY};
    use pretty_assertions::assert_eq;
    use sqlx::Row;

    async fn warehouse() -> Warehouse {
        let w = Warehouse::connect("sqlite::memory:").await.expect("connect");
        w.ensure_schema().await.expect("schema");
        w
    }

    fn record(name: &str, brand: &str, price: i64, ts: &str) -> ProductRecord {
        ProductRecord {
            brand: brand.into(),
            product_name: name.into(),
            price,
            currency: CURRENCY.into(),
            source: "sitea".into(),
            url: format!("https://sitea/laptop/{}", name.to_lowercase().replace(' ', "-")),
            timestamp: chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S")
                .expect("Invalid date format"),
            sold_count: None,
        }
    }

    async fn count(w: &Warehouse, table: &str) -> i64 {
        let query = format!("SELECT COUNT(*) FROM {table}");
        sqlx::query(&query)
            .fetch_one(w.pool())
            .await
            .unwrap()
            .try_get(0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let w = warehouse().await;
        w.ensure_schema().await.expect("second run");
        w.ensure_schema().await.expect("third run");
    }

    #[tokio::test]
    async fn test_dimension_resolve_is_idempotent() {
        let w = warehouse().await;

        let keys: BTreeSet<String> = ["DELL", "ASUS"].iter().map(|s| s.to_string()).collect();
        let mut tx = w.pool().begin().await.unwrap();
        let first = dim::resolve(&mut tx, DimKind::Brand, &keys).await.unwrap();
        tx.commit().await.unwrap();

        let keys2: BTreeSet<String> =
            ["DELL", "ASUS", "ACER"].iter().map(|s| s.to_string()).collect();
        let mut tx = w.pool().begin().await.unwrap();
        let second = dim::resolve(&mut tx, DimKind::Brand, &keys2).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first["DELL"], second["DELL"]);
        assert_eq!(first["ASUS"], second["ASUS"]);
        assert_eq!(count(&w, "dim_brand").await, 3);
    }

    #[tokio::test]
    async fn test_idempotent_reload_updates_in_place() {
        let w = warehouse().await;
        let batch = vec![
            record("Dell Inspiron 15", "DELL", 15_990_000, "2024-01-01 10:15:00"),
            record("MacBook Air M2", "APPLE", 24_990_000, "2024-01-01 10:20:00"),
        ];

        let first = w.load(&batch).await.unwrap();
        assert_eq!(first.rows_written, 2);
        assert_eq!(count(&w, "fact_sales").await, 2);

        // Same batch again: same fact count, rows rewritten not duplicated.
        let second = w.load(&batch).await.unwrap();
        assert_eq!(second.rows_written, 2);
        assert_eq!(count(&w, "fact_sales").await, 2);
        assert_eq!(count(&w, "dim_brand").await, 2);
        assert_eq!(count(&w, "dim_time").await, 1);
    }

    #[tokio::test]
    async fn test_load_normalizes_raw_brand_and_source_casing() {
        let w = warehouse().await;

        // Staged records may still carry raw casing; the load must resolve
        // and look them up under the same normalized keys.
        let mut raw = record("Dell Inspiron 15", "Dell", 15_990_000, "2024-01-01 10:15:00");
        raw.source = "SiteA".into();

        let report = w.load(&[raw]).await.unwrap();
        assert_eq!(report.rows_written, 1);
        assert_eq!(report.rows_skipped, 0);

        let brand: String = sqlx::query("SELECT brand_name FROM dim_brand")
            .fetch_one(w.pool())
            .await
            .unwrap()
            .try_get(0)
            .unwrap();
        assert_eq!(brand, "DELL");
        let source: String = sqlx::query("SELECT source_name FROM dim_source")
            .fetch_one(w.pool())
            .await
            .unwrap()
            .try_get(0)
            .unwrap();
        assert_eq!(source, "sitea");
    }

    #[tokio::test]
    async fn test_same_hour_bucket_is_last_write_wins() {
        let w = warehouse().await;

        // Two sightings of the same (product, source, hour) triple, and one
        // raw record whose displayed price never parses.
        let mut batch = vec![
            record("Dell Inspiron 15", "DELL", 15_990_000, "2024-01-01 10:15:00"),
            record("Dell Inspiron 15", "DELL", 14_990_000, "2024-01-01 10:45:00"),
        ];
        assert_eq!(parse_price(""), None); // the invalid record never becomes a ProductRecord
        batch.retain(|r| r.price > 0);

        let report = w.load(&batch).await.unwrap();
        assert_eq!(report.rows_written, 2);
        assert_eq!(report.rows_skipped, 0);
        assert_eq!(count(&w, "fact_sales").await, 1);

        let row = sqlx::query("SELECT price, timestamp FROM fact_sales")
            .fetch_one(w.pool())
            .await
            .unwrap();
        assert_eq!(row.try_get::<i64, _>("price").unwrap(), 14_990_000);
    }

    #[tokio::test]
    async fn test_fact_grain_spans_hours_and_sources() {
        let w = warehouse().await;

        let mut other_source = record("Dell Inspiron 15", "DELL", 15_990_000, "2024-01-01 10:15:00");
        other_source.source = "siteb".into();

        let batch = vec![
            record("Dell Inspiron 15", "DELL", 15_990_000, "2024-01-01 10:15:00"),
            // next hour bucket: its own fact row
            record("Dell Inspiron 15", "DELL", 15_990_000, "2024-01-01 11:05:00"),
            other_source,
        ];

        let report = w.load(&batch).await.unwrap();
        assert_eq!(report.rows_written, 3);
        assert_eq!(count(&w, "fact_sales").await, 3);

        // No two rows may share the grain key.
        let dup: i64 = sqlx::query(
            "SELECT COUNT(*) FROM (SELECT product_id, source_id, time_id \
             FROM fact_sales GROUP BY product_id, source_id, time_id HAVING COUNT(*) > 1)",
        )
        .fetch_one(w.pool())
        .await
        .unwrap()
        .try_get(0)
        .unwrap();
        assert_eq!(dup, 0);
    }

    #[tokio::test]
    async fn test_missing_dimension_key_is_skipped_not_fatal() {
        let w = warehouse().await;
        let batch = vec![record("Dell Inspiron 15", "DELL", 15_990_000, "2024-01-01 10:15:00")];

        // Resolve dimensions for the batch but feed the fact stage an empty
        // product map, as a normalization mismatch would.
        w.ensure_schema().await.unwrap();
        let brands: BTreeSet<String> = batch.iter().map(|r| r.brand.clone()).collect();
        let sources: BTreeSet<String> = batch.iter().map(|r| r.source.clone()).collect();
        let buckets: BTreeSet<(NaiveDate, u32)> =
            batch.iter().map(ProductRecord::time_bucket).collect();

        let mut tx = w.pool().begin().await.unwrap();
        let brand_ids = dim::resolve(&mut tx, DimKind::Brand, &brands).await.unwrap();
        let source_ids = dim::resolve(&mut tx, DimKind::Source, &sources).await.unwrap();
        let time_ids = dim::resolve_time(&mut tx, &buckets).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = w.pool().begin().await.unwrap();
        let counts = fact::upsert_facts(
            &mut tx,
            &batch,
            &brand_ids,
            &source_ids,
            &Default::default(),
            &time_ids,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(counts.written, 0);
        assert_eq!(counts.skipped, 1);
        assert_eq!(count(&w, "fact_sales").await, 0);
    }
}
