use crate::error::EtlError;
use crate::record::ProductRecord;
use chrono::NaiveDate;
use sqlx::{Sqlite, Transaction};
use std::collections::HashMap;
use tracing::warn;

pub struct FactCounts {
    pub written: u64,
    pub skipped: u64,
}

/// Upsert one fact row per record on the (product, source, hour-bucket)
/// grain: first sighting inserts, every later sighting of the same grain
/// overwrites price, sold_count and timestamp in place. Records whose
/// natural keys miss the dimension maps are counted and skipped, never
/// fatal to the batch.
pub async fn upsert_facts(
    tx: &mut Transaction<'_, Sqlite>,
    records: &[ProductRecord],
    brand_ids: &HashMap<String, i64>,
    source_ids: &HashMap<String, i64>,
    product_ids: &HashMap<String, i64>,
    time_ids: &HashMap<(NaiveDate, u32), i64>,
) -> Result<FactCounts, EtlError> {
    let query = "INSERT INTO fact_sales \
                 (product_id, brand_id, source_id, time_id, price, sold_count, timestamp) \
                 VALUES (?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(product_id, source_id, time_id) DO UPDATE SET \
                 price = excluded.price, \
                 sold_count = excluded.sold_count, \
                 timestamp = excluded.timestamp";

    let mut written = 0u64;
    let mut skipped = 0u64;

    for record in records {
        // Lookup keys must normalize exactly the way the dimension key sets
        // were built, or an unnormalized record misses its own dimensions.
        let brand_id = brand_ids.get(&record.brand.trim().to_uppercase());
        let source_id = source_ids.get(&record.source.trim().to_lowercase());
        let product_id = product_ids.get(record.product_name.trim());
        let time_id = time_ids.get(&record.time_bucket());

        let (Some(&brand_id), Some(&source_id), Some(&product_id), Some(&time_id)) =
            (brand_id, source_id, product_id, time_id)
        else {
            skipped += 1;
            if skipped <= 10 {
                warn!(
                    "skipping fact row, missing dimension key: brand={} source={} product={} bucket={:?}",
                    record.brand,
                    record.source,
                    record.product_name,
                    record.time_bucket()
                );
            }
            continue;
        };

        sqlx::query(query)
            .bind(product_id)
            .bind(brand_id)
            .bind(source_id)
            .bind(time_id)
            .bind(record.price)
            .bind(record.sold_count)
            .bind(record.timestamp)
            .execute(&mut *tx)
            .await?;
        written += 1;
    }

    Ok(FactCounts { written, skipped })
}
