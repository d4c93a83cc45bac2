use crate::error::EtlError;
use chrono::NaiveDate;
use sqlx::{Row, Sqlite, Transaction};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// The three name-keyed dimension tables. `dim_time` is keyed on a
/// (date, hour) pair and resolved separately.
#[derive(Debug, Clone, Copy)]
pub enum DimKind {
    Brand,
    Source,
    Product,
}

impl DimKind {
    pub fn table(&self) -> &'static str {
        match self {
            DimKind::Brand => "dim_brand",
            DimKind::Source => "dim_source",
            DimKind::Product => "dim_product",
        }
    }

    pub fn key_column(&self) -> &'static str {
        match self {
            DimKind::Brand => "brand_name",
            DimKind::Source => "source_name",
            DimKind::Product => "product_name",
        }
    }

    pub fn id_column(&self) -> &'static str {
        match self {
            DimKind::Brand => "brand_id",
            DimKind::Source => "source_id",
            DimKind::Product => "product_id",
        }
    }
}

/// Upsert every natural key into its dimension table and return the
/// key-to-surrogate-id map. The conflict arm writes the key back onto
/// itself so the statement always returns the row's id, new or existing.
/// Safe to call repeatedly with overlapping key sets.
pub async fn resolve(
    tx: &mut Transaction<'_, Sqlite>,
    kind: DimKind,
    keys: &BTreeSet<String>,
) -> Result<HashMap<String, i64>, EtlError> {
    let query = format!(
        "INSERT INTO {t} ({c}) VALUES (?) ON CONFLICT({c}) DO UPDATE SET {c} = excluded.{c} RETURNING {id}",
        t = kind.table(),
        c = kind.key_column(),
        id = kind.id_column(),
    );

    let mut ids = HashMap::new();
    for key in keys {
        let row = sqlx::query(&query).bind(key.as_str()).fetch_one(&mut *tx).await?;
        ids.insert(key.clone(), row.try_get::<i64, _>(0)?);
    }
    debug!("resolved {} {} keys", ids.len(), kind.table());
    Ok(ids)
}

/// Same upsert idiom for the hour-bucket dimension, keyed on (date, hour).
pub async fn resolve_time(
    tx: &mut Transaction<'_, Sqlite>,
    pairs: &BTreeSet<(NaiveDate, u32)>,
) -> Result<HashMap<(NaiveDate, u32), i64>, EtlError> {
    let query = "INSERT INTO dim_time (crawl_date, crawl_hour) VALUES (?, ?) \
                 ON CONFLICT(crawl_date, crawl_hour) DO UPDATE SET crawl_hour = excluded.crawl_hour \
                 RETURNING time_id";

    let mut ids = HashMap::new();
    for (date, hour) in pairs {
        let row = sqlx::query(query)
            .bind(*date)
            .bind(*hour as i64)
            .fetch_one(&mut *tx)
            .await?;
        ids.insert((*date, *hour), row.try_get::<i64, _>(0)?);
    }
    debug!("resolved {} dim_time keys", ids.len());
    Ok(ids)
}
