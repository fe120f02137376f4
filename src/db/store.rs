use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::db::models::{CatalogRow, SnapshotRow};
use crate::error::Result;
use crate::source::SnapshotSource;
use crate::types::{CatalogEntry, SalesSnapshot};

const SELECT_SNAPSHOTS: &str = r#"
    SELECT id,
           product_link,
           CAST(create_at AS TEXT) AS create_at,
           CAST(sales AS TEXT) AS sales,
           CAST(price AS TEXT) AS price
    FROM key_product_sales
    ORDER BY id
"#;

const SELECT_CATALOG: &str = r#"
    SELECT CAST(pid AS TEXT) AS pid,
           product_name,
           first_category,
           picture,
           product_link
    FROM product_message
    ORDER BY rowid
"#;

/// SQLite-backed snapshot store. Issues reads only.
#[derive(Clone)]
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    pub async fn connect(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        info!("Snapshot store opened at {db_path}");
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the snapshot tables if missing. Only for stores this process owns.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

impl SnapshotSource for SqliteSnapshotStore {
    async fn fetch_snapshots(&self) -> Result<Vec<SalesSnapshot>> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(SELECT_SNAPSHOTS)
            .fetch_all(&self.pool)
            .await?;
        let total = rows.len();
        let snapshots: Vec<SalesSnapshot> = rows.into_iter().filter_map(SnapshotRow::into_snapshot).collect();
        debug!(rows = total, usable = snapshots.len(), "Fetched snapshot rows");
        Ok(snapshots)
    }

    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>> {
        let rows: Vec<CatalogRow> = sqlx::query_as(SELECT_CATALOG)
            .fetch_all(&self.pool)
            .await?;
        let total = rows.len();
        let entries: Vec<CatalogEntry> = rows.into_iter().filter_map(CatalogRow::into_entry).collect();
        debug!(rows = total, usable = entries.len(), "Fetched catalog rows");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    async fn memory_store() -> SqliteSnapshotStore {
        // One connection: every in-memory connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteSnapshotStore::from_pool(pool);
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn reads_snapshots_and_skips_unusable_rows() {
        let store = memory_store().await;
        let at = Utc.with_ymd_and_hms(2024, 2, 1, 9, 30, 0).unwrap();

        sqlx::query("INSERT INTO key_product_sales (product_link, create_at, sales, price) VALUES (?, ?, ?, ?)")
            .bind("https://p/1")
            .bind(at)
            .bind(120.0)
            .bind("$3-$4")
            .execute(&store.pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO key_product_sales (product_link, create_at, sales, price) VALUES (?, ?, ?, NULL)")
            .bind("https://p/1")
            .bind("2024-02-01 10:30:00")
            .bind("130")
            .execute(&store.pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO key_product_sales (product_link, create_at, sales, price) VALUES (?, ?, ?, ?)")
            .bind("https://p/2")
            .bind(at)
            .bind("lots")
            .bind("$1")
            .execute(&store.pool)
            .await
            .unwrap();

        let snapshots = store.fetch_snapshots().await.unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].observed_at, at);
        assert_eq!(snapshots[0].cumulative_sales, 120.0);
        assert_eq!(snapshots[0].price_text, "$3-$4");
        assert_eq!(snapshots[1].observed_at, Utc.with_ymd_and_hms(2024, 2, 1, 10, 30, 0).unwrap());
        assert_eq!(snapshots[1].cumulative_sales, 130.0);
        assert_eq!(snapshots[1].price_text, "");
    }

    #[tokio::test]
    async fn unparseable_timestamp_only_drops_its_row() {
        let store = memory_store().await;
        for (link, created) in [
            ("https://p/1", "2024-02-01 09:30:00"),
            ("https://p/2", "yesterday"),
            ("https://p/3", "2024-02-01T10:00:00Z"),
        ] {
            sqlx::query("INSERT INTO key_product_sales (product_link, create_at, sales, price) VALUES (?, ?, 5, '$1')")
                .bind(link)
                .bind(created)
                .execute(&store.pool)
                .await
                .unwrap();
        }

        let snapshots = store.fetch_snapshots().await.unwrap();
        let links: Vec<&str> = snapshots.iter().map(|s| s.product_link.as_str()).collect();
        assert_eq!(links, vec!["https://p/1", "https://p/3"]);
        assert_eq!(snapshots[1].observed_at, Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn reads_catalog_with_optional_links() {
        let store = memory_store().await;
        sqlx::query("INSERT INTO product_message (pid, product_name, first_category, picture, product_link) VALUES (?, ?, ?, ?, ?)")
            .bind("1001")
            .bind("Kettle")
            .bind("Kitchen")
            .bind("https://img/1001.jpg")
            .bind(Option::<String>::None)
            .execute(&store.pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO product_message (pid, product_name, first_category, picture, product_link) VALUES (?, ?, ?, ?, ?)")
            .bind("1002")
            .bind("Toaster")
            .bind("Kitchen")
            .bind("https://img/1002.jpg")
            .bind("https://shop.tiktok.com/view/product/1002?region=SG&locale=en")
            .execute(&store.pool)
            .await
            .unwrap();

        let catalog = store.fetch_catalog().await.unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].product_id, "1001");
        assert_eq!(catalog[0].product_link, None);
        assert_eq!(catalog[1].product_name, "Toaster");
        assert!(catalog[1].product_link.as_deref().unwrap().contains("region=SG"));
    }

    #[tokio::test]
    async fn empty_store_returns_empty_sets() {
        let store = memory_store().await;
        assert!(store.fetch_snapshots().await.unwrap().is_empty());
        assert!(store.fetch_catalog().await.unwrap().is_empty());
    }
}
