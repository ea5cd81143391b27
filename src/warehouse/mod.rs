// src/warehouse/mod.rs — the read-only store holding `movies` and `ratings`
pub mod bigquery;
pub mod sqlite;

use crate::catalogue::Movie;
use crate::config::{AppConfig, WarehouseKind};
use crate::error::{WarehouseError, WarehouseResult};
use crate::query::{SearchResult, SqlTarget, Statement};

pub use bigquery::BigQueryWarehouse;
pub use sqlite::SqliteWarehouse;

/// A backend that runs statements produced by `crate::query`.
///
/// Both methods are read-only. Implementations bind every statement parameter
/// through the backend's own parameter mechanism.
pub trait Warehouse: Send + Sync {
    fn target(&self) -> &SqlTarget;

    /// Rows of `build_catalogue`.
    fn fetch_movies(&self, stmt: &Statement) -> WarehouseResult<Vec<Movie>>;

    /// Rows of `build_search`: title, average rating.
    fn fetch_search(&self, stmt: &Statement) -> WarehouseResult<Vec<SearchResult>>;
}

/// Build the configured backend. SQLite opens read-only.
pub fn open_warehouse(cfg: &AppConfig) -> WarehouseResult<Box<dyn Warehouse>> {
    match cfg.warehouse {
        WarehouseKind::Sqlite => Ok(Box::new(SqliteWarehouse::open_read_only(&cfg.sqlite_path)?)),
        WarehouseKind::BigQuery => {
            let project = cfg
                .bigquery_project
                .as_deref()
                .ok_or_else(|| WarehouseError::Config("bigquery_project is not set".into()))?;
            let dataset = cfg
                .bigquery_dataset
                .as_deref()
                .ok_or_else(|| WarehouseError::Config("bigquery_dataset is not set".into()))?;
            let token = cfg.resolve_bigquery_token().ok_or_else(|| {
                WarehouseError::Auth(
                    "no BigQuery access token (set REELQUEST_BIGQUERY_TOKEN or bigquery_token_file)"
                        .into(),
                )
            })?;
            Ok(Box::new(BigQueryWarehouse::new(
                &cfg.bigquery_base_url,
                project,
                dataset,
                token,
                cfg.http_timeout,
            )?))
        }
    }
}
