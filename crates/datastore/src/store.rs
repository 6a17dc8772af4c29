//! In-memory CSV dataset store.
//!
//! Every CSV in the data directory becomes one named table. The store is
//! built once at startup and never mutated afterwards, so it is safe to
//! share behind an `Arc` across any number of concurrent requests.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use polars::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum DatastoreError {
    #[error("Data path '{0}' does not exist.")]
    NotFound(PathBuf),
    #[error("No CSV files found in data path '{0}'.")]
    NoDatasets(PathBuf),
    #[error("Failed to load dataset '{name}': {source}")]
    Load {
        name: String,
        #[source]
        source: PolarsError,
    },
    #[error("Failed to read data directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Serializable metadata for one loaded table.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct DatasetInfo {
    /// Sanitized file-stem used as the SQL table name.
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    /// Ordered list of column headers.
    pub column_names: Vec<String>,
}

/// Read-only collection of named in-memory tables.
#[derive(Debug)]
pub struct DatasetStore {
    tables: IndexMap<String, DataFrame>,
    info: Vec<DatasetInfo>,
}

impl DatasetStore {
    /// Load every `*.csv` in `dir` (non-recursive, extension matched
    /// case-insensitively) into a named table. Files are loaded in sorted
    /// filename order so the store contents are deterministic.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, DatastoreError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(DatastoreError::NotFound(dir.to_path_buf()));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(DatastoreError::NoDatasets(dir.to_path_buf()));
        }

        info!("Found {} CSV files. Loading datasets...", paths.len());

        let mut tables: IndexMap<String, DataFrame> = IndexMap::new();
        for path in &paths {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            let name = sanitize_table_name(stem);

            let df = LazyCsvReader::new(path)
                .with_try_parse_dates(true)
                .with_infer_schema_length(Some(1000))
                .finish()
                .and_then(|lf| lf.collect())
                .map_err(|source| DatastoreError::Load {
                    name: name.clone(),
                    source,
                })?;

            if tables.contains_key(&name) {
                // Sanitization can collapse distinct filenames (e.g.
                // "Sales.csv" and "sales.CSV"). Last write wins.
                warn!(table = %name, file = %path.display(), "duplicate table name after sanitization, replacing previous load");
            }
            info!(
                table = %name,
                rows = df.height(),
                columns = df.width(),
                "loaded dataset"
            );
            tables.insert(name, df);
        }

        let info = tables
            .iter()
            .map(|(name, df)| DatasetInfo {
                name: name.clone(),
                rows: df.height(),
                columns: df.width(),
                column_names: df
                    .get_column_names()
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            })
            .collect();

        Ok(Self { tables, info })
    }

    /// All loaded tables, in load order.
    pub fn tables(&self) -> &IndexMap<String, DataFrame> {
        &self.tables
    }

    /// Metadata for every loaded table.
    pub fn info(&self) -> &[DatasetInfo] {
        &self.info
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Human-readable summary used to prime the agent's system prompt.
    /// One markdown bullet per table.
    pub fn describe(&self) -> String {
        self.info
            .iter()
            .map(|ds| {
                format!(
                    "- **{}**: {} rows, {} columns. Columns: {}",
                    ds.name,
                    ds.rows,
                    ds.columns,
                    ds.column_names.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Lowercase the stem and replace everything outside `[A-Za-z0-9_]` with
/// `_`, then trim leading/trailing underscores.
fn sanitize_table_name(stem: &str) -> String {
    let replaced: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    replaced.trim_matches('_').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_csv(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_sanitize_table_name() {
        assert_eq!(sanitize_table_name("Sales Data-2024"), "sales_data_2024");
        assert_eq!(sanitize_table_name("__orders__"), "orders");
        assert_eq!(sanitize_table_name("customers"), "customers");
    }

    #[test]
    fn test_load_missing_dir() {
        let err = DatasetStore::load("/nonexistent/data/path").unwrap_err();
        assert!(matches!(err, DatastoreError::NotFound(_)));
    }

    #[test]
    fn test_load_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = DatasetStore::load(dir.path()).unwrap_err();
        assert!(matches!(err, DatastoreError::NoDatasets(_)));
    }

    #[test]
    fn test_load_and_info() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "Sales Data.csv", "region,amount\nnorth,10\nsouth,20\n");
        write_csv(dir.path(), "customers.CSV", "id,name,city\n1,ann,berlin\n");

        let store = DatasetStore::load(dir.path()).unwrap();
        assert_eq!(store.tables().len(), 2);
        assert!(store.tables().contains_key("sales_data"));
        assert!(store.tables().contains_key("customers"));

        let info = store
            .info()
            .iter()
            .find(|ds| ds.name == "sales_data")
            .unwrap();
        assert_eq!(info.rows, 2);
        assert_eq!(info.columns, 2);
        assert_eq!(info.column_names, vec!["region", "amount"]);
    }

    #[test]
    fn test_describe_format() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "sales.csv", "region,amount\nnorth,10\n");

        let store = DatasetStore::load(dir.path()).unwrap();
        let desc = store.describe();
        assert_eq!(desc, "- **sales**: 1 rows, 2 columns. Columns: region, amount");
    }

    #[test]
    fn test_collision_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "a-sales.csv", "x\n1\n");
        write_csv(dir.path(), "a_sales.csv", "y\n1\n2\n");

        let store = DatasetStore::load(dir.path()).unwrap();
        assert_eq!(store.tables().len(), 1);
        // Sorted filename order: "a-sales.csv" < "a_sales.csv", so the
        // underscore variant loads last and wins.
        let df = &store.tables()["a_sales"];
        assert_eq!(df.height(), 2);
    }
}
