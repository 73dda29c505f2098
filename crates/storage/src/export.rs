//! CSV snapshots of whole datasets for offline use.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};
use thiserror::Error;
use tracing::{info, warn};

use crate::procedure::acquire;
use crate::ConnectionFault;

const EXPORT_EXTENSION: &str = "csv";

/// Logical datasets that can be exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportDataset {
    Customers,
    Products,
    Orders,
    Quantities,
    OrdersDetailed,
    SalesReport,
}

impl ExportDataset {
    pub const ALL: [ExportDataset; 6] = [
        Self::Customers,
        Self::Products,
        Self::Orders,
        Self::Quantities,
        Self::OrdersDetailed,
        Self::SalesReport,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Customers => "customers",
            Self::Products => "products",
            Self::Orders => "orders",
            Self::Quantities => "quantities",
            Self::OrdersDetailed => "orders_detailed",
            Self::SalesReport => "sales_report",
        }
    }

    fn query(self) -> &'static str {
        match self {
            Self::Customers => "SELECT customer_id, customer_name FROM customers ORDER BY customer_id",
            Self::Products => {
                "SELECT product_id, product_name, printf('%.2f', price_cents / 100.0) AS price \
                 FROM products ORDER BY product_id"
            }
            Self::Orders => {
                "SELECT order_id, customer_id, order_date, order_status FROM orders ORDER BY order_id"
            }
            Self::Quantities => {
                "SELECT order_id, product_id, quantity FROM quantities ORDER BY order_id, product_id"
            }
            Self::OrdersDetailed => {
                "SELECT o.order_id, c.customer_name, o.order_date, o.order_status, \
                 printf('%.2f', COALESCE(SUM(q.quantity * p.price_cents), 0) / 100.0) AS total_amount, \
                 COUNT(q.product_id) AS total_items \
                 FROM orders o \
                 LEFT JOIN customers c ON o.customer_id = c.customer_id \
                 LEFT JOIN quantities q ON o.order_id = q.order_id \
                 LEFT JOIN products p ON q.product_id = p.product_id \
                 GROUP BY o.order_id, c.customer_name, o.order_date, o.order_status \
                 ORDER BY o.order_date DESC, o.order_id"
            }
            // Only Delivered orders count as sold.
            Self::SalesReport => {
                "SELECT p.product_id, p.product_name, printf('%.2f', p.price_cents / 100.0) AS price, \
                 COALESCE(SUM(CASE WHEN o.order_id IS NOT NULL THEN q.quantity END), 0) AS total_sold, \
                 printf('%.2f', COALESCE(SUM(CASE WHEN o.order_id IS NOT NULL THEN q.quantity * p.price_cents END), 0) / 100.0) AS total_revenue, \
                 COUNT(DISTINCT o.order_id) AS number_of_orders \
                 FROM products p \
                 LEFT JOIN quantities q ON p.product_id = q.product_id \
                 LEFT JOIN orders o ON q.order_id = o.order_id AND o.order_status = 'Delivered' \
                 GROUP BY p.product_id, p.product_name, p.price_cents \
                 ORDER BY COALESCE(SUM(CASE WHEN o.order_id IS NOT NULL THEN q.quantity * p.price_cents END), 0) DESC, \
                 p.product_id"
            }
        }
    }
}

impl fmt::Display for ExportDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown dataset '{0}'; expected one of customers, products, orders, quantities, orders_detailed, sales_report")]
pub struct UnknownDataset(pub String);

impl FromStr for ExportDataset {
    type Err = UnknownDataset;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|dataset| dataset.name() == wanted)
            .ok_or(UnknownDataset(wanted))
    }
}

/// Result of one export attempt, shown on the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub success: bool,
    pub message: String,
    pub path: Option<PathBuf>,
}

impl ExportOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            path: None,
        }
    }
}

/// A previously written export file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Local>,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Connection(#[from] ConnectionFault),
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("export task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Writes datasets as CSV files into a fixed directory.
#[derive(Clone)]
pub struct Exporter {
    pool: SqlitePool,
    dir: PathBuf,
}

impl Exporter {
    pub(crate) fn new(pool: SqlitePool, dir: PathBuf) -> Self {
        Self { pool, dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `<dataset>_<YYYYmmdd_HHMMSS>.csv`. Failures are reported in the
    /// outcome rather than as errors.
    pub async fn export(&self, dataset: ExportDataset) -> ExportOutcome {
        match self.try_export(dataset).await {
            Ok(Some(path)) => {
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                info!(stage = "storage", dataset = dataset.name(), path = %path.display(), "export written");
                ExportOutcome {
                    success: true,
                    message: format!("Data exported successfully to {file_name}"),
                    path: Some(path),
                }
            }
            Ok(None) => ExportOutcome::failed("No data to export"),
            Err(err) => {
                warn!(stage = "storage", dataset = dataset.name(), error = %err, "export failed");
                ExportOutcome::failed(format!("Export failed: {err}"))
            }
        }
    }

    /// CSV files in the export directory, newest first. A missing directory
    /// has no exports.
    pub async fn list_exports(&self) -> Result<Vec<ExportFile>, ExportError> {
        let dir = self.dir.clone();
        let files = tokio::task::spawn_blocking(move || scan_exports(&dir)).await??;
        Ok(files)
    }

    async fn try_export(&self, dataset: ExportDataset) -> Result<Option<PathBuf>, ExportError> {
        let table = {
            let mut conn = acquire(&self.pool).await?;
            let rows = sqlx::query(dataset.query()).fetch_all(&mut *conn).await?;
            to_table(&rows)?
        };
        let Some(table) = table else {
            return Ok(None);
        };

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = self.dir.join(format!("{}_{stamp}.{EXPORT_EXTENSION}", dataset.name()));
        let dir = self.dir.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_table(&dir, &target, &table)).await??;
        Ok(Some(path))
    }
}

fn to_table(rows: &[SqliteRow]) -> Result<Option<Table>, sqlx::Error> {
    let Some(first) = rows.first() else {
        return Ok(None);
    };
    let headers = first
        .columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect();

    let rows = rows
        .iter()
        .map(|row| (0..row.len()).map(|index| cell(row, index)).collect())
        .collect::<Result<Vec<Vec<String>>, _>>()?;

    Ok(Some(Table { headers, rows }))
}

/// Renders one cell according to the storage class of its value.
fn cell(row: &SqliteRow, index: usize) -> Result<String, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(String::new());
    }
    let storage_class = raw.type_info().name().to_string();
    match storage_class.as_str() {
        "INTEGER" => row.try_get::<i64, _>(index).map(|value| value.to_string()),
        "REAL" => row.try_get::<f64, _>(index).map(|value| value.to_string()),
        _ => row.try_get::<String, _>(index),
    }
}

fn write_table(dir: &Path, path: &Path, table: &Table) -> Result<(), ExportError> {
    fs::create_dir_all(dir)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn scan_exports(dir: &Path) -> Result<Vec<ExportFile>, ExportError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(EXPORT_EXTENSION) {
            continue;
        }
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        files.push(ExportFile {
            name: entry.file_name().to_string_lossy().into_owned(),
            size: metadata.len(),
            modified: DateTime::<Local>::from(modified),
        });
    }

    files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{customer, line, order, product, setup_db};
    use order_desk_core::OrderStatus;

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .expect("read export")
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn dataset_names_parse_back() {
        for dataset in ExportDataset::ALL {
            assert_eq!(dataset.name().parse::<ExportDataset>(), Ok(dataset));
        }
        assert_eq!(
            " Sales_Report ".parse::<ExportDataset>(),
            Ok(ExportDataset::SalesReport)
        );
        assert!("invoices".parse::<ExportDataset>().is_err());
    }

    #[tokio::test]
    async fn export_writes_header_and_rows() {
        let db = setup_db().await;
        db.customers().create(&customer(1, "Jane Doe")).await.unwrap();
        db.customers().create(&customer(2, "Smith, John")).await.unwrap();
        let out = tempfile::tempdir().unwrap();
        let exporter = db.exporter(out.path().join("exports"));

        let outcome = exporter.export(ExportDataset::Customers).await;
        assert!(outcome.success, "{}", outcome.message);
        let path = outcome.path.expect("path");
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("customers_") && name.ends_with(".csv"));
        assert_eq!(outcome.message, format!("Data exported successfully to {name}"));

        assert_eq!(
            read_lines(&path),
            [
                "customer_id,customer_name",
                "C000000001,Jane Doe",
                "C000000002,\"Smith, John\"",
            ]
        );

        let listed = exporter.list_exports().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, name);
        assert!(listed[0].size > 0);
    }

    #[tokio::test]
    async fn empty_dataset_is_not_written() {
        let db = setup_db().await;
        let out = tempfile::tempdir().unwrap();
        let exporter = db.exporter(out.path());

        let outcome = exporter.export(ExportDataset::Products).await;
        assert_eq!(outcome, ExportOutcome::failed("No data to export"));
        assert!(exporter.list_exports().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_directory_lists_nothing() {
        let db = setup_db().await;
        let out = tempfile::tempdir().unwrap();
        let exporter = db.exporter(out.path().join("never-created"));
        assert!(exporter.list_exports().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sales_report_counts_delivered_orders_only() {
        let db = setup_db().await;
        db.customers().create(&customer(1, "Jane")).await.unwrap();
        db.products().create(&product(1, "Widget", 1250)).await.unwrap();
        db.products().create(&product(2, "Unsold", 999)).await.unwrap();
        db.orders().create(&order(1, 1, "2024-01-01", OrderStatus::Delivered)).await.unwrap();
        db.orders().create(&order(2, 1, "2024-01-02", OrderStatus::Pending)).await.unwrap();
        db.quantities().create(&line(1, 1, 2)).await.unwrap();
        db.quantities().create(&line(2, 1, 5)).await.unwrap();
        let out = tempfile::tempdir().unwrap();

        let outcome = db.exporter(out.path()).export(ExportDataset::SalesReport).await;
        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(
            read_lines(&outcome.path.unwrap()),
            [
                "product_id,product_name,price,total_sold,total_revenue,number_of_orders",
                "P000000001,Widget,12.50,2,25.00,1",
                "P000000002,Unsold,9.99,0,0.00,0",
            ]
        );
    }

    #[tokio::test]
    async fn orders_detailed_lists_newest_first_with_totals() {
        let db = setup_db().await;
        db.customers().create(&customer(1, "Jane")).await.unwrap();
        db.products().create(&product(1, "Widget", 300)).await.unwrap();
        db.orders().create(&order(1, 1, "2024-01-01", OrderStatus::Shipped)).await.unwrap();
        db.orders().create(&order(2, 1, "2024-02-01", OrderStatus::Pending)).await.unwrap();
        db.quantities().create(&line(1, 1, 3)).await.unwrap();
        let out = tempfile::tempdir().unwrap();

        let outcome = db.exporter(out.path()).export(ExportDataset::OrdersDetailed).await;
        let lines = read_lines(&outcome.path.expect("written"));
        assert_eq!(
            lines,
            [
                "order_id,customer_name,order_date,order_status,total_amount,total_items",
                "O000000002,Jane,2024-02-01,Pending,0.00,0",
                "O000000001,Jane,2024-01-01,Shipped,9.00,1",
            ]
        );
    }
}
