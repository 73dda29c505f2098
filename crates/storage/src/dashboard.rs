use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::debug;

use order_desk_core::dashboard::{
    bucket_revenue, DailyRevenue, Kpis, ProductRevenue, RevenueBucket, RevenuePeriod, StatusCount,
};
use order_desk_core::{Money, OrderStatus, ProductId};

use crate::procedure::{acquire, remote_fault};
use crate::CallError;

const DELIVERED_REVENUE: &str = "SELECT COALESCE(SUM(q.quantity * p.price_cents), 0) \
FROM quantities q \
JOIN products p ON q.product_id = p.product_id \
JOIN orders o ON q.order_id = o.order_id \
WHERE o.order_status = 'Delivered'";

const DAILY_REVENUE: &str = "SELECT o.order_date AS day, SUM(q.quantity * p.price_cents) AS revenue_cents \
FROM quantities q \
JOIN products p ON q.product_id = p.product_id \
JOIN orders o ON q.order_id = o.order_id \
WHERE o.order_status = 'Delivered' \
GROUP BY o.order_date";

// Ties fall back to insertion order of the product row.
const TOP_PRODUCTS: &str = "SELECT p.product_id, p.product_name, SUM(q.quantity * p.price_cents) AS revenue_cents \
FROM quantities q \
JOIN products p ON q.product_id = p.product_id \
JOIN orders o ON q.order_id = o.order_id \
WHERE o.order_status = 'Delivered' \
GROUP BY p.product_id, p.product_name \
ORDER BY revenue_cents DESC, MIN(p.rowid) ASC \
LIMIT ?";

/// Aggregates for the dashboard screen. Revenue counts Delivered orders only.
#[derive(Clone)]
pub struct DashboardRepository {
    pool: SqlitePool,
}

impl DashboardRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn kpis(&self) -> Result<Kpis, CallError> {
        let mut conn = acquire(&self.pool).await?;
        let fault = |err: sqlx::Error| remote_fault("DashboardKpis", err.into());

        let total_customers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&mut *conn)
            .await
            .map_err(fault)?;
        let total_products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&mut *conn)
            .await
            .map_err(fault)?;
        let by_status: Vec<(String, i64)> = sqlx::query_as(
            "SELECT order_status, COUNT(*) FROM orders GROUP BY order_status",
        )
        .fetch_all(&mut *conn)
        .await
        .map_err(fault)?;
        let revenue_cents: i64 = sqlx::query_scalar(DELIVERED_REVENUE)
            .fetch_one(&mut *conn)
            .await
            .map_err(fault)?;

        let mut orders_by_status: Vec<StatusCount> = by_status
            .into_iter()
            .filter_map(|(status, count)| {
                Some(StatusCount {
                    status: status.parse::<OrderStatus>().ok()?,
                    count: u64::try_from(count).unwrap_or_default(),
                })
            })
            .collect();
        orders_by_status.sort_by_key(|entry| OrderStatus::ALL.iter().position(|s| *s == entry.status));

        Ok(Kpis {
            total_customers: u64::try_from(total_customers).unwrap_or_default(),
            total_products: u64::try_from(total_products).unwrap_or_default(),
            orders_by_status,
            revenue_to_date: Money::from_cents(revenue_cents),
        })
    }

    /// Delivered revenue grouped into the most recent buckets of `period`,
    /// most recent first.
    pub async fn revenue_by_period(&self, period: RevenuePeriod) -> Result<Vec<RevenueBucket>, CallError> {
        let mut conn = acquire(&self.pool).await?;
        let rows: Vec<(NaiveDate, i64)> = sqlx::query_as(DAILY_REVENUE)
            .fetch_all(&mut *conn)
            .await
            .map_err(|err| remote_fault("RevenueByPeriod", err.into()))?;

        let days: Vec<DailyRevenue> = rows
            .into_iter()
            .map(|(day, cents)| DailyRevenue {
                day,
                revenue: Money::from_cents(cents),
            })
            .collect();
        let buckets = bucket_revenue(&days, period);
        debug!(stage = "storage", period = period.as_str(), days = days.len(), buckets = buckets.len(), "revenue bucketed");
        Ok(buckets)
    }

    /// Top `limit` products by delivered revenue, highest first.
    pub async fn top_products(&self, limit: u32) -> Result<Vec<ProductRevenue>, CallError> {
        let mut conn = acquire(&self.pool).await?;
        let rows: Vec<(String, String, i64)> = sqlx::query_as(TOP_PRODUCTS)
            .bind(limit)
            .fetch_all(&mut *conn)
            .await
            .map_err(|err| remote_fault("TopProducts", err.into()))?;

        Ok(rows
            .into_iter()
            .map(|(id, name, cents)| ProductRevenue {
                product_id: ProductId::from_trusted(id),
                product_name: name,
                revenue: Money::from_cents(cents),
            })
            .collect())
    }
}
