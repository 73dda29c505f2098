//! Dynamic WHERE/HAVING assembly for the order filter screen.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::input::InputError;
use crate::types::{Money, OrderStatus};

/// Optional criteria accepted by the order filter. `None` means "not filtered".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub min_total: Option<Money>,
    pub max_total: Option<Money>,
}

impl OrderFilter {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Rejects ranges whose lower bound exceeds the upper bound.
    pub fn check_bounds(&self) -> Result<(), InputError> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(InputError::InvertedDates { start, end });
            }
        }
        if let (Some(min), Some(max)) = (self.min_total, self.max_total) {
            if min > max {
                return Err(InputError::InvertedAmounts { min, max });
            }
        }
        Ok(())
    }
}

/// Positional parameter bound to one `?` placeholder of a [`FilterQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterParam {
    Status(OrderStatus),
    Date(NaiveDate),
    Cents(i64),
}

/// Generated SQL text plus its parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterQuery {
    pub sql: String,
    pub params: Vec<FilterParam>,
}

const FILTER_SELECT: &str = "SELECT o.order_id, c.customer_name, o.order_date, o.order_status, \
SUM(q.quantity * p.price_cents) AS total_cents \
FROM orders o \
JOIN customers c ON o.customer_id = c.customer_id \
JOIN quantities q ON o.order_id = q.order_id \
JOIN products p ON q.product_id = p.product_id";

const FILTER_GROUP_BY: &str =
    " GROUP BY o.order_id, c.customer_name, o.order_date, o.order_status";

const ORDER_TOTAL: &str = "SUM(q.quantity * p.price_cents)";

/// Builds the grouped order query for the given criteria.
///
/// Row filters (status and dates) go into WHERE; total bounds filter the
/// aggregate and go into HAVING. Parameters are pushed in the same order as
/// their placeholders are written, WHERE before HAVING.
pub fn build_filter_query(filter: &OrderFilter) -> FilterQuery {
    let mut sql = String::from(FILTER_SELECT);
    let mut params = Vec::new();

    let mut conditions = Vec::new();
    if let Some(status) = filter.status {
        conditions.push("o.order_status = ?");
        params.push(FilterParam::Status(status));
    }
    if let Some(start) = filter.start_date {
        conditions.push("o.order_date >= ?");
        params.push(FilterParam::Date(start));
    }
    if let Some(end) = filter.end_date {
        conditions.push("o.order_date <= ?");
        params.push(FilterParam::Date(end));
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    sql.push_str(FILTER_GROUP_BY);

    let mut having = Vec::new();
    if let Some(min) = filter.min_total {
        having.push(format!("{ORDER_TOTAL} >= ?"));
        params.push(FilterParam::Cents(min.cents()));
    }
    if let Some(max) = filter.max_total {
        having.push(format!("{ORDER_TOTAL} <= ?"));
        params.push(FilterParam::Cents(max.cents()));
    }
    if !having.is_empty() {
        sql.push_str(" HAVING ");
        sql.push_str(&having.join(" AND "));
    }

    sql.push_str(" ORDER BY o.order_id");

    FilterQuery { sql, params }
}
