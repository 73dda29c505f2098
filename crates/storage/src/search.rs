use std::fmt;

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use order_desk_core::{
    build_filter_query, Customer, CustomerId, FilterParam, Money, OrderFilter, OrderId,
    OrderMatch, OrderSummary, Product, ProductId,
};

use crate::orders::stored_status;
use crate::procedure::{acquire, like_pattern, remote_fault};
use crate::CallError;

const SEARCH_CUSTOMERS: &str = "SELECT customer_id, customer_name FROM customers \
WHERE customer_name LIKE ? ESCAPE '\\' ORDER BY customer_id";

const SEARCH_PRODUCTS: &str = "SELECT product_id, product_name, price_cents FROM products \
WHERE product_name LIKE ? ESCAPE '\\' ORDER BY product_id";

const SEARCH_ORDERS: &str = "SELECT o.order_id, c.customer_name, o.order_date, o.order_status \
FROM orders o JOIN customers c ON o.customer_id = c.customer_id \
WHERE o.order_id LIKE ?1 ESCAPE '\\' OR c.customer_name LIKE ?1 ESCAPE '\\' \
ORDER BY o.order_id";

/// Which sub-query of the global search a result or failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchScope {
    Customers,
    Products,
    Orders,
}

impl SearchScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customers => "customers",
            Self::Products => "products",
            Self::Orders => "orders",
        }
    }

    fn operation(self) -> &'static str {
        match self {
            Self::Customers => "SearchCustomers",
            Self::Products => "SearchProducts",
            Self::Orders => "SearchOrders",
        }
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFailure {
    pub scope: SearchScope,
    pub message: String,
}

/// Merged output of the three search sub-queries. A failed sub-query leaves
/// its sequence empty and records a [`SearchFailure`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    pub customers: Vec<Customer>,
    pub products: Vec<Product>,
    pub orders: Vec<OrderMatch>,
    pub failures: Vec<SearchFailure>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.customers.is_empty() && self.products.is_empty() && self.orders.is_empty()
    }
}

/// Read-only queries behind the search and filter screen.
#[derive(Clone)]
pub struct SearchRepository {
    pool: SqlitePool,
}

impl SearchRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Runs the customer, product and order lookups concurrently for `term`.
    pub async fn global_search(&self, term: &str) -> SearchResults {
        let pattern = like_pattern(term.trim());
        let (customers, products, orders) = tokio::join!(
            self.search_customers(&pattern),
            self.search_products(&pattern),
            self.search_orders(&pattern),
        );

        let mut failures = Vec::new();
        let results = SearchResults {
            customers: collect(SearchScope::Customers, customers, &mut failures),
            products: collect(SearchScope::Products, products, &mut failures),
            orders: collect(SearchScope::Orders, orders, &mut failures),
            failures,
        };

        debug!(
            stage = "storage",
            customers = results.customers.len(),
            products = results.products.len(),
            orders = results.orders.len(),
            failures = results.failures.len(),
            "global search finished"
        );
        results
    }

    /// Executes the grouped order query for `filter`, ordered by order id.
    pub async fn filter_orders(&self, filter: &OrderFilter) -> Result<Vec<OrderSummary>, CallError> {
        let query = build_filter_query(filter);
        let mut conn = acquire(&self.pool).await?;

        let mut statement = sqlx::query_as::<_, SummaryRow>(&query.sql);
        for param in &query.params {
            statement = match param {
                FilterParam::Status(status) => statement.bind(status.as_str()),
                FilterParam::Date(date) => statement.bind(*date),
                FilterParam::Cents(cents) => statement.bind(*cents),
            };
        }

        let rows = statement
            .fetch_all(&mut *conn)
            .await
            .map_err(|err| remote_fault("FilterOrders", err.into()))?;

        Ok(rows.into_iter().filter_map(SummaryRow::into_domain).collect())
    }

    async fn search_customers(&self, pattern: &str) -> Result<Vec<Customer>, CallError> {
        let mut conn = acquire(&self.pool).await?;
        let rows = sqlx::query_as::<_, (String, String)>(SEARCH_CUSTOMERS)
            .bind(pattern)
            .fetch_all(&mut *conn)
            .await
            .map_err(|err| remote_fault(SearchScope::Customers.operation(), err.into()))?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| Customer {
                id: CustomerId::from_trusted(id),
                name,
            })
            .collect())
    }

    async fn search_products(&self, pattern: &str) -> Result<Vec<Product>, CallError> {
        let mut conn = acquire(&self.pool).await?;
        let rows = sqlx::query_as::<_, (String, String, i64)>(SEARCH_PRODUCTS)
            .bind(pattern)
            .fetch_all(&mut *conn)
            .await
            .map_err(|err| remote_fault(SearchScope::Products.operation(), err.into()))?;

        Ok(rows
            .into_iter()
            .map(|(id, name, price_cents)| Product {
                id: ProductId::from_trusted(id),
                name,
                price: Money::from_cents(price_cents),
            })
            .collect())
    }

    async fn search_orders(&self, pattern: &str) -> Result<Vec<OrderMatch>, CallError> {
        let mut conn = acquire(&self.pool).await?;
        let rows = sqlx::query_as::<_, MatchRow>(SEARCH_ORDERS)
            .bind(pattern)
            .fetch_all(&mut *conn)
            .await
            .map_err(|err| remote_fault(SearchScope::Orders.operation(), err.into()))?;

        Ok(rows.into_iter().filter_map(MatchRow::into_domain).collect())
    }
}

fn collect<T>(
    scope: SearchScope,
    result: Result<Vec<T>, CallError>,
    failures: &mut Vec<SearchFailure>,
) -> Vec<T> {
    match result {
        Ok(rows) => rows,
        Err(err) => {
            warn!(stage = "storage", scope = scope.as_str(), error = %err, "search sub-query failed");
            failures.push(SearchFailure {
                scope,
                message: err.user_message(),
            });
            Vec::new()
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MatchRow {
    order_id: String,
    customer_name: String,
    order_date: NaiveDate,
    order_status: String,
}

impl MatchRow {
    fn into_domain(self) -> Option<OrderMatch> {
        let status = stored_status("orders", &self.order_id, &self.order_status)?;
        Some(OrderMatch {
            order_id: OrderId::from_trusted(self.order_id),
            customer_name: self.customer_name,
            order_date: self.order_date,
            status,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    order_id: String,
    customer_name: String,
    order_date: NaiveDate,
    order_status: String,
    total_cents: i64,
}

impl SummaryRow {
    fn into_domain(self) -> Option<OrderSummary> {
        let status = stored_status("orders", &self.order_id, &self.order_status)?;
        Some(OrderSummary {
            order_id: OrderId::from_trusted(self.order_id),
            customer_name: self.customer_name,
            order_date: self.order_date,
            status,
            total_amount: Money::from_cents(self.total_cents),
        })
    }
}
