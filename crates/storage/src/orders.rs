use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::warn;

use order_desk_core::{CustomerId, Order, OrderId, OrderStatus};

use crate::procedure::{
    acquire, begin, finish, reject_on, remote_fault, MutationOutcome, Procedure, ProcedureFailure,
    FOREIGN_KEY, UNIQUE,
};
use crate::{CallError, ConnectionFault};

/// Repository wrapping the order procedures.
#[derive(Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// `CreateOrder(id, customer_id, date, status)`.
    pub async fn create(&self, order: &Order) -> Result<MutationOutcome, CallError> {
        let mut tx = begin(&self.pool).await?;
        let result = insert_order(&mut tx, order).await;
        finish(tx, Procedure::CreateOrder, result).await
    }

    /// `GetOrder(id)`.
    pub async fn get(&self, id: &OrderId) -> Result<Vec<Order>, CallError> {
        let mut conn = acquire(&self.pool).await?;
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT order_id, customer_id, order_date, order_status FROM orders WHERE order_id = ?",
        )
        .bind(id.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(|err| remote_fault(Procedure::GetOrder.name(), err.into()))?;

        Ok(rows.into_iter().filter_map(OrderRow::into_domain).collect())
    }

    /// `UpdateOrder(id, customer_id, date, status)`.
    pub async fn update(&self, order: &Order) -> Result<MutationOutcome, CallError> {
        let mut tx = begin(&self.pool).await?;
        let result = update_order(&mut tx, order).await;
        finish(tx, Procedure::UpdateOrder, result).await
    }

    /// `CascadeDeleteOrder(id)`: removes the order and its lines.
    pub async fn delete(&self, id: &OrderId) -> Result<MutationOutcome, CallError> {
        let mut tx = begin(&self.pool).await?;
        let result = cascade_delete_order(&mut tx, id).await;
        finish(tx, Procedure::CascadeDeleteOrder, result).await
    }

    /// All orders ordered by id. Query failures degrade to an empty list.
    pub async fn list(&self) -> Result<Vec<Order>, ConnectionFault> {
        let mut conn = acquire(&self.pool).await?;
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT order_id, customer_id, order_date, order_status FROM orders ORDER BY order_id",
        )
        .fetch_all(&mut *conn)
        .await;

        match rows {
            Ok(rows) => Ok(rows.into_iter().filter_map(OrderRow::into_domain).collect()),
            Err(err) => {
                warn!(stage = "storage", table = "orders", error = %err, "list failed; returning no rows");
                Ok(Vec::new())
            }
        }
    }
}

async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> Result<(), ProcedureFailure> {
    sqlx::query(
        "INSERT INTO orders (order_id, customer_id, order_date, order_status) VALUES (?, ?, ?, ?)",
    )
    .bind(order.id.as_str())
    .bind(order.customer_id.as_str())
    .bind(order.date)
    .bind(order.status.as_str())
    .execute(conn)
    .await
    .map_err(|err| match reject_on(err, UNIQUE, || format!("Order {} already exists", order.id)) {
        ProcedureFailure::Sql(err) => reject_on(err, FOREIGN_KEY, || {
            format!("Customer {} does not exist", order.customer_id)
        }),
        rejected => rejected,
    })?;
    Ok(())
}

async fn update_order(conn: &mut SqliteConnection, order: &Order) -> Result<(), ProcedureFailure> {
    let done = sqlx::query(
        "UPDATE orders SET customer_id = ?, order_date = ?, order_status = ? WHERE order_id = ?",
    )
    .bind(order.customer_id.as_str())
    .bind(order.date)
    .bind(order.status.as_str())
    .bind(order.id.as_str())
    .execute(conn)
    .await
    .map_err(|err| {
        reject_on(err, FOREIGN_KEY, || {
            format!("Customer {} does not exist", order.customer_id)
        })
    })?;

    if done.rows_affected() == 0 {
        return Err(ProcedureFailure::Rejected(format!(
            "Order {} does not exist",
            order.id
        )));
    }
    Ok(())
}

async fn cascade_delete_order(conn: &mut SqliteConnection, id: &OrderId) -> Result<(), ProcedureFailure> {
    sqlx::query("DELETE FROM quantities WHERE order_id = ?")
        .bind(id.as_str())
        .execute(&mut *conn)
        .await?;

    let done = sqlx::query("DELETE FROM orders WHERE order_id = ?")
        .bind(id.as_str())
        .execute(&mut *conn)
        .await?;

    if done.rows_affected() == 0 {
        return Err(ProcedureFailure::Rejected(format!("Order {id} does not exist")));
    }
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    order_id: String,
    customer_id: String,
    order_date: NaiveDate,
    order_status: String,
}

impl OrderRow {
    fn into_domain(self) -> Option<Order> {
        let status = stored_status("orders", &self.order_id, &self.order_status)?;
        Some(Order {
            id: OrderId::from_trusted(self.order_id),
            customer_id: CustomerId::from_trusted(self.customer_id),
            date: self.order_date,
            status,
        })
    }
}

/// Reads a status column. `None` only for rows that bypassed the status check;
/// those are skipped rather than shown under a guessed status.
pub(crate) fn stored_status(
    table: &'static str,
    order_id: &str,
    raw: &str,
) -> Option<OrderStatus> {
    match raw.parse() {
        Ok(status) => Some(status),
        Err(_) => {
            warn!(stage = "storage", table, order_id, status = raw, "unreadable order status; row skipped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{corrupt_status, customer, line, order, product, setup_db};

    #[tokio::test]
    async fn create_and_get_order() {
        let db = setup_db().await;
        db.customers().create(&customer(1, "Jane")).await.unwrap();
        let created = order(1, 1, "2024-03-05", OrderStatus::Shipped);
        let outcome = db.orders().create(&created).await.expect("create");
        assert_eq!(outcome.message, "Order created successfully.");
        assert_eq!(db.orders().get(&created.id).await.unwrap(), vec![created]);
    }

    #[tokio::test]
    async fn create_for_unknown_customer_is_rejected() {
        let db = setup_db().await;
        let err = db
            .orders()
            .create(&order(1, 9, "2024-03-05", OrderStatus::Pending))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Customer C000000009 does not exist");
        assert!(db.orders().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_moves_order_to_other_customer() {
        let db = setup_db().await;
        db.customers().create(&customer(1, "Jane")).await.unwrap();
        db.customers().create(&customer(2, "John")).await.unwrap();
        db.orders()
            .create(&order(1, 1, "2024-03-05", OrderStatus::Pending))
            .await
            .unwrap();

        let updated = order(1, 2, "2024-03-06", OrderStatus::Delivered);
        db.orders().update(&updated).await.expect("update");
        assert_eq!(db.orders().get(&updated.id).await.unwrap(), vec![updated]);
    }

    #[tokio::test]
    async fn delete_cascades_to_lines_only() {
        let db = setup_db().await;
        db.customers().create(&customer(1, "Jane")).await.unwrap();
        db.products().create(&product(1, "Widget", 100)).await.unwrap();
        let placed = order(1, 1, "2024-03-05", OrderStatus::Pending);
        db.orders().create(&placed).await.unwrap();
        db.quantities().create(&line(1, 1, 3)).await.unwrap();

        let outcome = db.orders().delete(&placed.id).await.expect("delete");
        assert_eq!(outcome.procedure, Procedure::CascadeDeleteOrder);
        assert!(db.orders().get(&placed.id).await.unwrap().is_empty());
        assert!(db.quantities().list().await.unwrap().is_empty());
        assert_eq!(db.customers().list().await.unwrap().len(), 1);
        assert_eq!(db.products().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_missing_order_is_rejected() {
        let db = setup_db().await;
        let err = db
            .orders()
            .delete(&OrderId::parse("O000000404").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Order O000000404 does not exist");
    }

    #[tokio::test]
    async fn unreadable_status_rows_are_skipped() {
        let db = setup_db().await;
        db.customers().create(&customer(1, "Jane")).await.unwrap();
        let kept = order(1, 1, "2024-03-05", OrderStatus::Pending);
        db.orders().create(&kept).await.unwrap();
        db.orders()
            .create(&order(2, 1, "2024-03-06", OrderStatus::Shipped))
            .await
            .unwrap();
        corrupt_status(&db, 2, "Bogus").await;

        assert_eq!(db.orders().list().await.unwrap(), vec![kept]);
        let corrupted = OrderId::parse("O000000002").unwrap();
        assert!(db.orders().get(&corrupted).await.unwrap().is_empty());
    }
}
