use sqlx::{SqliteConnection, SqlitePool};
use tracing::warn;

use order_desk_core::{OrderId, OrderLine, ProductId, Quantity};

use crate::procedure::{
    acquire, begin, finish, reject_on, remote_fault, MutationOutcome, Procedure, ProcedureFailure,
    FOREIGN_KEY, UNIQUE,
};
use crate::{CallError, ConnectionFault};

/// Repository wrapping the order line procedures. Lines are keyed by
/// `(order_id, product_id)`.
#[derive(Clone)]
pub struct QuantityRepository {
    pool: SqlitePool,
}

impl QuantityRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// `CreateQuantity(order_id, product_id, quantity)`.
    pub async fn create(&self, line: &OrderLine) -> Result<MutationOutcome, CallError> {
        let mut tx = begin(&self.pool).await?;
        let result = insert_line(&mut tx, line).await;
        finish(tx, Procedure::CreateQuantity, result).await
    }

    /// `GetQuantity(order_id, product_id)`.
    pub async fn get(
        &self,
        order_id: &OrderId,
        product_id: &ProductId,
    ) -> Result<Vec<OrderLine>, CallError> {
        let mut conn = acquire(&self.pool).await?;
        let rows = sqlx::query_as::<_, LineRow>(
            "SELECT order_id, product_id, quantity FROM quantities \
             WHERE order_id = ? AND product_id = ?",
        )
        .bind(order_id.as_str())
        .bind(product_id.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(|err| remote_fault(Procedure::GetQuantity.name(), err.into()))?;

        Ok(rows.into_iter().filter_map(LineRow::into_domain).collect())
    }

    /// `UpdateQuantity(order_id, product_id, quantity)`.
    pub async fn update(&self, line: &OrderLine) -> Result<MutationOutcome, CallError> {
        let mut tx = begin(&self.pool).await?;
        let result = update_line(&mut tx, line).await;
        finish(tx, Procedure::UpdateQuantity, result).await
    }

    /// `DeleteQuantity(order_id, product_id)`.
    pub async fn delete(
        &self,
        order_id: &OrderId,
        product_id: &ProductId,
    ) -> Result<MutationOutcome, CallError> {
        let mut tx = begin(&self.pool).await?;
        let result = delete_line(&mut tx, order_id, product_id).await;
        finish(tx, Procedure::DeleteQuantity, result).await
    }

    /// All lines ordered by order then product. Query failures degrade to an empty list.
    pub async fn list(&self) -> Result<Vec<OrderLine>, ConnectionFault> {
        let mut conn = acquire(&self.pool).await?;
        let rows = sqlx::query_as::<_, LineRow>(
            "SELECT order_id, product_id, quantity FROM quantities ORDER BY order_id, product_id",
        )
        .fetch_all(&mut *conn)
        .await;

        match rows {
            Ok(rows) => Ok(rows.into_iter().filter_map(LineRow::into_domain).collect()),
            Err(err) => {
                warn!(stage = "storage", table = "quantities", error = %err, "list failed; returning no rows");
                Ok(Vec::new())
            }
        }
    }
}

async fn insert_line(conn: &mut SqliteConnection, line: &OrderLine) -> Result<(), ProcedureFailure> {
    sqlx::query("INSERT INTO quantities (order_id, product_id, quantity) VALUES (?, ?, ?)")
        .bind(line.order_id.as_str())
        .bind(line.product_id.as_str())
        .bind(line.quantity.get())
        .execute(conn)
        .await
        .map_err(|err| {
            match reject_on(err, UNIQUE, || {
                format!(
                    "Order {} already has a line for product {}",
                    line.order_id, line.product_id
                )
            }) {
                ProcedureFailure::Sql(err) => reject_on(err, FOREIGN_KEY, || {
                    format!(
                        "Order {} or product {} does not exist",
                        line.order_id, line.product_id
                    )
                }),
                rejected => rejected,
            }
        })?;
    Ok(())
}

async fn update_line(conn: &mut SqliteConnection, line: &OrderLine) -> Result<(), ProcedureFailure> {
    let done = sqlx::query(
        "UPDATE quantities SET quantity = ? WHERE order_id = ? AND product_id = ?",
    )
    .bind(line.quantity.get())
    .bind(line.order_id.as_str())
    .bind(line.product_id.as_str())
    .execute(conn)
    .await?;

    if done.rows_affected() == 0 {
        return Err(missing_line(&line.order_id, &line.product_id));
    }
    Ok(())
}

async fn delete_line(
    conn: &mut SqliteConnection,
    order_id: &OrderId,
    product_id: &ProductId,
) -> Result<(), ProcedureFailure> {
    let done = sqlx::query("DELETE FROM quantities WHERE order_id = ? AND product_id = ?")
        .bind(order_id.as_str())
        .bind(product_id.as_str())
        .execute(conn)
        .await?;

    if done.rows_affected() == 0 {
        return Err(missing_line(order_id, product_id));
    }
    Ok(())
}

fn missing_line(order_id: &OrderId, product_id: &ProductId) -> ProcedureFailure {
    ProcedureFailure::Rejected(format!(
        "Order {order_id} has no line for product {product_id}"
    ))
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    order_id: String,
    product_id: String,
    quantity: i64,
}

impl LineRow {
    /// `None` only for rows that bypassed the `quantity > 0` check.
    fn into_domain(self) -> Option<OrderLine> {
        let quantity = u32::try_from(self.quantity).ok().and_then(Quantity::new)?;
        Some(OrderLine {
            order_id: OrderId::from_trusted(self.order_id),
            product_id: ProductId::from_trusted(self.product_id),
            quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{customer, line, order, product, setup_db, TestDb};
    use order_desk_core::OrderStatus;

    async fn seeded() -> TestDb {
        let db = setup_db().await;
        db.customers().create(&customer(1, "Jane")).await.unwrap();
        db.products().create(&product(1, "Widget", 250)).await.unwrap();
        db.products().create(&product(2, "Gadget", 400)).await.unwrap();
        db.orders()
            .create(&order(1, 1, "2024-02-01", OrderStatus::Pending))
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn create_update_get_by_composite_key() {
        let db = seeded().await;
        let repo = db.quantities();
        repo.create(&line(1, 1, 2)).await.expect("create");
        repo.create(&line(1, 2, 1)).await.expect("create second product");

        let outcome = repo.update(&line(1, 1, 7)).await.expect("update");
        assert_eq!(outcome.message, "Quantity updated successfully.");

        let key = line(1, 1, 1);
        let rows = repo.get(&key.order_id, &key.product_id).await.unwrap();
        assert_eq!(rows, vec![line(1, 1, 7)]);
        assert_eq!(repo.list().await.unwrap(), vec![line(1, 1, 7), line(1, 2, 1)]);
    }

    #[tokio::test]
    async fn duplicate_line_is_rejected() {
        let db = seeded().await;
        db.quantities().create(&line(1, 1, 2)).await.unwrap();
        let err = db.quantities().create(&line(1, 1, 3)).await.unwrap_err();
        assert_eq!(
            err.user_message(),
            "Order O000000001 already has a line for product P000000001"
        );
    }

    #[tokio::test]
    async fn line_for_unknown_product_is_rejected() {
        let db = seeded().await;
        let err = db.quantities().create(&line(1, 9, 1)).await.unwrap_err();
        assert!(matches!(err, CallError::Remote(ref fault) if fault.operation == "CreateQuantity"));
        assert!(db.quantities().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_missing_line_is_rejected() {
        let db = seeded().await;
        let key = line(1, 2, 1);
        let err = db
            .quantities()
            .delete(&key.order_id, &key.product_id)
            .await
            .unwrap_err();
        assert_eq!(
            err.user_message(),
            "Order O000000001 has no line for product P000000002"
        );
    }
}
