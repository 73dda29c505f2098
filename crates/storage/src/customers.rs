use sqlx::{SqliteConnection, SqlitePool};
use tracing::warn;

use order_desk_core::{Customer, CustomerId};

use crate::procedure::{
    acquire, begin, finish, reject_on, remote_fault, MutationOutcome, Procedure, ProcedureFailure,
    UNIQUE,
};
use crate::{CallError, ConnectionFault};

/// Repository wrapping the customer procedures.
#[derive(Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// `CreateCustomer(id, name)`.
    pub async fn create(&self, customer: &Customer) -> Result<MutationOutcome, CallError> {
        let mut tx = begin(&self.pool).await?;
        let result = insert_customer(&mut tx, customer).await;
        finish(tx, Procedure::CreateCustomer, result).await
    }

    /// `GetCustomer(id)`; an unknown id yields an empty list.
    pub async fn get(&self, id: &CustomerId) -> Result<Vec<Customer>, CallError> {
        let mut conn = acquire(&self.pool).await?;
        let rows = sqlx::query_as::<_, CustomerRow>(
            "SELECT customer_id, customer_name FROM customers WHERE customer_id = ?",
        )
        .bind(id.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(|err| remote_fault(Procedure::GetCustomer.name(), err.into()))?;

        Ok(rows.into_iter().map(CustomerRow::into_domain).collect())
    }

    /// `UpdateCustomer(id, name)`.
    pub async fn update(&self, customer: &Customer) -> Result<MutationOutcome, CallError> {
        let mut tx = begin(&self.pool).await?;
        let result = update_customer(&mut tx, customer).await;
        finish(tx, Procedure::UpdateCustomer, result).await
    }

    /// `CascadeDeleteCustomer(id)`: removes the customer, its orders and their lines.
    pub async fn delete(&self, id: &CustomerId) -> Result<MutationOutcome, CallError> {
        let mut tx = begin(&self.pool).await?;
        let result = cascade_delete_customer(&mut tx, id).await;
        finish(tx, Procedure::CascadeDeleteCustomer, result).await
    }

    /// All customers ordered by id. Query failures degrade to an empty list.
    pub async fn list(&self) -> Result<Vec<Customer>, ConnectionFault> {
        let mut conn = acquire(&self.pool).await?;
        let rows = sqlx::query_as::<_, CustomerRow>(
            "SELECT customer_id, customer_name FROM customers ORDER BY customer_id",
        )
        .fetch_all(&mut *conn)
        .await;

        match rows {
            Ok(rows) => Ok(rows.into_iter().map(CustomerRow::into_domain).collect()),
            Err(err) => {
                warn!(stage = "storage", table = "customers", error = %err, "list failed; returning no rows");
                Ok(Vec::new())
            }
        }
    }
}

async fn insert_customer(
    conn: &mut SqliteConnection,
    customer: &Customer,
) -> Result<(), ProcedureFailure> {
    sqlx::query("INSERT INTO customers (customer_id, customer_name) VALUES (?, ?)")
        .bind(customer.id.as_str())
        .bind(customer.name.trim())
        .execute(conn)
        .await
        .map_err(|err| reject_on(err, UNIQUE, || format!("Customer {} already exists", customer.id)))?;
    Ok(())
}

async fn update_customer(
    conn: &mut SqliteConnection,
    customer: &Customer,
) -> Result<(), ProcedureFailure> {
    let done = sqlx::query("UPDATE customers SET customer_name = ? WHERE customer_id = ?")
        .bind(customer.name.trim())
        .bind(customer.id.as_str())
        .execute(conn)
        .await?;

    if done.rows_affected() == 0 {
        return Err(ProcedureFailure::Rejected(format!(
            "Customer {} does not exist",
            customer.id
        )));
    }
    Ok(())
}

async fn cascade_delete_customer(
    conn: &mut SqliteConnection,
    id: &CustomerId,
) -> Result<(), ProcedureFailure> {
    sqlx::query(
        "DELETE FROM quantities WHERE order_id IN \
         (SELECT order_id FROM orders WHERE customer_id = ?)",
    )
    .bind(id.as_str())
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM orders WHERE customer_id = ?")
        .bind(id.as_str())
        .execute(&mut *conn)
        .await?;

    let done = sqlx::query("DELETE FROM customers WHERE customer_id = ?")
        .bind(id.as_str())
        .execute(&mut *conn)
        .await?;

    if done.rows_affected() == 0 {
        return Err(ProcedureFailure::Rejected(format!(
            "Customer {id} does not exist"
        )));
    }
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    customer_id: String,
    customer_name: String,
}

impl CustomerRow {
    fn into_domain(self) -> Customer {
        Customer {
            id: CustomerId::from_trusted(self.customer_id),
            name: self.customer_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{customer, line, order, product, setup_db};
    use order_desk_core::OrderStatus;

    #[tokio::test]
    async fn create_then_get_round_trips_upper_cased_id() {
        let db = setup_db().await;
        let repo = db.customers();
        let id = CustomerId::parse("c000000001").expect("id");
        let outcome = repo
            .create(&Customer {
                id: id.clone(),
                name: "Jane Doe".into(),
            })
            .await
            .expect("create");
        assert_eq!(outcome.message, "Customer created successfully.");

        let rows = repo.get(&id).await.expect("get");
        assert_eq!(
            rows,
            vec![Customer {
                id: CustomerId::parse("C000000001").unwrap(),
                name: "Jane Doe".into()
            }]
        );
    }

    #[tokio::test]
    async fn get_unknown_id_is_empty_not_error() {
        let db = setup_db().await;
        let rows = db
            .customers()
            .get(&CustomerId::parse("C999999999").unwrap())
            .await
            .expect("get");
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn duplicate_create_is_a_remote_fault() {
        let db = setup_db().await;
        let repo = db.customers();
        repo.create(&customer(1, "Jane")).await.expect("first create");
        let err = repo.create(&customer(1, "Other")).await.unwrap_err();
        match err {
            CallError::Remote(fault) => {
                assert_eq!(fault.operation, "CreateCustomer");
                assert_eq!(fault.message, "Customer C000000001 already exists");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let rows = repo.get(&customer(1, "").id).await.expect("get");
        assert_eq!(rows[0].name, "Jane");
    }

    #[tokio::test]
    async fn update_missing_customer_is_rejected() {
        let db = setup_db().await;
        let err = db.customers().update(&customer(7, "Ghost")).await.unwrap_err();
        assert_eq!(err.user_message(), "Customer C000000007 does not exist");
    }

    #[tokio::test]
    async fn update_changes_name() {
        let db = setup_db().await;
        let repo = db.customers();
        repo.create(&customer(2, "Before")).await.expect("create");
        let outcome = repo.update(&customer(2, "After")).await.expect("update");
        assert_eq!(outcome.procedure, Procedure::UpdateCustomer);
        assert_eq!(repo.get(&customer(2, "").id).await.unwrap()[0].name, "After");
    }

    #[tokio::test]
    async fn delete_cascades_to_orders_and_lines() {
        let db = setup_db().await;
        db.customers().create(&customer(1, "Jane")).await.unwrap();
        db.customers().create(&customer(2, "John")).await.unwrap();
        db.products().create(&product(1, "Widget", 1000)).await.unwrap();
        db.orders()
            .create(&order(1, 1, "2024-01-01", OrderStatus::Pending))
            .await
            .unwrap();
        db.orders()
            .create(&order(2, 2, "2024-01-01", OrderStatus::Pending))
            .await
            .unwrap();
        db.quantities().create(&line(1, 1, 2)).await.unwrap();
        db.quantities().create(&line(2, 1, 5)).await.unwrap();

        let outcome = db.customers().delete(&customer(1, "").id).await.expect("delete");
        assert_eq!(outcome.message, "Customer deleted successfully.");

        assert!(db.customers().get(&customer(1, "").id).await.unwrap().is_empty());
        assert!(db.orders().get(&order(1, 1, "2024-01-01", OrderStatus::Pending).id).await.unwrap().is_empty());
        let remaining = db.quantities().list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].order_id.as_str(), "O000000002");
        assert_eq!(db.orders().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_is_ordered_by_id() {
        let db = setup_db().await;
        let repo = db.customers();
        repo.create(&customer(3, "C")).await.unwrap();
        repo.create(&customer(1, "A")).await.unwrap();
        repo.create(&customer(2, "B")).await.unwrap();
        let ids: Vec<_> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id.to_string())
            .collect();
        assert_eq!(ids, ["C000000001", "C000000002", "C000000003"]);
    }

    #[tokio::test]
    async fn list_degrades_to_empty_when_query_fails() {
        let db = setup_db().await;
        sqlx::query("DROP TABLE quantities").execute(db.pool()).await.unwrap();
        sqlx::query("DROP TABLE orders").execute(db.pool()).await.unwrap();
        sqlx::query("DROP TABLE customers").execute(db.pool()).await.unwrap();
        let rows = db.customers().list().await.expect("no connection fault");
        assert!(rows.is_empty());
    }
}
