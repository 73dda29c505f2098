use sqlx::{SqliteConnection, SqlitePool};
use tracing::warn;

use order_desk_core::{Money, Product, ProductId};

use crate::procedure::{
    acquire, begin, finish, reject_on, remote_fault, MutationOutcome, Procedure, ProcedureFailure,
    FOREIGN_KEY, UNIQUE,
};
use crate::{CallError, ConnectionFault};

/// Repository wrapping the product procedures.
#[derive(Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// `CreateProduct(id, name, price)`.
    pub async fn create(&self, product: &Product) -> Result<MutationOutcome, CallError> {
        let mut tx = begin(&self.pool).await?;
        let result = insert_product(&mut tx, product).await;
        finish(tx, Procedure::CreateProduct, result).await
    }

    /// `GetProduct(id)`.
    pub async fn get(&self, id: &ProductId) -> Result<Vec<Product>, CallError> {
        let mut conn = acquire(&self.pool).await?;
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT product_id, product_name, price_cents FROM products WHERE product_id = ?",
        )
        .bind(id.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(|err| remote_fault(Procedure::GetProduct.name(), err.into()))?;

        Ok(rows.into_iter().map(ProductRow::into_domain).collect())
    }

    /// `UpdateProduct(id, name, price)`.
    pub async fn update(&self, product: &Product) -> Result<MutationOutcome, CallError> {
        let mut tx = begin(&self.pool).await?;
        let result = update_product(&mut tx, product).await;
        finish(tx, Procedure::UpdateProduct, result).await
    }

    /// `DeleteProduct(id)`. Refused while any order line still references the product.
    pub async fn delete(&self, id: &ProductId) -> Result<MutationOutcome, CallError> {
        let mut tx = begin(&self.pool).await?;
        let result = delete_product(&mut tx, id).await;
        finish(tx, Procedure::DeleteProduct, result).await
    }

    /// All products ordered by id. Query failures degrade to an empty list.
    pub async fn list(&self) -> Result<Vec<Product>, ConnectionFault> {
        let mut conn = acquire(&self.pool).await?;
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT product_id, product_name, price_cents FROM products ORDER BY product_id",
        )
        .fetch_all(&mut *conn)
        .await;

        match rows {
            Ok(rows) => Ok(rows.into_iter().map(ProductRow::into_domain).collect()),
            Err(err) => {
                warn!(stage = "storage", table = "products", error = %err, "list failed; returning no rows");
                Ok(Vec::new())
            }
        }
    }
}

async fn insert_product(conn: &mut SqliteConnection, product: &Product) -> Result<(), ProcedureFailure> {
    sqlx::query("INSERT INTO products (product_id, product_name, price_cents) VALUES (?, ?, ?)")
        .bind(product.id.as_str())
        .bind(product.name.trim())
        .bind(product.price.cents())
        .execute(conn)
        .await
        .map_err(|err| reject_on(err, UNIQUE, || format!("Product {} already exists", product.id)))?;
    Ok(())
}

async fn update_product(conn: &mut SqliteConnection, product: &Product) -> Result<(), ProcedureFailure> {
    let done = sqlx::query(
        "UPDATE products SET product_name = ?, price_cents = ? WHERE product_id = ?",
    )
    .bind(product.name.trim())
    .bind(product.price.cents())
    .bind(product.id.as_str())
    .execute(conn)
    .await?;

    if done.rows_affected() == 0 {
        return Err(ProcedureFailure::Rejected(format!(
            "Product {} does not exist",
            product.id
        )));
    }
    Ok(())
}

async fn delete_product(conn: &mut SqliteConnection, id: &ProductId) -> Result<(), ProcedureFailure> {
    let done = sqlx::query("DELETE FROM products WHERE product_id = ?")
        .bind(id.as_str())
        .execute(conn)
        .await
        .map_err(|err| {
            reject_on(err, FOREIGN_KEY, || {
                format!("Product {id} is still referenced by order lines")
            })
        })?;

    if done.rows_affected() == 0 {
        return Err(ProcedureFailure::Rejected(format!("Product {id} does not exist")));
    }
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    product_id: String,
    product_name: String,
    price_cents: i64,
}

impl ProductRow {
    fn into_domain(self) -> Product {
        Product {
            id: ProductId::from_trusted(self.product_id),
            name: self.product_name,
            price: Money::from_cents(self.price_cents),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{customer, line, order, product, setup_db};
    use order_desk_core::OrderStatus;

    #[tokio::test]
    async fn create_get_update_round_trip() {
        let db = setup_db().await;
        let repo = db.products();
        repo.create(&product(1, "Widget", 1999)).await.expect("create");

        let rows = repo.get(&product(1, "", 0).id).await.expect("get");
        assert_eq!(rows, vec![product(1, "Widget", 1999)]);

        let outcome = repo.update(&product(1, "Gadget", 2500)).await.expect("update");
        assert_eq!(outcome.message, "Product updated successfully.");
        let rows = repo.get(&product(1, "", 0).id).await.expect("get");
        assert_eq!(rows[0].price, Money::from_cents(2500));
        assert_eq!(rows[0].name, "Gadget");
    }

    #[tokio::test]
    async fn delete_refused_while_referenced() {
        let db = setup_db().await;
        db.customers().create(&customer(1, "Jane")).await.unwrap();
        db.products().create(&product(1, "Widget", 100)).await.unwrap();
        db.orders()
            .create(&order(1, 1, "2024-01-01", OrderStatus::Pending))
            .await
            .unwrap();
        db.quantities().create(&line(1, 1, 1)).await.unwrap();

        let err = db.products().delete(&product(1, "", 0).id).await.unwrap_err();
        assert_eq!(
            err.user_message(),
            "Product P000000001 is still referenced by order lines"
        );
        assert_eq!(db.products().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_unreferenced_product() {
        let db = setup_db().await;
        db.products().create(&product(4, "Spare", 100)).await.unwrap();
        let outcome = db.products().delete(&product(4, "", 0).id).await.expect("delete");
        assert_eq!(outcome.message, "Product deleted successfully.");
        assert!(db.products().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn negative_price_is_rejected_by_schema() {
        let db = setup_db().await;
        let err = db.products().create(&product(2, "Broken", -1)).await.unwrap_err();
        assert!(err.user_message().starts_with("Check constraint failed"));
    }
}
