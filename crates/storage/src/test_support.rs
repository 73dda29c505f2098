use std::ops::Deref;

use chrono::NaiveDate;
use tempfile::TempDir;

use order_desk_core::{
    Customer, CustomerId, Money, Order, OrderId, OrderLine, OrderStatus, Product, ProductId,
    Quantity,
};

use crate::Database;

/// File-backed database that lives as long as its temporary directory.
pub(crate) struct TestDb {
    db: Database,
    _dir: TempDir,
}

impl Deref for TestDb {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.db
    }
}

pub(crate) async fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("desk.db").display());
    let db = Database::connect(&url, 4).await.expect("connect");
    db.run_migrations().await.expect("migrations");
    TestDb { db, _dir: dir }
}

/// Overwrites an order's status, bypassing the column's CHECK constraint.
pub(crate) async fn corrupt_status(db: &Database, order: u32, raw: &str) {
    let mut conn = db.pool().acquire().await.expect("connection");
    sqlx::query("PRAGMA ignore_check_constraints = ON")
        .execute(&mut *conn)
        .await
        .expect("pragma");
    sqlx::query("UPDATE orders SET order_status = ? WHERE order_id = ?")
        .bind(raw)
        .bind(format!("O{order:09}"))
        .execute(&mut *conn)
        .await
        .expect("update");
    sqlx::query("PRAGMA ignore_check_constraints = OFF")
        .execute(&mut *conn)
        .await
        .expect("pragma");
}

pub(crate) fn customer(n: u32, name: &str) -> Customer {
    Customer {
        id: CustomerId::parse(&format!("C{n:09}")).expect("customer id"),
        name: name.to_string(),
    }
}

pub(crate) fn product(n: u32, name: &str, price_cents: i64) -> Product {
    Product {
        id: ProductId::parse(&format!("P{n:09}")).expect("product id"),
        name: name.to_string(),
        price: Money::from_cents(price_cents),
    }
}

pub(crate) fn order(n: u32, customer: u32, date: &str, status: OrderStatus) -> Order {
    Order {
        id: OrderId::parse(&format!("O{n:09}")).expect("order id"),
        customer_id: CustomerId::parse(&format!("C{customer:09}")).expect("customer id"),
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("date"),
        status,
    }
}

pub(crate) fn line(order: u32, product: u32, quantity: u32) -> OrderLine {
    OrderLine {
        order_id: OrderId::parse(&format!("O{order:09}")).expect("order id"),
        product_id: ProductId::parse(&format!("P{product:09}")).expect("product id"),
        quantity: Quantity::new(quantity).expect("positive quantity"),
    }
}
