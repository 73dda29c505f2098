//! Named procedures and the transaction envelope every mutation runs in.

use std::fmt;

use sqlx::{pool::PoolConnection, Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, warn};

use crate::{CallError, ConnectionFault, RemoteFault};

/// Server-side procedures exposed by the data layer. Arguments are positional
/// and identifiers are already upper-cased by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    CreateCustomer,
    GetCustomer,
    UpdateCustomer,
    CascadeDeleteCustomer,
    CreateProduct,
    GetProduct,
    UpdateProduct,
    DeleteProduct,
    CreateOrder,
    GetOrder,
    UpdateOrder,
    CascadeDeleteOrder,
    CreateQuantity,
    GetQuantity,
    UpdateQuantity,
    DeleteQuantity,
}

impl Procedure {
    pub fn name(self) -> &'static str {
        match self {
            Self::CreateCustomer => "CreateCustomer",
            Self::GetCustomer => "GetCustomer",
            Self::UpdateCustomer => "UpdateCustomer",
            Self::CascadeDeleteCustomer => "CascadeDeleteCustomer",
            Self::CreateProduct => "CreateProduct",
            Self::GetProduct => "GetProduct",
            Self::UpdateProduct => "UpdateProduct",
            Self::DeleteProduct => "DeleteProduct",
            Self::CreateOrder => "CreateOrder",
            Self::GetOrder => "GetOrder",
            Self::UpdateOrder => "UpdateOrder",
            Self::CascadeDeleteOrder => "CascadeDeleteOrder",
            Self::CreateQuantity => "CreateQuantity",
            Self::GetQuantity => "GetQuantity",
            Self::UpdateQuantity => "UpdateQuantity",
            Self::DeleteQuantity => "DeleteQuantity",
        }
    }

    /// Confirmation shown after a committed mutation.
    fn confirmation(self) -> &'static str {
        match self {
            Self::CreateCustomer => "Customer created successfully.",
            Self::UpdateCustomer => "Customer updated successfully.",
            Self::CascadeDeleteCustomer => "Customer deleted successfully.",
            Self::CreateProduct => "Product created successfully.",
            Self::UpdateProduct => "Product updated successfully.",
            Self::DeleteProduct => "Product deleted successfully.",
            Self::CreateOrder => "Order created successfully.",
            Self::UpdateOrder => "Order updated successfully.",
            Self::CascadeDeleteOrder => "Order deleted successfully.",
            Self::CreateQuantity => "Quantity created successfully.",
            Self::UpdateQuantity => "Quantity updated successfully.",
            Self::DeleteQuantity => "Quantity deleted successfully.",
            Self::GetCustomer | Self::GetProduct | Self::GetOrder | Self::GetQuantity => "Done.",
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub procedure: Procedure,
    pub message: String,
}

/// Why a procedure body failed.
#[derive(Debug)]
pub(crate) enum ProcedureFailure {
    Sql(sqlx::Error),
    Rejected(String),
}

impl From<sqlx::Error> for ProcedureFailure {
    fn from(err: sqlx::Error) -> Self {
        Self::Sql(err)
    }
}

impl ProcedureFailure {
    fn describe(&self) -> String {
        match self {
            Self::Rejected(message) => message.clone(),
            Self::Sql(err) => describe_sql_error(err),
        }
    }
}

/// Primary key or unique index violations.
pub(crate) const UNIQUE: &[&str] = &["1555", "2067"];
/// Foreign key violations.
pub(crate) const FOREIGN_KEY: &[&str] = &["787"];

/// Turns a constraint violation with one of `codes` into a rejection with a
/// specific message; anything else stays a SQL failure.
pub(crate) fn reject_on(
    err: sqlx::Error,
    codes: &[&str],
    message: impl FnOnce() -> String,
) -> ProcedureFailure {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err
            .code()
            .is_some_and(|code| codes.contains(&code.as_ref()))
        {
            return ProcedureFailure::Rejected(message());
        }
    }
    ProcedureFailure::Sql(err)
}

pub(crate) fn remote_fault(operation: &'static str, failure: ProcedureFailure) -> RemoteFault {
    RemoteFault {
        operation,
        message: failure.describe(),
    }
}

/// Translates SQLite constraint codes into messages a user can act on.
pub(crate) fn describe_sql_error(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("1555") | Some("2067") => "Duplicate entry: a record with this ID already exists".into(),
            Some("787") => "Foreign key constraint fails: a referenced record is missing or still in use".into(),
            Some("275") => format!("Check constraint failed: {}", db_err.message()),
            Some("1299") => format!("Required value missing: {}", db_err.message()),
            _ => db_err.message().to_string(),
        },
        sqlx::Error::RowNotFound => "No matching record".into(),
        other => other.to_string(),
    }
}

pub(crate) async fn acquire(pool: &SqlitePool) -> Result<PoolConnection<Sqlite>, ConnectionFault> {
    pool.acquire().await.map_err(ConnectionFault)
}

pub(crate) async fn begin(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, ConnectionFault> {
    pool.begin().await.map_err(ConnectionFault)
}

/// Commits on success and rolls back on failure, so a mutation either fully
/// applies or leaves nothing behind. The connection returns to the pool when
/// the transaction is dropped.
pub(crate) async fn finish(
    tx: Transaction<'static, Sqlite>,
    procedure: Procedure,
    result: Result<(), ProcedureFailure>,
) -> Result<MutationOutcome, CallError> {
    match result {
        Ok(()) => {
            tx.commit()
                .await
                .map_err(|err| remote_fault(procedure.name(), ProcedureFailure::Sql(err)))?;
            info!(stage = "storage", procedure = procedure.name(), "procedure committed");
            Ok(MutationOutcome {
                procedure,
                message: procedure.confirmation().to_string(),
            })
        }
        Err(failure) => {
            if let Err(err) = tx.rollback().await {
                debug!(stage = "storage", procedure = procedure.name(), error = %err, "rollback failed");
            }
            let fault = remote_fault(procedure.name(), failure);
            warn!(stage = "storage", procedure = procedure.name(), error = %fault.message, "procedure rejected");
            Err(fault.into())
        }
    }
}

/// Escapes LIKE metacharacters and wraps the term in `%` markers.
/// Pair with `ESCAPE '\'` in the query.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
