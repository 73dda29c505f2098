//! Domain types and pure logic shared by the storage layer and the desk UI.

pub mod dashboard;
pub mod filter;
pub mod ids;
pub mod input;
pub mod types;

pub use filter::{build_filter_query, FilterParam, FilterQuery, OrderFilter};
pub use ids::{CustomerId, IdError, OrderId, ProductId};
pub use input::InputError;
pub use types::{
    Customer, Money, Order, OrderLine, OrderMatch, OrderStatus, OrderSummary, Product, Quantity,
};
