use order_desk_core::input::parse_quantity;
use order_desk_core::{InputError, OrderId, OrderLine, ProductId};

use super::{show_found, Desk};
use crate::command::QuantityAction;
use crate::dispatch::{Slot, TaskKey};
use crate::state::{Found, Screen, UiState};

const LIST: TaskKey = TaskKey::new(Screen::Quantities, Slot::List);
const LOOKUP: TaskKey = TaskKey::new(Screen::Quantities, Slot::Lookup);
const MUTATION: TaskKey = TaskKey::new(Screen::Quantities, Slot::Mutation);

pub(super) fn handle(desk: &Desk, state: &mut UiState, action: QuantityAction) {
    desk.navigate(state, Screen::Quantities);
    if let Err(err) = dispatch(desk, action) {
        state.reject(err.to_string());
    }
}

pub(super) fn load(desk: &Desk) {
    let repo = desk.db().quantities();
    desk.submit(LIST, async move { repo.list().await }, |state: &mut UiState, result| {
        state.record_list(|s| &mut s.lines, result)
    });
}

fn dispatch(desk: &Desk, action: QuantityAction) -> Result<(), InputError> {
    let repo = desk.db().quantities();
    match action {
        QuantityAction::Create {
            order,
            product,
            quantity,
        } => {
            let line = line(&order, &product, &quantity)?;
            desk.submit_committed(
                MUTATION,
                async move { repo.create(&line).await },
                UiState::record_mutation,
            );
        }
        QuantityAction::Update {
            order,
            product,
            quantity,
        } => {
            let line = line(&order, &product, &quantity)?;
            desk.submit_committed(
                MUTATION,
                async move { repo.update(&line).await },
                UiState::record_mutation,
            );
        }
        QuantityAction::Delete { order, product } => {
            let (order, product) = key(&order, &product)?;
            desk.submit_committed(
                MUTATION,
                async move { repo.delete(&order, &product).await },
                UiState::record_mutation,
            );
        }
        QuantityAction::Get { order, product } => {
            let (order, product) = key(&order, &product)?;
            let missing = format!("Order {order} has no line for product {product}");
            desk.submit(
                LOOKUP,
                async move { repo.get(&order, &product).await },
                move |state: &mut UiState, result| show_found(state, result, Found::Lines, &missing),
            );
        }
        QuantityAction::List => load(desk),
    }
    Ok(())
}

fn key(order: &str, product: &str) -> Result<(OrderId, ProductId), InputError> {
    Ok((OrderId::parse(order)?, ProductId::parse(product)?))
}

fn line(order: &str, product: &str, quantity: &str) -> Result<OrderLine, InputError> {
    let (order_id, product_id) = key(order, product)?;
    Ok(OrderLine {
        order_id,
        product_id,
        quantity: parse_quantity(quantity)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::screens::test_support::Harness;
    use crate::state::Tone;

    async fn seeded() -> Harness {
        let mut harness = Harness::new().await;
        harness.run("customer create C000000001 Jane", 2).await;
        harness.run("product create P000000001 Lamp 10.00", 2).await;
        harness
            .run("order create O000000001 C000000001 2024-03-05", 2)
            .await;
        harness
    }

    #[tokio::test]
    async fn non_positive_quantity_never_reaches_storage() {
        let mut harness = seeded().await;
        for line in [
            "quantity create O000000001 P000000001 0",
            "quantity create O000000001 P000000001 -2",
        ] {
            harness.run(line, 0).await;
            let status = harness.status.clone().expect("status");
            assert_eq!(status.tone, Tone::Negative);
            assert_eq!(status.text, "Quantity must be greater than 0");
        }
        harness.assert_quiet().await;

        let stored = harness.db.quantities().list().await.expect("list");
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn create_then_update_line() {
        let mut harness = seeded().await;
        harness
            .run("quantity create O000000001 P000000001 3", 2)
            .await;
        assert_eq!(harness.lines.len(), 1);
        assert_eq!(harness.lines[0].quantity.get(), 3);

        harness.run("line update O000000001 P000000001 5", 2).await;
        assert_eq!(
            harness.status.as_ref().map(|s| s.text.as_str()),
            Some("Quantity updated successfully.")
        );
        assert_eq!(harness.lines[0].quantity.get(), 5);
    }

    #[tokio::test]
    async fn get_missing_line_says_so() {
        let mut harness = seeded().await;
        harness.run("quantity get O000000001 P000000001", 1).await;
        assert_eq!(
            harness.status.as_ref().map(|s| s.text.as_str()),
            Some("Order O000000001 has no line for product P000000001")
        );
    }
}
