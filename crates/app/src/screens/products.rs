use order_desk_core::input::{parse_amount, required};
use order_desk_core::{InputError, Product, ProductId};

use super::{show_found, Desk};
use crate::command::ProductAction;
use crate::dispatch::{Slot, TaskKey};
use crate::state::{Found, Screen, UiState};

const LIST: TaskKey = TaskKey::new(Screen::Products, Slot::List);
const LOOKUP: TaskKey = TaskKey::new(Screen::Products, Slot::Lookup);
const MUTATION: TaskKey = TaskKey::new(Screen::Products, Slot::Mutation);

pub(super) fn handle(desk: &Desk, state: &mut UiState, action: ProductAction) {
    desk.navigate(state, Screen::Products);
    if let Err(err) = dispatch(desk, action) {
        state.reject(err.to_string());
    }
}

pub(super) fn load(desk: &Desk) {
    let repo = desk.db().products();
    desk.submit(LIST, async move { repo.list().await }, |state: &mut UiState, result| {
        state.record_list(|s| &mut s.products, result)
    });
}

fn dispatch(desk: &Desk, action: ProductAction) -> Result<(), InputError> {
    let repo = desk.db().products();
    match action {
        ProductAction::Create { id, name, price } => {
            let product = product(&id, &name, &price)?;
            desk.submit_committed(
                MUTATION,
                async move { repo.create(&product).await },
                UiState::record_mutation,
            );
        }
        ProductAction::Update { id, name, price } => {
            let product = product(&id, &name, &price)?;
            desk.submit_committed(
                MUTATION,
                async move { repo.update(&product).await },
                UiState::record_mutation,
            );
        }
        ProductAction::Delete { id } => {
            let id = ProductId::parse(&id)?;
            desk.submit_committed(
                MUTATION,
                async move { repo.delete(&id).await },
                UiState::record_mutation,
            );
        }
        ProductAction::Get { id } => {
            let id = ProductId::parse(&id)?;
            let missing = format!("No product found with ID {id}");
            desk.submit(
                LOOKUP,
                async move { repo.get(&id).await },
                move |state: &mut UiState, result| {
                    show_found(state, result, Found::Products, &missing)
                },
            );
        }
        ProductAction::List => load(desk),
    }
    Ok(())
}

fn product(id: &str, name: &str, price: &str) -> Result<Product, InputError> {
    Ok(Product {
        id: ProductId::parse(id)?,
        name: required("Product name", name)?.to_string(),
        price: parse_amount("Price", price)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::screens::test_support::Harness;
    use crate::state::Tone;

    #[tokio::test]
    async fn create_lists_price_in_cents() {
        let mut harness = Harness::new().await;
        harness
            .run(r#"product create P000000001 "Desk Lamp" 19.99"#, 2)
            .await;

        assert_eq!(harness.products.len(), 1);
        assert_eq!(harness.products[0].price.cents(), 1999);
        assert_eq!(
            harness.status.as_ref().map(|s| s.text.as_str()),
            Some("Product created successfully.")
        );
    }

    #[tokio::test]
    async fn negative_price_is_rejected_locally() {
        let mut harness = Harness::new().await;
        harness.run("product create P000000001 Lamp -5", 0).await;

        let status = harness.status.clone().expect("status");
        assert_eq!(status.tone, Tone::Negative);
        assert_eq!(status.text, "Price cannot be negative");
        harness.assert_quiet().await;
    }

    #[tokio::test]
    async fn delete_of_missing_product_is_a_remote_fault() {
        let mut harness = Harness::new().await;
        harness.run("product delete P000000009", 1).await;

        let status = harness.status.clone().expect("status");
        assert_eq!(status.tone, Tone::Negative);
        assert_eq!(status.text, "Product P000000009 does not exist");
    }
}
