use order_desk_core::input::required;
use order_desk_core::{Customer, CustomerId, InputError};

use super::{show_found, Desk};
use crate::command::CustomerAction;
use crate::dispatch::{Slot, TaskKey};
use crate::state::{Found, Screen, UiState};

const LIST: TaskKey = TaskKey::new(Screen::Customers, Slot::List);
const LOOKUP: TaskKey = TaskKey::new(Screen::Customers, Slot::Lookup);
const MUTATION: TaskKey = TaskKey::new(Screen::Customers, Slot::Mutation);

pub(super) fn handle(desk: &Desk, state: &mut UiState, action: CustomerAction) {
    desk.navigate(state, Screen::Customers);
    if let Err(err) = dispatch(desk, action) {
        state.reject(err.to_string());
    }
}

pub(super) fn load(desk: &Desk) {
    let repo = desk.db().customers();
    desk.submit(LIST, async move { repo.list().await }, |state: &mut UiState, result| {
        state.record_list(|s| &mut s.customers, result)
    });
}

fn dispatch(desk: &Desk, action: CustomerAction) -> Result<(), InputError> {
    let repo = desk.db().customers();
    match action {
        CustomerAction::Create { id, name } => {
            let customer = customer(&id, &name)?;
            desk.submit_committed(
                MUTATION,
                async move { repo.create(&customer).await },
                UiState::record_mutation,
            );
        }
        CustomerAction::Update { id, name } => {
            let customer = customer(&id, &name)?;
            desk.submit_committed(
                MUTATION,
                async move { repo.update(&customer).await },
                UiState::record_mutation,
            );
        }
        CustomerAction::Delete { id } => {
            let id = CustomerId::parse(&id)?;
            desk.submit_committed(
                MUTATION,
                async move { repo.delete(&id).await },
                UiState::record_mutation,
            );
        }
        CustomerAction::Get { id } => {
            let id = CustomerId::parse(&id)?;
            let missing = format!("No customer found with ID {id}");
            desk.submit(
                LOOKUP,
                async move { repo.get(&id).await },
                move |state: &mut UiState, result| {
                    show_found(state, result, Found::Customers, &missing)
                },
            );
        }
        CustomerAction::List => load(desk),
    }
    Ok(())
}

fn customer(id: &str, name: &str) -> Result<Customer, InputError> {
    Ok(Customer {
        id: CustomerId::parse(id)?,
        name: required("Customer name", name)?.to_string(),
    })
}
