use order_desk_core::input::{parse_date, parse_status};
use order_desk_core::{CustomerId, InputError, Order, OrderId};

use super::{show_found, Desk};
use crate::command::OrderAction;
use crate::dispatch::{Slot, TaskKey};
use crate::state::{Found, Screen, UiState};

const LIST: TaskKey = TaskKey::new(Screen::Orders, Slot::List);
const LOOKUP: TaskKey = TaskKey::new(Screen::Orders, Slot::Lookup);
const MUTATION: TaskKey = TaskKey::new(Screen::Orders, Slot::Mutation);

pub(super) fn handle(desk: &Desk, state: &mut UiState, action: OrderAction) {
    desk.navigate(state, Screen::Orders);
    if let Err(err) = dispatch(desk, action) {
        state.reject(err.to_string());
    }
}

pub(super) fn load(desk: &Desk) {
    let repo = desk.db().orders();
    desk.submit(LIST, async move { repo.list().await }, |state: &mut UiState, result| {
        state.record_list(|s| &mut s.orders, result)
    });
}

fn dispatch(desk: &Desk, action: OrderAction) -> Result<(), InputError> {
    let repo = desk.db().orders();
    match action {
        OrderAction::Create {
            id,
            customer,
            date,
            status,
        } => {
            let order = order(&id, &customer, &date, &status)?;
            desk.submit_committed(
                MUTATION,
                async move { repo.create(&order).await },
                UiState::record_mutation,
            );
        }
        OrderAction::Update {
            id,
            customer,
            date,
            status,
        } => {
            let order = order(&id, &customer, &date, &status)?;
            desk.submit_committed(
                MUTATION,
                async move { repo.update(&order).await },
                UiState::record_mutation,
            );
        }
        OrderAction::Delete { id } => {
            let id = OrderId::parse(&id)?;
            desk.submit_committed(
                MUTATION,
                async move { repo.delete(&id).await },
                UiState::record_mutation,
            );
        }
        OrderAction::Get { id } => {
            let id = OrderId::parse(&id)?;
            let missing = format!("No order found with ID {id}");
            desk.submit(
                LOOKUP,
                async move { repo.get(&id).await },
                move |state: &mut UiState, result| {
                    show_found(state, result, Found::Orders, &missing)
                },
            );
        }
        OrderAction::List => load(desk),
    }
    Ok(())
}

fn order(id: &str, customer: &str, date: &str, status: &str) -> Result<Order, InputError> {
    Ok(Order {
        id: OrderId::parse(id)?,
        customer_id: CustomerId::parse(customer)?,
        date: parse_date("Order date", date)?,
        status: parse_status(status)?,
    })
}
