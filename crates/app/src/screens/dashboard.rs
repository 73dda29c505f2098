use order_desk_core::dashboard::RevenuePeriod;

use super::Desk;
use crate::dispatch::{Slot, TaskKey};
use crate::state::{Screen, UiState};

const KPIS: TaskKey = TaskKey::new(Screen::Dashboard, Slot::Kpis);
const REVENUE: TaskKey = TaskKey::new(Screen::Dashboard, Slot::Revenue);
const TOP_PRODUCTS: TaskKey = TaskKey::new(Screen::Dashboard, Slot::TopProducts);

pub(super) fn handle(desk: &Desk, state: &mut UiState, period: &str, top: u32) {
    desk.navigate(state, Screen::Dashboard);
    let period = match period.parse::<RevenuePeriod>() {
        Ok(period) => period,
        Err(err) => return state.reject(err.to_string()),
    };
    if top == 0 {
        return state.reject("Top products count must be at least 1");
    }

    state.dashboard.period = period;
    state.dashboard.top_limit = top;
    load(desk, period, top);
}

/// Submits the three independent dashboard reads.
pub(super) fn load(desk: &Desk, period: RevenuePeriod, top: u32) {
    let repo = desk.db().dashboard();
    desk.submit(KPIS, async move { repo.kpis().await }, |state: &mut UiState, result| {
        match result {
            Ok(kpis) => state.dashboard.kpis = Some(kpis),
            Err(err) => state.reject(err.user_message()),
        }
    });

    let repo = desk.db().dashboard();
    desk.submit(
        REVENUE,
        async move { repo.revenue_by_period(period).await },
        |state: &mut UiState, result| match result {
            Ok(buckets) => state.dashboard.revenue = buckets,
            Err(err) => {
                state.dashboard.revenue.clear();
                state.reject(err.user_message());
            }
        },
    );

    let repo = desk.db().dashboard();
    desk.submit(
        TOP_PRODUCTS,
        async move { repo.top_products(top).await },
        |state: &mut UiState, result| match result {
            Ok(rows) => state.dashboard.top_products = rows,
            Err(err) => {
                state.dashboard.top_products.clear();
                state.reject(err.user_message());
            }
        },
    );
}
