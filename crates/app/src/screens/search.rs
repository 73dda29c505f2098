use order_desk_core::input::{optional, parse_amount, parse_date, parse_status};
use order_desk_core::{InputError, OrderFilter};
use tracing::debug;

use super::Desk;
use crate::command::FilterArgs;
use crate::dispatch::{Slot, TaskKey};
use crate::state::{Screen, UiState};

const RESULTS: TaskKey = TaskKey::new(Screen::Search, Slot::Results);
const FILTERED: TaskKey = TaskKey::new(Screen::Search, Slot::List);

pub(super) fn handle_search(desk: &Desk, state: &mut UiState, term: &str) {
    desk.navigate(state, Screen::Search);
    let term = term.trim().to_string();
    if term.is_empty() {
        // An older search still running must not replace the rejection.
        desk.dispatcher.invalidate(RESULTS);
        return state.reject("Enter a search term");
    }

    state.search.term = Some(term.clone());
    let repo = desk.db().search();
    desk.submit(
        RESULTS,
        async move { repo.global_search(&term).await },
        |state: &mut UiState, results| {
            if let Some(first) = results.failures.first() {
                state.reject(format!("{} search failed: {}", first.scope, first.message));
            } else if results.is_empty() {
                state.reject("No matches found");
            }
            state.search.results = Some(results);
        },
    );
}

pub(super) fn handle_filter(desk: &Desk, state: &mut UiState, args: FilterArgs) {
    desk.navigate(state, Screen::Search);
    let filter = match order_filter(&args) {
        Ok(filter) => filter,
        Err(err) => {
            desk.dispatcher.invalidate(FILTERED);
            return state.reject(err.to_string());
        }
    };

    debug!(stage = "ui", unfiltered = filter.is_empty(), "filter submitted");
    let repo = desk.db().search();
    desk.submit(
        FILTERED,
        async move { repo.filter_orders(&filter).await },
        |state: &mut UiState, result| match result {
            Ok(rows) => state.search.filtered = Some(rows),
            Err(err) => {
                state.search.filtered = Some(Vec::new());
                state.reject(err.user_message());
            }
        },
    );
}

fn order_filter(args: &FilterArgs) -> Result<OrderFilter, InputError> {
    let filter = OrderFilter {
        status: optional(args.status.as_deref())
            .map(parse_status)
            .transpose()?,
        start_date: optional(args.from.as_deref())
            .map(|raw| parse_date("Start date", raw))
            .transpose()?,
        end_date: optional(args.to.as_deref())
            .map(|raw| parse_date("End date", raw))
            .transpose()?,
        min_total: optional(args.min.as_deref())
            .map(|raw| parse_amount("Minimum total", raw))
            .transpose()?,
        max_total: optional(args.max.as_deref())
            .map(|raw| parse_amount("Maximum total", raw))
            .transpose()?,
    };
    filter.check_bounds()?;
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use order_desk_core::OrderStatus;

    use super::*;
    use crate::screens::test_support::Harness;
    use crate::state::Tone;

    async fn seeded() -> Harness {
        let mut harness = Harness::new().await;
        harness
            .run(r#"customer create C000000001 "Jane Doe""#, 2)
            .await;
        harness.run("customer create C000000002 Bob", 2).await;
        harness.run("product create P000000001 Lamp 50.00", 2).await;
        harness
            .run("order create O000000001 C000000001 2024-03-05 Delivered", 2)
            .await;
        harness
            .run("order create O000000002 C000000002 2024-03-06", 2)
            .await;
        harness
            .run("quantity create O000000001 P000000001 3", 2)
            .await;
        harness
            .run("quantity create O000000002 P000000001 1", 2)
            .await;
        harness
    }

    #[test]
    fn blank_criteria_are_unfiltered() {
        let args = FilterArgs {
            status: Some("  ".into()),
            ..FilterArgs::default()
        };
        assert!(order_filter(&args).unwrap().is_empty());
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let args = FilterArgs {
            min: Some("200".into()),
            max: Some("100".into()),
            ..FilterArgs::default()
        };
        assert!(matches!(
            order_filter(&args),
            Err(InputError::InvertedAmounts { .. })
        ));

        let args = FilterArgs {
            from: Some("2024-03-10".into()),
            to: Some("2024-03-01".into()),
            ..FilterArgs::default()
        };
        assert!(matches!(
            order_filter(&args),
            Err(InputError::InvertedDates { .. })
        ));
    }

    #[tokio::test]
    async fn search_finds_customer_and_orders() {
        let mut harness = seeded().await;
        harness.run("search jane", 1).await;

        let results = harness.search.results.as_ref().expect("results");
        assert_eq!(results.customers.len(), 1);
        assert_eq!(results.orders.len(), 1);
        assert_eq!(results.orders[0].order_id.as_str(), "O000000001");
        assert!(results.failures.is_empty());
        assert!(harness.status.is_none());
    }

    #[tokio::test]
    async fn blank_search_is_rejected() {
        let mut harness = Harness::new().await;
        harness.run(r#"search "  ""#, 0).await;
        let status = harness.status.clone().expect("status");
        assert_eq!(status.tone, Tone::Negative);
        assert_eq!(status.text, "Enter a search term");
        harness.assert_quiet().await;
    }

    #[tokio::test]
    async fn filter_by_status_and_total() {
        let mut harness = seeded().await;

        harness.run("filter", 1).await;
        let rows = harness.search.filtered.clone().expect("filtered");
        assert_eq!(rows.len(), 2);

        harness.run("filter --status delivered --min 100", 1).await;
        let rows = harness.search.filtered.clone().expect("filtered");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, OrderStatus::Delivered);
        assert_eq!(rows[0].total_amount.cents(), 15000);
    }
}
