//! Screen controllers. Each validates its input, then hands exactly one data
//! access call to the dispatcher together with the continuation that renders
//! its result.

mod customers;
mod dashboard;
mod export;
mod orders;
mod products;
mod quantities;
mod search;

use std::future::Future;

use metrics_exporter_prometheus::PrometheusHandle;
use tracing::debug;

use order_desk_storage::{CallError, Database, Exporter};

use crate::command::{parse_line, Command};
use crate::dispatch::{Dispatcher, TaskKey, Ticket};
use crate::state::{Found, Screen, UiState};
use crate::telemetry::render_metrics;

/// What the loop should do after a line was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Redraw the current screen.
    Render,
    /// Print text verbatim, e.g. help or metrics.
    Print(String),
    /// Nothing to do.
    Idle,
    Quit,
}

/// Owns the handles every screen needs.
pub struct Desk {
    db: Database,
    exporter: Exporter,
    dispatcher: Dispatcher<UiState>,
    metrics: Option<PrometheusHandle>,
}

impl Desk {
    pub fn new(
        db: Database,
        exporter: Exporter,
        dispatcher: Dispatcher<UiState>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            db,
            exporter,
            dispatcher,
            metrics,
        }
    }

    pub fn handle_line(&self, state: &mut UiState, line: &str) -> Reply {
        match parse_line(line) {
            Ok(Some(command)) => self.execute(state, command),
            Ok(None) => Reply::Idle,
            Err(err) if err.is_help() => Reply::Print(err.to_string()),
            Err(err) => {
                debug!(stage = "ui", error = %err, "unparsable input");
                Reply::Print(err.to_string())
            }
        }
    }

    pub fn execute(&self, state: &mut UiState, command: Command) -> Reply {
        state.status = None;
        match command {
            Command::Customer(action) => customers::handle(self, state, action),
            Command::Product(action) => products::handle(self, state, action),
            Command::Order(action) => orders::handle(self, state, action),
            Command::Quantity(action) => quantities::handle(self, state, action),
            Command::Dashboard { period, top } => dashboard::handle(self, state, &period, top),
            Command::Search { term } => search::handle_search(self, state, &term.join(" ")),
            Command::Filter(args) => search::handle_filter(self, state, args),
            Command::Export { target } => export::handle(self, state, &target),
            Command::Metrics => {
                return match &self.metrics {
                    Some(handle) => Reply::Print(render_metrics(handle)),
                    None => {
                        state.reject("Metrics recorder is not installed");
                        Reply::Render
                    }
                };
            }
            Command::Quit => return Reply::Quit,
        }
        Reply::Render
    }

    /// Called by the loop after a continuation was applied.
    pub fn follow_up(&self, state: &mut UiState) {
        if std::mem::take(&mut state.needs_refresh) {
            self.refresh(state);
        }
    }

    /// Reloads the data shown by the current screen.
    pub fn refresh(&self, state: &UiState) {
        match state.screen {
            Screen::Customers => customers::load(self),
            Screen::Products => products::load(self),
            Screen::Orders => orders::load(self),
            Screen::Quantities => quantities::load(self),
            Screen::Dashboard => {
                dashboard::load(self, state.dashboard.period, state.dashboard.top_limit)
            }
            Screen::Export => export::load(self),
            Screen::Search => {}
        }
    }

    /// Switches screens. Tasks still running for the old screen become
    /// irrelevant and their results are dropped.
    fn navigate(&self, state: &mut UiState, screen: Screen) {
        if state.screen != screen {
            self.dispatcher.invalidate_screen(state.screen);
            debug!(stage = "ui", from = state.screen.as_str(), to = screen.as_str(), "navigate");
            state.screen = screen;
        }
        state.found = None;
    }

    fn submit<T, F, R>(&self, key: TaskKey, task: F, render: R) -> Ticket
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        R: FnOnce(&mut UiState, T) + Send + 'static,
    {
        self.dispatcher.submit(key, task, render)
    }

    fn submit_committed<T, F, R>(&self, key: TaskKey, task: F, render: R) -> Ticket
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        R: FnOnce(&mut UiState, T) + Send + 'static,
    {
        self.dispatcher.submit_committed(key, task, render)
    }

    fn db(&self) -> &Database {
        &self.db
    }
}

/// Shows the rows of a `get`, or says nothing matched.
fn show_found<T>(
    state: &mut UiState,
    result: Result<Vec<T>, CallError>,
    wrap: fn(Vec<T>) -> Found,
    missing: &str,
) {
    match result {
        Ok(rows) if rows.is_empty() => state.reject(missing),
        Ok(rows) => state.found = Some(wrap(rows)),
        Err(err) => state.reject(err.user_message()),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::Harness;
    use super::Reply;
    use crate::state::{Screen, Tone};

    #[tokio::test]
    async fn blank_and_help_lines_do_not_dispatch() {
        let mut harness = Harness::new().await;
        assert_eq!(harness.run("   ", 0).await, Reply::Idle);
        assert!(matches!(harness.run("help", 0).await, Reply::Print(text) if text.contains("customer")));
        assert!(matches!(harness.run("customer frob", 0).await, Reply::Print(_)));
        harness.assert_quiet().await;
    }

    #[tokio::test]
    async fn quit_and_missing_metrics() {
        let mut harness = Harness::new().await;
        assert_eq!(harness.run("quit", 0).await, Reply::Quit);
        assert_eq!(harness.run("metrics", 0).await, Reply::Render);
        assert_eq!(
            harness.status.as_ref().map(|s| s.text.as_str()),
            Some("Metrics recorder is not installed")
        );
    }

    #[tokio::test]
    async fn navigating_away_discards_pending_list() {
        let mut harness = Harness::new().await;
        harness.run("customer create C000000001 Jane", 2).await;
        harness.customers.clear();

        let reply = harness.desk.handle_line(&mut harness.state, "customer list");
        assert_eq!(reply, Reply::Render);
        assert_eq!(harness.screen, Screen::Customers);

        // Leave before the list result is applied.
        harness.desk.handle_line(&mut harness.state, "export list");
        assert_eq!(harness.screen, Screen::Export);
        harness.settle(1).await;
        harness.assert_quiet().await;
        assert!(harness.customers.is_empty());
    }

    #[tokio::test]
    async fn back_to_back_creates_both_commit() {
        let mut harness = Harness::new().await;
        harness
            .desk
            .handle_line(&mut harness.state, "customer create C000000001 Alice");
        harness
            .desk
            .handle_line(&mut harness.state, "customer create C000000002 Bob");
        harness.settle_until(|state| state.customers.len() == 2).await;

        let stored = harness.db.customers().list().await.expect("list");
        let ids: Vec<&str> = stored.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["C000000001", "C000000002"]);
        assert_eq!(
            harness.status.as_ref().map(|s| (s.tone, s.text.as_str())),
            Some((Tone::Affirmative, "Customer created successfully."))
        );
    }

    #[tokio::test]
    async fn create_survives_navigating_away() {
        let mut harness = Harness::new().await;
        harness
            .desk
            .handle_line(&mut harness.state, "customer create C000000001 Alice");
        harness.desk.handle_line(&mut harness.state, "export list");
        assert_eq!(harness.screen, Screen::Export);

        harness
            .settle_until(|state| {
                state
                    .status
                    .as_ref()
                    .is_some_and(|s| s.text == "Customer created successfully.")
            })
            .await;

        let stored = harness.db.customers().list().await.expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(harness.screen, Screen::Export);
    }
}
