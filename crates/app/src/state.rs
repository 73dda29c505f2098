//! UI state owned by the single UI loop. Background tasks never touch it
//! directly; they hand continuations to the loop instead.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use order_desk_core::dashboard::{
    Kpis, ProductRevenue, RevenueBucket, RevenuePeriod, DEFAULT_TOP_PRODUCTS,
};
use order_desk_core::{Customer, Order, OrderLine, OrderSummary, Product};
use order_desk_storage::{CallError, ConnectionFault, ExportFile, MutationOutcome, SearchResults};

/// Screens of the desk. Navigating away from a screen invalidates its
/// in-flight tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Customers,
    Products,
    Orders,
    Quantities,
    Dashboard,
    Search,
    Export,
}

impl Screen {
    pub const ALL: [Screen; 7] = [
        Self::Customers,
        Self::Products,
        Self::Orders,
        Self::Quantities,
        Self::Dashboard,
        Self::Search,
        Self::Export,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customers => "customers",
            Self::Products => "products",
            Self::Orders => "orders",
            Self::Quantities => "quantities",
            Self::Dashboard => "dashboard",
            Self::Search => "search",
            Self::Export => "export",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Customers => "Customers",
            Self::Products => "Products",
            Self::Orders => "Orders",
            Self::Quantities => "Order Lines",
            Self::Dashboard => "Dashboard",
            Self::Search => "Search & Filter",
            Self::Export => "Export",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown screen '{0}'")]
pub struct UnknownScreen(pub String);

impl FromStr for Screen {
    type Err = UnknownScreen;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|screen| screen.as_str() == wanted)
            .ok_or(UnknownScreen(wanted))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Affirmative,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub tone: Tone,
    pub text: String,
}

/// Records fetched by a single `get` on one of the entity screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Found {
    Customers(Vec<Customer>),
    Products(Vec<Product>),
    Orders(Vec<Order>),
    Lines(Vec<OrderLine>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub kpis: Option<Kpis>,
    pub period: RevenuePeriod,
    pub top_limit: u32,
    pub revenue: Vec<RevenueBucket>,
    pub top_products: Vec<ProductRevenue>,
}

impl Default for DashboardView {
    fn default() -> Self {
        Self {
            kpis: None,
            period: RevenuePeriod::default(),
            top_limit: DEFAULT_TOP_PRODUCTS,
            revenue: Vec::new(),
            top_products: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchView {
    pub term: Option<String>,
    pub results: Option<SearchResults>,
    pub filtered: Option<Vec<OrderSummary>>,
}

#[derive(Debug, Clone)]
pub struct UiState {
    pub screen: Screen,
    pub status: Option<StatusLine>,
    pub customers: Vec<Customer>,
    pub products: Vec<Product>,
    pub orders: Vec<Order>,
    pub lines: Vec<OrderLine>,
    pub found: Option<Found>,
    pub dashboard: DashboardView,
    pub search: SearchView,
    pub exports: Vec<ExportFile>,
    /// Set by a committed mutation; the loop reloads the current screen's list.
    pub needs_refresh: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            screen: Screen::Dashboard,
            status: None,
            customers: Vec::new(),
            products: Vec::new(),
            orders: Vec::new(),
            lines: Vec::new(),
            found: None,
            dashboard: DashboardView::default(),
            search: SearchView::default(),
            exports: Vec::new(),
            needs_refresh: false,
        }
    }
}

impl UiState {
    pub fn affirm(&mut self, text: impl Into<String>) {
        self.status = Some(StatusLine {
            tone: Tone::Affirmative,
            text: text.into(),
        });
    }

    pub fn reject(&mut self, text: impl Into<String>) {
        self.status = Some(StatusLine {
            tone: Tone::Negative,
            text: text.into(),
        });
    }

    /// Applies the result of a mutating procedure.
    pub fn record_mutation(&mut self, result: Result<MutationOutcome, CallError>) {
        match result {
            Ok(outcome) => {
                self.affirm(outcome.message);
                self.needs_refresh = true;
            }
            Err(err) => self.reject(err.user_message()),
        }
    }

    /// Applies a list result. A connection fault keeps the previous rows.
    pub fn record_list<T>(
        &mut self,
        target: fn(&mut UiState) -> &mut Vec<T>,
        result: Result<Vec<T>, ConnectionFault>,
    ) {
        match result {
            Ok(rows) => *target(self) = rows,
            Err(fault) => self.reject(fault.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_desk_storage::{Procedure, RemoteFault};

    #[test]
    fn screens_parse_by_name() {
        for screen in Screen::ALL {
            assert_eq!(screen.as_str().parse::<Screen>(), Ok(screen));
        }
        assert!("settings".parse::<Screen>().is_err());
    }

    #[test]
    fn committed_mutation_affirms_and_requests_refresh() {
        let mut state = UiState::default();
        state.record_mutation(Ok(MutationOutcome {
            procedure: Procedure::CreateCustomer,
            message: "Customer created successfully.".into(),
        }));
        assert_eq!(
            state.status,
            Some(StatusLine {
                tone: Tone::Affirmative,
                text: "Customer created successfully.".into()
            })
        );
        assert!(state.needs_refresh);
    }

    #[test]
    fn remote_fault_shows_its_message() {
        let mut state = UiState::default();
        state.record_mutation(Err(CallError::Remote(RemoteFault {
            operation: "CreateCustomer",
            message: "Customer C000000001 already exists".into(),
        })));
        let status = state.status.expect("status");
        assert_eq!(status.tone, Tone::Negative);
        assert_eq!(status.text, "Customer C000000001 already exists");
        assert!(!state.needs_refresh);
    }
}
