//! Text rendering of the current screen.

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use order_desk_storage::{ExportDataset, SearchResults};

use crate::state::{Found, Screen, StatusLine, Tone, UiState};
use crate::theme::Theme;

/// Renders the status line and the current screen.
pub fn render_screen(state: &UiState, theme: &Theme) -> String {
    let mut out = String::new();
    out.push_str(&heading(state.screen.title(), theme));
    out.push('\n');

    if let Some(status) = &state.status {
        out.push_str(&status_line(status, theme));
        out.push('\n');
    }

    if let Some(found) = &state.found {
        out.push_str(&section("Lookup", theme));
        out.push_str(&found_table(found, theme));
    }

    match state.screen {
        Screen::Customers => out.push_str(&list(
            theme,
            ["ID", "Name"],
            state.customers.iter().map(|c| vec![c.id.to_string(), c.name.clone()]),
        )),
        Screen::Products => out.push_str(&list(
            theme,
            ["ID", "Name", "Price"],
            state
                .products
                .iter()
                .map(|p| vec![p.id.to_string(), p.name.clone(), p.price.to_string()]),
        )),
        Screen::Orders => out.push_str(&list(
            theme,
            ["ID", "Customer", "Date", "Status"],
            state.orders.iter().map(|o| {
                vec![
                    o.id.to_string(),
                    o.customer_id.to_string(),
                    o.date.to_string(),
                    o.status.to_string(),
                ]
            }),
        )),
        Screen::Quantities => out.push_str(&list(
            theme,
            ["Order", "Product", "Quantity"],
            state.lines.iter().map(|l| {
                vec![
                    l.order_id.to_string(),
                    l.product_id.to_string(),
                    l.quantity.to_string(),
                ]
            }),
        )),
        Screen::Dashboard => out.push_str(&dashboard(state, theme)),
        Screen::Search => out.push_str(&search(state, theme)),
        Screen::Export => out.push_str(&exports(state, theme)),
    }

    out
}

pub fn status_line(status: &StatusLine, theme: &Theme) -> String {
    match status.tone {
        Tone::Affirmative => format!("{} {}", theme.affirmative_glyph, status.text)
            .color(theme.affirmative)
            .to_string(),
        Tone::Negative => format!("{} {}", theme.negative_glyph, status.text)
            .color(theme.negative)
            .to_string(),
    }
}

fn heading(title: &str, theme: &Theme) -> String {
    format!("== {title} ==").color(theme.heading).bold().to_string()
}

fn section(title: &str, theme: &Theme) -> String {
    format!("{}\n", title.color(theme.heading))
}

fn table<const N: usize>(theme: &Theme, header: [&str; N]) -> Table {
    let mut table = Table::new();
    table.load_preset(theme.table_preset);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header.to_vec());
    table
}

fn list<const N: usize>(
    theme: &Theme,
    header: [&str; N],
    rows: impl Iterator<Item = Vec<String>>,
) -> String {
    let mut rendered = table(theme, header);
    let mut empty = true;
    for row in rows {
        rendered.add_row(row);
        empty = false;
    }
    if empty {
        return format!("{}\n", "No records".color(theme.muted));
    }
    format!("{rendered}\n")
}

fn found_table(found: &Found, theme: &Theme) -> String {
    match found {
        Found::Customers(rows) => list(
            theme,
            ["ID", "Name"],
            rows.iter().map(|c| vec![c.id.to_string(), c.name.clone()]),
        ),
        Found::Products(rows) => list(
            theme,
            ["ID", "Name", "Price"],
            rows.iter()
                .map(|p| vec![p.id.to_string(), p.name.clone(), p.price.to_string()]),
        ),
        Found::Orders(rows) => list(
            theme,
            ["ID", "Customer", "Date", "Status"],
            rows.iter().map(|o| {
                vec![
                    o.id.to_string(),
                    o.customer_id.to_string(),
                    o.date.to_string(),
                    o.status.to_string(),
                ]
            }),
        ),
        Found::Lines(rows) => list(
            theme,
            ["Order", "Product", "Quantity"],
            rows.iter().map(|l| {
                vec![
                    l.order_id.to_string(),
                    l.product_id.to_string(),
                    l.quantity.to_string(),
                ]
            }),
        ),
    }
}

fn dashboard(state: &UiState, theme: &Theme) -> String {
    let view = &state.dashboard;
    let mut out = String::new();

    out.push_str(&section("Key figures", theme));
    match &view.kpis {
        Some(kpis) => {
            let mut figures = table(theme, ["Metric", "Value"]);
            figures.add_row(vec!["Customers".to_string(), kpis.total_customers.to_string()]);
            figures.add_row(vec!["Products".to_string(), kpis.total_products.to_string()]);
            for entry in &kpis.orders_by_status {
                figures.add_row(vec![format!("{} orders", entry.status), entry.count.to_string()]);
            }
            figures.add_row(vec![
                "Revenue to date".to_string(),
                kpis.revenue_to_date.to_string(),
            ]);
            out.push_str(&format!("{figures}\n"));
        }
        None => out.push_str(&format!("{}\n", "Loading…".color(theme.muted))),
    }

    out.push_str(&section(&format!("Revenue by {}", view.period), theme));
    out.push_str(&list(
        theme,
        ["Period", "Revenue"],
        view.revenue
            .iter()
            .map(|bucket| vec![bucket.period_key.clone(), bucket.revenue.to_string()]),
    ));

    out.push_str(&section("Top products", theme));
    out.push_str(&list(
        theme,
        ["#", "ID", "Name", "Revenue"],
        view.top_products.iter().enumerate().map(|(rank, row)| {
            vec![
                (rank + 1).to_string(),
                row.product_id.to_string(),
                row.product_name.clone(),
                row.revenue.to_string(),
            ]
        }),
    ));
    out
}

fn search(state: &UiState, theme: &Theme) -> String {
    let view = &state.search;
    let mut out = String::new();

    if let Some(results) = &view.results {
        let term = view.term.as_deref().unwrap_or_default();
        out.push_str(&section(&format!("Results for \"{term}\""), theme));
        out.push_str(&search_results(results, theme));
    }

    if let Some(rows) = &view.filtered {
        out.push_str(&section("Filtered orders", theme));
        out.push_str(&list(
            theme,
            ["Order", "Customer", "Date", "Status", "Total"],
            rows.iter().map(|row| {
                vec![
                    row.order_id.to_string(),
                    row.customer_name.clone(),
                    row.order_date.to_string(),
                    row.status.to_string(),
                    row.total_amount.to_string(),
                ]
            }),
        ));
    }

    if out.is_empty() {
        out.push_str(&format!(
            "{}\n",
            "Use `search <term>` or `filter --status --from --to --min --max`.".color(theme.muted)
        ));
    }
    out
}

fn search_results(results: &SearchResults, theme: &Theme) -> String {
    let mut out = String::new();
    out.push_str(&section("Customers", theme));
    out.push_str(&list(
        theme,
        ["ID", "Name"],
        results
            .customers
            .iter()
            .map(|c| vec![c.id.to_string(), c.name.clone()]),
    ));
    out.push_str(&section("Products", theme));
    out.push_str(&list(
        theme,
        ["ID", "Name", "Price"],
        results
            .products
            .iter()
            .map(|p| vec![p.id.to_string(), p.name.clone(), p.price.to_string()]),
    ));
    out.push_str(&section("Orders", theme));
    out.push_str(&list(
        theme,
        ["ID", "Customer", "Date", "Status"],
        results.orders.iter().map(|o| {
            vec![
                o.order_id.to_string(),
                o.customer_name.clone(),
                o.order_date.to_string(),
                o.status.to_string(),
            ]
        }),
    ));
    for failure in &results.failures {
        out.push_str(&format!(
            "{}\n",
            format!(
                "{} {} search failed: {}",
                theme.negative_glyph, failure.scope, failure.message
            )
            .color(theme.negative)
        ));
    }
    out
}

fn exports(state: &UiState, theme: &Theme) -> String {
    let mut out = String::new();
    let datasets: Vec<&str> = ExportDataset::ALL.iter().map(|d| d.name()).collect();
    out.push_str(&format!(
        "{}\n",
        format!("Datasets: {}", datasets.join(", ")).color(theme.muted)
    ));
    out.push_str(&list(
        theme,
        ["File", "Size", "Modified"],
        state.exports.iter().map(|file| {
            vec![
                file.name.clone(),
                format!("{} B", file.size),
                file.modified.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        }),
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_desk_core::dashboard::{Kpis, RevenueBucket, StatusCount};
    use order_desk_core::{Customer, CustomerId, Money, OrderStatus};
    use order_desk_storage::{SearchFailure, SearchScope};

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn customer_screen_lists_rows_and_status() {
        plain();
        let mut state = UiState {
            screen: Screen::Customers,
            ..UiState::default()
        };
        state.customers.push(Customer {
            id: CustomerId::parse("C000000001").unwrap(),
            name: "Jane Doe".into(),
        });
        state.affirm("Customer created successfully.");

        let text = render_screen(&state, &Theme::standard());
        assert!(text.contains("== Customers =="));
        assert!(text.contains("✔ Customer created successfully."));
        assert!(text.contains("C000000001"));
        assert!(text.contains("Jane Doe"));
    }

    #[test]
    fn empty_list_says_so() {
        plain();
        let state = UiState {
            screen: Screen::Products,
            ..UiState::default()
        };
        assert!(render_screen(&state, &Theme::standard()).contains("No records"));
    }

    #[test]
    fn dashboard_shows_kpis_and_buckets() {
        plain();
        let mut state = UiState::default();
        state.dashboard.kpis = Some(Kpis {
            total_customers: 3,
            total_products: 2,
            orders_by_status: vec![StatusCount {
                status: OrderStatus::Delivered,
                count: 4,
            }],
            revenue_to_date: Money::from_cents(12345),
        });
        state.dashboard.revenue.push(RevenueBucket {
            period_key: "2024-03-05".into(),
            revenue: Money::from_cents(2000),
        });

        let text = render_screen(&state, &Theme::standard());
        assert!(text.contains("Delivered orders"));
        assert!(text.contains("123.45"));
        assert!(text.contains("Revenue by day"));
        assert!(text.contains("2024-03-05"));
        assert!(text.contains("20.00"));
    }

    #[test]
    fn search_failures_render_as_error_rows() {
        plain();
        let mut state = UiState {
            screen: Screen::Search,
            ..UiState::default()
        };
        state.search.term = Some("Jane".into());
        state.search.results = Some(SearchResults {
            failures: vec![SearchFailure {
                scope: SearchScope::Products,
                message: "no such table: products".into(),
            }],
            ..SearchResults::default()
        });

        let text = render_screen(&state, &Theme::standard());
        assert!(text.contains("Results for \"Jane\""));
        assert!(text.contains("✘ products search failed: no such table: products"));
    }
}
