//! Parsing of the desk's input lines.

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use order_desk_core::dashboard::DEFAULT_TOP_PRODUCTS;

/// One input line. Parsed without a binary name.
#[derive(Debug, Parser)]
#[command(
    name = "desk",
    no_binary_name = true,
    disable_version_flag = true,
    about = "Order desk commands"
)]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Manage customers
    #[command(subcommand)]
    Customer(CustomerAction),
    /// Manage products
    #[command(subcommand)]
    Product(ProductAction),
    /// Manage orders
    #[command(subcommand)]
    Order(OrderAction),
    /// Manage order lines
    #[command(subcommand, alias = "line")]
    Quantity(QuantityAction),
    /// Show KPIs, revenue and top products
    Dashboard {
        /// Revenue bucket size: day, week or month
        #[arg(long, default_value = "day")]
        period: String,
        /// Number of top products to show
        #[arg(long, default_value_t = DEFAULT_TOP_PRODUCTS)]
        top: u32,
    },
    /// Search customers, products and orders
    Search {
        #[arg(required = true, num_args = 1..)]
        term: Vec<String>,
    },
    /// Filter orders by status, date range and total
    Filter(FilterArgs),
    /// Export a dataset to CSV, or `export list` to show written files
    Export { target: String },
    /// Print the metrics exposition
    Metrics,
    /// Leave the desk
    #[command(alias = "exit")]
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum CustomerAction {
    Create { id: String, name: String },
    Get { id: String },
    Update { id: String, name: String },
    Delete { id: String },
    List,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ProductAction {
    Create {
        id: String,
        name: String,
        #[arg(allow_hyphen_values = true)]
        price: String,
    },
    Get {
        id: String,
    },
    Update {
        id: String,
        name: String,
        #[arg(allow_hyphen_values = true)]
        price: String,
    },
    Delete {
        id: String,
    },
    List,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum OrderAction {
    Create {
        id: String,
        customer: String,
        date: String,
        #[arg(default_value = "Pending")]
        status: String,
    },
    Get {
        id: String,
    },
    Update {
        id: String,
        customer: String,
        date: String,
        status: String,
    },
    Delete {
        id: String,
    },
    List,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum QuantityAction {
    Create {
        order: String,
        product: String,
        #[arg(allow_hyphen_values = true)]
        quantity: String,
    },
    Get {
        order: String,
        product: String,
    },
    Update {
        order: String,
        product: String,
        #[arg(allow_hyphen_values = true)]
        quantity: String,
    },
    Delete {
        order: String,
        product: String,
    },
    List,
}

/// Raw filter criteria; validated by the search screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct FilterArgs {
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub from: Option<String>,
    #[arg(long)]
    pub to: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    pub min: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    pub max: Option<String>,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unterminated quote in input")]
    UnterminatedQuote,
    #[error("{0}")]
    Usage(#[from] clap::Error),
}

impl CommandError {
    /// Help and similar requests are answers, not failures.
    pub fn is_help(&self) -> bool {
        matches!(
            self,
            Self::Usage(err) if matches!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelp
                    | clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            )
        )
    }
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>, CommandError> {
    let words = split_words(line)?;
    if words.is_empty() {
        return Ok(None);
    }
    let parsed = CommandLine::try_parse_from(words)?;
    Ok(Some(parsed.command))
}

/// Splits on whitespace, keeping single- or double-quoted runs together.
/// A quote opens a run only at the start of a word, so apostrophes inside
/// words are kept as text.
pub fn split_words(line: &str) -> Result<Vec<String>, CommandError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => current.push(ch),
            None if !in_word && (ch == '"' || ch == '\'') => {
                quote = Some(ch);
                in_word = true;
            }
            None if ch.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(ch);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err(CommandError::UnterminatedQuote);
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}
