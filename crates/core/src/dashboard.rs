use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::ProductId;
use crate::types::{Money, OrderStatus};

/// Default number of rows returned by the top products chart.
pub const DEFAULT_TOP_PRODUCTS: u32 = 10;

/// Granularity of the revenue chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevenuePeriod {
    #[default]
    Day,
    Week,
    Month,
}

impl RevenuePeriod {
    /// Number of most recent buckets kept for the period.
    pub fn bucket_limit(self) -> usize {
        match self {
            Self::Day => 30,
            Self::Week | Self::Month => 12,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Key of the bucket the date falls into: `2024-03-05`, `2024-W09` or `2024-03`.
    pub fn bucket_key(self, date: NaiveDate) -> String {
        match self {
            Self::Day => date.format("%Y-%m-%d").to_string(),
            Self::Week => {
                let week = date.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            Self::Month => format!("{}-{:02}", date.year(), date.month()),
        }
    }
}

impl fmt::Display for RevenuePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("period must be one of day, week or month (got '{0}')")]
pub struct UnknownPeriod(pub String);

impl FromStr for RevenuePeriod {
    type Err = UnknownPeriod;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(UnknownPeriod(other.to_string())),
        }
    }
}

/// Delivered revenue for one day, as read from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyRevenue {
    pub day: NaiveDate,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueBucket {
    pub period_key: String,
    pub revenue: Money,
}

/// Folds per-day revenue into period buckets, most recent first, keeping at
/// most [`RevenuePeriod::bucket_limit`] buckets.
pub fn bucket_revenue(days: &[DailyRevenue], period: RevenuePeriod) -> Vec<RevenueBucket> {
    // Keys sort chronologically for every period format.
    let mut buckets: BTreeMap<String, Money> = BTreeMap::new();
    for day in days {
        *buckets.entry(period.bucket_key(day.day)).or_default() += day.revenue;
    }

    buckets
        .into_iter()
        .rev()
        .take(period.bucket_limit())
        .map(|(period_key, revenue)| RevenueBucket {
            period_key,
            revenue,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: u64,
}

/// Headline numbers shown at the top of the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kpis {
    pub total_customers: u64,
    pub total_products: u64,
    pub orders_by_status: Vec<StatusCount>,
    pub revenue_to_date: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRevenue {
    pub product_id: ProductId,
    pub product_name: String,
    pub revenue: Money,
}
