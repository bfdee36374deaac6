use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::warn;

use crate::error::SourceError;

/// Daily USD prices keyed by calendar date, ascending.
pub type PriceSeries = BTreeMap<NaiveDate, f64>;

#[async_trait]
pub trait PriceDataSource: Sync + Send {
    fn name(&self) -> &str;

    async fn fetch(&self, range: &DateRange) -> Result<PriceSeries, SourceError>;
}

/// The window a refresh asks every source for: the last `days` days up to `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub days: u32,
}

impl DateRange {
    pub fn ending_at(end: DateTime<Utc>, days: u32) -> DateRange {
        DateRange {
            start: end - Duration::days(i64::from(days)),
            end,
            days,
        }
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn from_unix(&self) -> i64 {
        self.start.timestamp()
    }

    pub fn to_unix(&self) -> i64 {
        self.end.timestamp()
    }
}

/// Inserts `price` unless it would break the positive-price invariant.
/// Returns false when the observation was dropped.
pub(crate) fn insert_price(series: &mut PriceSeries, source: &str, date: NaiveDate, price: f64) -> bool {
    if !price.is_finite() || price <= 0. {
        warn!("{}: dropping non-positive price {} for {}", source, price, date);
        return false;
    }
    series.insert(date, price);
    true
}
