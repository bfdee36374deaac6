use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use log::{info, warn};

use super::datasource::{insert_price, DateRange, PriceDataSource, PriceSeries};
use crate::error::SourceError;

const YFINANCE_SOURCE: &str = "YFinance";

/// Gold proxied through a gold-backed ETF's daily closes scaled by a fixed factor.
/// One GLD share tracks roughly a tenth of an ounce, hence the default factor of 10.
pub struct YahooGoldDataSource {
    connector: Arc<yahoo_finance_api::YahooConnector>,
    ticker: String,
    conversion_factor: f64,
}

impl YahooGoldDataSource {
    pub fn new(
        connector: Arc<yahoo_finance_api::YahooConnector>,
        ticker: String,
        conversion_factor: f64,
    ) -> YahooGoldDataSource {
        YahooGoldDataSource {
            connector,
            ticker,
            conversion_factor,
        }
    }

    async fn run_query(&self, days: u32) -> Result<Vec<(i64, f64)>, SourceError> {
        let quotes = self
            .connector
            .get_quote_range(&self.ticker, "1d", quote_range(days))
            .await?
            .quotes()?;
        info!("Yahoo: {} {} quotes", &self.ticker, quotes.len());
        Ok(quotes
            .into_iter()
            .map(|q| (q.timestamp as i64, q.close))
            .collect())
    }
}

#[async_trait]
impl PriceDataSource for YahooGoldDataSource {
    fn name(&self) -> &str {
        YFINANCE_SOURCE
    }

    async fn fetch(&self, range: &DateRange) -> Result<PriceSeries, SourceError> {
        let closes = self.run_query(range.days).await?;
        let prices = scale_closes(closes, range.start_date(), self.conversion_factor);
        if prices.is_empty() {
            return Err(SourceError::Empty);
        }
        Ok(prices)
    }
}

/// Smallest Yahoo range keyword that spans at least `days` calendar days.
fn quote_range(days: u32) -> &'static str {
    match days {
        0..=5 => "5d",
        6..=28 => "1mo",
        29..=89 => "3mo",
        90..=181 => "6mo",
        182..=365 => "1y",
        366..=730 => "2y",
        731..=1826 => "5y",
        1827..=3652 => "10y",
        _ => "max",
    }
}

/// Keeps closes dated on or after `start`. Days without a quote simply have no entry.
pub(crate) fn scale_closes(
    closes: impl IntoIterator<Item = (i64, f64)>,
    start: NaiveDate,
    conversion_factor: f64,
) -> PriceSeries {
    let mut prices = PriceSeries::new();
    for (timestamp, close) in closes {
        let date = match DateTime::from_timestamp(timestamp, 0) {
            Some(t) => t.date_naive(),
            None => {
                warn!("Yahoo: skipping quote with bad timestamp {}", timestamp);
                continue;
            }
        };
        if date < start {
            continue;
        }
        insert_price(&mut prices, YFINANCE_SOURCE, date, close * conversion_factor);
    }
    prices
}
