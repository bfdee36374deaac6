use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use log::info;
use reqwest::Client;
use serde_json::Value as JsonValue;

use super::datasource::{insert_price, DateRange, PriceDataSource, PriceSeries};
use crate::error::SourceError;

const COINGECKO_SOURCE: &str = "CoinGecko";
const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

pub struct CoingeckoDataSource {
    client: Arc<Client>,
    base_url: String,
    coin: String,
}

impl CoingeckoDataSource {
    pub fn new(client: Arc<Client>, coin: String) -> CoingeckoDataSource {
        CoingeckoDataSource {
            client,
            base_url: COINGECKO_API_URL.to_owned(),
            coin,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, base_url: String) -> CoingeckoDataSource {
        self.base_url = base_url;
        self
    }

    async fn run_query(&self, range: &DateRange) -> Result<JsonValue, SourceError> {
        let resp_payload = self
            .client
            .get(&format!(
                "{}/coins/{}/market_chart/range",
                self.base_url, &self.coin
            ))
            .query(&[
                ("vs_currency", "usd".to_owned()),
                ("from", range.from_unix().to_string()),
                ("to", range.to_unix().to_string()),
            ])
            .send()
            .await?;
        info!("CoinGecko response code: {}", resp_payload.status());
        if !resp_payload.status().is_success() {
            return Err(SourceError::Upstream {
                status: resp_payload.status().as_u16(),
            });
        }
        Ok(resp_payload.json().await?)
    }
}

#[async_trait]
impl PriceDataSource for CoingeckoDataSource {
    fn name(&self) -> &str {
        COINGECKO_SOURCE
    }

    async fn fetch(&self, range: &DateRange) -> Result<PriceSeries, SourceError> {
        let response = self.run_query(range).await?;
        parse_market_chart(&response)
    }
}

/// Buckets `{"prices": [[millis, price], ...]}` into UTC calendar days.
///
/// The API returns several intraday samples per day for short ranges. The
/// first sample seen for a date wins and later ones are ignored, so the
/// stored value is the earliest observation of that day. Historical ratios
/// depend on this choice; do not switch to last-value or averaging.
///
/// A date is claimed by its first sample even when that sample's price is
/// dropped as non-positive; the day is then missing rather than filled from
/// a later sample.
pub(crate) fn parse_market_chart(response: &JsonValue) -> Result<PriceSeries, SourceError> {
    let samples = response["prices"]
        .as_array()
        .ok_or_else(|| SourceError::Malformed("CoinGecko response without 'prices'".to_owned()))?;
    let mut prices = PriceSeries::new();
    let mut seen = BTreeSet::new();
    for sample in samples {
        let millis = sample[0]
            .as_i64()
            .or_else(|| sample[0].as_f64().map(|f| f as i64));
        let (millis, price) = match (millis, sample[1].as_f64()) {
            (Some(millis), Some(price)) => (millis, price),
            _ => {
                return Err(SourceError::Malformed(format!(
                    "CoinGecko sample is not [timestamp, price]: {}",
                    sample
                )))
            }
        };
        let date = DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| SourceError::Malformed(format!("CoinGecko timestamp out of range: {}", millis)))?
            .date_naive();
        if !seen.insert(date) {
            continue;
        }
        insert_price(&mut prices, COINGECKO_SOURCE, date, price);
    }
    if prices.is_empty() {
        return Err(SourceError::Empty);
    }
    Ok(prices)
}
