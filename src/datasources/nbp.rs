use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::info;
use reqwest::{header::ACCEPT, Client};
use serde_json::Value as JsonValue;

use super::datasource::{insert_price, DateRange, PriceDataSource, PriceSeries};
use crate::error::SourceError;

const NBP_SOURCE: &str = "NBP";
const NBP_API_URL: &str = "https://api.nbp.pl/api";

const GRAMS_PER_TROY_OUNCE: f64 = 31.1034768;

/// Gold fixing published by the National Bank of Poland, quoted in PLN per gram.
pub struct NbpGoldDataSource {
    client: Arc<Client>,
    base_url: String,
    pln_usd_rate: f64,
}

impl NbpGoldDataSource {
    pub fn new(client: Arc<Client>, pln_usd_rate: f64) -> NbpGoldDataSource {
        NbpGoldDataSource {
            client,
            base_url: NBP_API_URL.to_owned(),
            pln_usd_rate,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, base_url: String) -> NbpGoldDataSource {
        self.base_url = base_url;
        self
    }

    async fn run_query(&self, days: u32) -> Result<JsonValue, SourceError> {
        let resp_payload = self
            .client
            .get(&format!("{}/cenyzlota/last/{}", self.base_url, days))
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        info!("NBP response code: {}", resp_payload.status());
        if !resp_payload.status().is_success() {
            return Err(SourceError::Upstream {
                status: resp_payload.status().as_u16(),
            });
        }
        Ok(resp_payload.json().await?)
    }
}

#[async_trait]
impl PriceDataSource for NbpGoldDataSource {
    fn name(&self) -> &str {
        NBP_SOURCE
    }

    async fn fetch(&self, range: &DateRange) -> Result<PriceSeries, SourceError> {
        let response = self.run_query(range.days).await?;
        parse_gold_prices(&response, self.pln_usd_rate)
    }
}

/// Converts `[{"data": "YYYY-MM-DD", "cena": pln_per_gram}, ...]` into USD per troy ounce.
pub(crate) fn parse_gold_prices(
    response: &JsonValue,
    pln_usd_rate: f64,
) -> Result<PriceSeries, SourceError> {
    let items = response
        .as_array()
        .ok_or_else(|| SourceError::Malformed("NBP response is not an array".to_owned()))?;
    let mut prices = PriceSeries::new();
    for item in items {
        let date = item["data"]
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .ok_or_else(|| SourceError::Malformed(format!("NBP item without date: {}", item)))?;
        let pln_per_gram = item["cena"]
            .as_f64()
            .ok_or_else(|| SourceError::Malformed(format!("NBP item without price: {}", item)))?;
        insert_price(
            &mut prices,
            NBP_SOURCE,
            date,
            pln_per_gram * GRAMS_PER_TROY_OUNCE * pln_usd_rate,
        );
    }
    if prices.is_empty() {
        return Err(SourceError::Empty);
    }
    Ok(prices)
}
