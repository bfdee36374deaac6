use chrono::NaiveDate;
use clap::ValueEnum;

use crate::datasources::PriceSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RatioMode {
    /// Bitcoin price divided by gold price
    #[default]
    #[value(name = "btc-gold")]
    CryptoOverGold,
    /// Gold price divided by Bitcoin price
    #[value(name = "gold-btc")]
    GoldOverCrypto,
}

impl RatioMode {
    pub fn label(self) -> &'static str {
        match self {
            RatioMode::CryptoOverGold => "BTC/Gold Ratio",
            RatioMode::GoldOverCrypto => "Gold/BTC Ratio",
        }
    }

    pub fn apply(self, gold_price: f64, crypto_price: f64) -> f64 {
        match self {
            RatioMode::CryptoOverGold => crypto_price / gold_price,
            RatioMode::GoldOverCrypto => gold_price / crypto_price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioPoint {
    pub date: NaiveDate,
    pub gold_price: f64,
    pub crypto_price: f64,
    pub ratio: f64,
}

/// Ratios for the latest `limit` dates quoted in both series, oldest first.
///
/// The iterator borrows both series and can be cloned to walk it again.
pub fn compute<'a>(
    gold: &'a PriceSeries,
    crypto: &'a PriceSeries,
    mode: RatioMode,
    limit: usize,
) -> impl Iterator<Item = RatioPoint> + Clone + 'a {
    let aligned = move || {
        gold.iter().filter_map(move |(date, &gold_price)| {
            crypto.get(date).map(|&crypto_price| (*date, gold_price, crypto_price))
        })
    };
    let skip = aligned().count().saturating_sub(limit);
    aligned()
        .skip(skip)
        .map(move |(date, gold_price, crypto_price)| RatioPoint {
            date,
            gold_price,
            crypto_price,
            ratio: mode.apply(gold_price, crypto_price),
        })
}
