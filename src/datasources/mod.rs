mod chain;
mod coingecko;
mod datasource;
mod nbp;
mod status;
mod yfinance;

pub use chain::{FallbackChain, Resolution};
pub use coingecko::CoingeckoDataSource;
pub use datasource::{DateRange, PriceDataSource, PriceSeries};
pub use nbp::NbpGoldDataSource;
pub use status::{SourceStatus, StatusBoard};
pub use yfinance::YahooGoldDataSource;

#[cfg(test)]
pub(crate) use chain::tests as fakes;
