use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, ValueHint};

use crate::cache::DEFAULT_CACHE_PATH;
use crate::ratio::RatioMode;

pub const DEFAULT_DAYS: i64 = 7;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Rough PLN→USD rate applied to the NBP fixing.
pub const DEFAULT_PLN_USD_RATE: f64 = 0.25;
pub const DEFAULT_GOLD_PROXY_TICKER: &str = "GLD";
pub const DEFAULT_GOLD_PROXY_FACTOR: f64 = 10.0;
pub const DEFAULT_COIN: &str = "bitcoin";

#[derive(Parser, Debug)]
#[command(author, version, about = "Tracks the Bitcoin to gold price ratio")]
pub struct Cli {
    /// Number of days to show
    #[arg(
        long,
        short,
        env = "GOLDBIT_DAYS",
        default_value_t = DEFAULT_DAYS,
        allow_negative_numbers = true
    )]
    pub days: i64,

    /// Ratio orientation
    #[arg(long, short, value_enum, env = "GOLDBIT_MODE", default_value_t = RatioMode::CryptoOverGold)]
    pub mode: RatioMode,

    /// Export rows to a CSV file; without a path a timestamped name is used
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub export: Option<Option<PathBuf>>,

    /// Refresh again every N seconds until interrupted
    #[arg(long, env = "GOLDBIT_WATCH")]
    pub watch: Option<u64>,

    /// Where the gold price cache lives
    #[arg(
        long,
        value_hint = ValueHint::FilePath,
        env = "GOLDBIT_CACHE_PATH",
        default_value = DEFAULT_CACHE_PATH
    )]
    pub cache_path: PathBuf,

    /// Keep the cache in memory instead of on disk
    #[arg(long)]
    pub no_disk_cache: bool,

    /// Seconds a cached gold series stays valid
    #[arg(long, env = "GOLDBIT_CACHE_TTL", default_value_t = DEFAULT_CACHE_TTL_SECS)]
    pub cache_ttl: u64,

    /// Per-request HTTP timeout in seconds
    #[arg(long, env = "GOLDBIT_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// PLN to USD rate for the NBP gold fixing
    #[arg(long, env = "GOLDBIT_PLN_USD_RATE", default_value_t = DEFAULT_PLN_USD_RATE)]
    pub pln_usd_rate: f64,

    /// Gold-backed instrument used when NBP is unavailable
    #[arg(long, env = "GOLDBIT_GOLD_PROXY_TICKER", default_value = DEFAULT_GOLD_PROXY_TICKER)]
    pub gold_proxy_ticker: String,

    /// Multiplier turning the proxy's close into a gold price per ounce
    #[arg(long, env = "GOLDBIT_GOLD_PROXY_FACTOR", default_value_t = DEFAULT_GOLD_PROXY_FACTOR)]
    pub gold_proxy_factor: f64,

    /// CoinGecko coin id
    #[arg(long, env = "GOLDBIT_COIN", default_value = DEFAULT_COIN)]
    pub coin: String,
}

impl Cli {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("pln-usd-rate", self.pln_usd_rate),
            ("gold-proxy-factor", self.gold_proxy_factor),
        ] {
            if !value.is_finite() || value <= 0. {
                return Err(anyhow!("--{} must be a positive number, got {}", name, value));
            }
        }
        if self.timeout == 0 {
            return Err(anyhow!("--timeout must be at least one second"));
        }
        if self.watch == Some(0) {
            return Err(anyhow!("--watch must be at least one second"));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
