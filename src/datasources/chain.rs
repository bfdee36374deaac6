use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use pretty_duration::pretty_duration;

use super::datasource::{DateRange, PriceDataSource, PriceSeries};
use super::status::SourceStatus;
use crate::cache::PriceCache;
use crate::error::SourceError;

/// Ordered list of sources tried until one yields prices.
///
/// The optional cache fronts the first source: a fresh record short-circuits
/// the chain, and only the first source's results are written back. Every
/// source is asked at most once per resolve.
pub struct FallbackChain {
    cache: Option<Arc<dyn PriceCache>>,
    sources: Vec<Box<dyn PriceDataSource>>,
}

/// Result of one pass through a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub series: Option<PriceSeries>,
    pub statuses: Vec<SourceStatus>,
}

impl FallbackChain {
    pub fn new(sources: Vec<Box<dyn PriceDataSource>>) -> FallbackChain {
        FallbackChain {
            cache: None,
            sources,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn PriceCache>) -> FallbackChain {
        self.cache = Some(cache);
        self
    }

    pub async fn resolve(&self, range: &DateRange) -> Resolution {
        let mut statuses = vec![];

        if let (Some(cache), Some(primary)) = (&self.cache, self.sources.first()) {
            if let Some(record) = cache.load_record().await {
                let age = record
                    .age(Utc::now())
                    .map(|d| pretty_duration(&d, None))
                    .unwrap_or_else(|_| "[error]".to_owned());
                info!("{}: using cached prices captured {} ago", primary.name(), age);
                statuses.push(SourceStatus::success(
                    primary.name(),
                    format!("from cache, captured {} ago", age),
                ));
                return Resolution {
                    series: Some(record.series),
                    statuses,
                };
            }
        }

        for (i, source) in self.sources.iter().enumerate() {
            let result = source.fetch(range).await.and_then(|series| {
                if series.is_empty() {
                    Err(SourceError::Empty)
                } else {
                    Ok(series)
                }
            });
            match result {
                Ok(series) => {
                    info!("{}: fetched {} prices", source.name(), series.len());
                    if i == 0 {
                        if let Some(cache) = &self.cache {
                            cache.store(&series).await;
                        }
                    }
                    statuses.push(SourceStatus::success(source.name(), ""));
                    return Resolution {
                        series: Some(series),
                        statuses,
                    };
                }
                Err(e) => {
                    warn!("{}: {}", source.name(), e);
                    statuses.push(SourceStatus::failure(source.name(), e.to_string()));
                }
            }
        }

        Resolution {
            series: None,
            statuses,
        }
    }
}
