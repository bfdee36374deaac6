use chrono::{DateTime, Utc};
use futures::join;
use log::{info, warn};

use crate::datasources::{DateRange, FallbackChain, StatusBoard};
use crate::error::RefreshError;
use crate::ratio::{compute, RatioMode, RatioPoint};

/// A validated refresh request. Construction is the only place a day count is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshRequest {
    days: u32,
    mode: RatioMode,
}

impl RefreshRequest {
    pub fn new(days: i64, mode: RatioMode) -> Result<RefreshRequest, RefreshError> {
        match u32::try_from(days) {
            Ok(days) if days > 0 => Ok(RefreshRequest { days, mode }),
            _ => Err(RefreshError::InvalidInput { days }),
        }
    }
}

/// Everything one refresh cycle produced, ready for display or export.
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub rows: Vec<RatioPoint>,
    pub mode: RatioMode,
    pub days: u32,
    pub refreshed_at: DateTime<Utc>,
    pub statuses: StatusBoard,
}

pub async fn refresh(
    request: &RefreshRequest,
    gold_chain: &FallbackChain,
    crypto_chain: &FallbackChain,
) -> Result<RefreshReport, RefreshError> {
    let now = Utc::now();
    let range = DateRange::ending_at(now, request.days);
    info!(
        "Refreshing {} days ({} to {})",
        request.days,
        range.start_date(),
        now.date_naive()
    );

    let (gold, crypto) = join!(gold_chain.resolve(&range), crypto_chain.resolve(&range));

    let mut statuses = StatusBoard::new();
    statuses.extend(gold.statuses);
    statuses.extend(crypto.statuses);

    let (gold, crypto) = match (gold.series, crypto.series) {
        (Some(gold), Some(crypto)) => (gold, crypto),
        _ => {
            warn!("Refresh produced no data");
            return Err(RefreshError::NoData { statuses });
        }
    };

    let rows: Vec<_> = compute(&gold, &crypto, request.mode, request.days as usize).collect();
    info!("Computed {} ratio rows", rows.len());
    Ok(RefreshReport {
        rows,
        mode: request.mode,
        days: request.days,
        refreshed_at: now,
        statuses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasources::fakes::{series, FakeSource};
    use crate::datasources::PriceSeries;
    use crate::error::SourceError;
    use std::sync::atomic::Ordering;

    fn recent(offsets: &[i64], price: f64) -> PriceSeries {
        let today = Utc::now().date_naive();
        offsets
            .iter()
            .map(|d| (today - chrono::Duration::days(*d), price))
            .collect()
    }

    #[test]
    fn non_positive_days_are_rejected() {
        assert!(matches!(
            RefreshRequest::new(0, RatioMode::CryptoOverGold),
            Err(RefreshError::InvalidInput { days: 0 })
        ));
        assert!(matches!(
            RefreshRequest::new(-7, RatioMode::CryptoOverGold),
            Err(RefreshError::InvalidInput { days: -7 })
        ));
        assert_eq!(RefreshRequest::new(14, RatioMode::GoldOverCrypto).unwrap().days, 14);
    }

    #[tokio::test]
    async fn invalid_days_never_reach_a_source() {
        let gold = FakeSource::ok("NBP", series(&[("2024-01-01", 2000.)]));
        let crypto = FakeSource::ok("CoinGecko", series(&[("2024-01-01", 40000.)]));
        let gold_calls = gold.calls.clone();
        let crypto_calls = crypto.calls.clone();
        let gold_chain = FallbackChain::new(vec![Box::new(gold)]);
        let crypto_chain = FallbackChain::new(vec![Box::new(crypto)]);

        let result = match RefreshRequest::new(0, RatioMode::CryptoOverGold) {
            Ok(request) => refresh(&request, &gold_chain, &crypto_chain).await.map(|_| ()),
            Err(e) => Err(e),
        };

        assert!(matches!(result, Err(RefreshError::InvalidInput { .. })));
        assert_eq!(gold_calls.load(Ordering::SeqCst), 0);
        assert_eq!(crypto_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn both_legs_produce_rows_and_statuses() {
        let gold_chain = FallbackChain::new(vec![
            Box::new(FakeSource::failing("NBP", SourceError::Upstream { status: 500 })),
            Box::new(FakeSource::ok("YFinance", recent(&[0, 1, 2, 9], 2000.))),
        ]);
        let crypto_chain = FallbackChain::new(vec![Box::new(FakeSource::ok(
            "CoinGecko",
            recent(&[0, 1, 3, 9], 40000.),
        ))]);
        let request = RefreshRequest::new(3, RatioMode::CryptoOverGold).unwrap();

        let report = refresh(&request, &gold_chain, &crypto_chain).await.unwrap();

        assert_eq!(report.rows.len(), 3);
        assert!(report.rows.windows(2).all(|w| w[0].date < w[1].date));
        assert!(report.rows.iter().all(|p| p.ratio == 20.0));
        assert!(!report.statuses.get("NBP").unwrap().succeeded);
        assert!(report.statuses.get("YFinance").unwrap().succeeded);
        assert!(report.statuses.get("CoinGecko").unwrap().succeeded);
    }

    #[tokio::test]
    async fn missing_leg_reports_no_data() {
        let gold_chain = FallbackChain::new(vec![Box::new(FakeSource::ok(
            "NBP",
            recent(&[0], 2000.),
        ))]);
        let crypto_chain = FallbackChain::new(vec![Box::new(FakeSource::failing(
            "CoinGecko",
            SourceError::Transport("request timed out".to_owned()),
        ))]);
        let request = RefreshRequest::new(7, RatioMode::CryptoOverGold).unwrap();

        match refresh(&request, &gold_chain, &crypto_chain).await {
            Err(RefreshError::NoData { statuses }) => {
                assert!(statuses.get("NBP").unwrap().succeeded);
                let coingecko = statuses.get("CoinGecko").unwrap();
                assert!(!coingecko.succeeded);
                assert!(coingecko.detail.contains("timed out"));
            }
            other => panic!("expected NoData, got {:?}", other.map(|r| r.rows)),
        }
    }
}
