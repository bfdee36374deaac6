use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::datasources::PriceSeries;
use crate::error::CacheError;

pub const DEFAULT_CACHE_PATH: &str = "gold_prices_cache.json";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Single-slot store for the primary gold series.
///
/// Caching is best effort: a record that is missing, unreadable, corrupt or
/// older than the TTL is a miss, and a failed write is logged and dropped.
#[async_trait]
pub trait PriceCache: Sync + Send {
    async fn load_record(&self) -> Option<CacheRecord>;

    async fn store(&self, series: &PriceSeries);

    async fn load(&self) -> Option<PriceSeries> {
        self.load_record().await.map(|record| record.series)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub captured_at: DateTime<Utc>,
    pub series: PriceSeries,
}

/// On-disk layout: `{"timestamp": <unix seconds>, "prices": {"YYYY-MM-DD": price}}`.
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    timestamp: f64,
    prices: PriceSeries,
}

impl CacheRecord {
    pub fn captured_now(series: PriceSeries) -> CacheRecord {
        CacheRecord {
            captured_at: Utc::now(),
            series,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Result<Duration, CacheError> {
        (now - self.captured_at)
            .to_std()
            .map_err(|_| CacheError::FutureTimestamp)
    }

    /// Fresh while strictly younger than `ttl`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> Result<bool, CacheError> {
        Ok(self.age(now)? < ttl)
    }

    fn encode(&self) -> Result<Vec<u8>, CacheError> {
        let stored = StoredRecord {
            timestamp: self.captured_at.timestamp_millis() as f64 / 1000.,
            prices: self.series.clone(),
        };
        Ok(serde_json::to_vec(&stored)?)
    }

    fn decode(raw: &[u8]) -> Result<CacheRecord, CacheError> {
        let stored: StoredRecord = serde_json::from_slice(raw)?;
        let captured_at = Some(stored.timestamp)
            .filter(|t| t.is_finite())
            .and_then(|t| DateTime::from_timestamp_millis((t * 1000.).round() as i64))
            .ok_or_else(|| {
                <serde_json::Error as serde::de::Error>::custom("timestamp out of range")
            })?;
        Ok(CacheRecord {
            captured_at,
            series: stored.prices,
        })
    }
}

fn fresh_or_miss(record: CacheRecord, now: DateTime<Utc>, ttl: Duration) -> Option<CacheRecord> {
    match record.is_fresh(now, ttl) {
        Ok(true) => Some(record),
        Ok(false) => {
            debug!("Cache record from {} is stale", record.captured_at);
            None
        }
        Err(e) => {
            warn!("Ignoring cache record: {}", e);
            None
        }
    }
}

/// JSON file cache, replaced whole on every write.
pub struct FileCache {
    path: PathBuf,
    ttl: Duration,
    write_lock: Mutex<()>,
}

impl FileCache {
    pub fn new(path: PathBuf, ttl: Duration) -> FileCache {
        FileCache {
            path,
            ttl,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_record(&self) -> Result<CacheRecord, CacheError> {
        let raw = tokio::fs::read(&self.path).await?;
        CacheRecord::decode(&raw)
    }

    async fn write_record(&self, record: &CacheRecord) -> Result<(), CacheError> {
        let encoded = record.encode()?;
        let _guard = self.write_lock.lock().await;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, encoded).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    pub async fn load_record_at(&self, now: DateTime<Utc>) -> Option<CacheRecord> {
        match self.read_record().await {
            Ok(record) => fresh_or_miss(record, now, self.ttl),
            Err(CacheError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                debug!("No cache file at {}", self.path.display());
                None
            }
            Err(e) => {
                warn!("Unreadable cache file {}: {}", self.path.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl PriceCache for FileCache {
    async fn load_record(&self) -> Option<CacheRecord> {
        self.load_record_at(Utc::now()).await
    }

    async fn store(&self, series: &PriceSeries) {
        let record = CacheRecord::captured_now(series.clone());
        match self.write_record(&record).await {
            Ok(()) => info!(
                "Cached {} prices to {}",
                series.len(),
                self.path.display()
            ),
            Err(e) => error!("Error caching prices: {}", e),
        }
    }
}

/// In-process cache slot. Survives between refreshes of one run only.
pub struct MemoryCache {
    ttl: Duration,
    slot: Mutex<Option<CacheRecord>>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> MemoryCache {
        MemoryCache {
            ttl,
            slot: Mutex::new(None),
        }
    }
}

#[cfg(test)]
impl MemoryCache {
    pub fn with_record(ttl: Duration, record: CacheRecord) -> MemoryCache {
        MemoryCache {
            ttl,
            slot: Mutex::new(Some(record)),
        }
    }

    /// The slot's content regardless of freshness.
    pub async fn peek(&self) -> Option<CacheRecord> {
        self.slot.lock().await.clone()
    }
}

#[async_trait]
impl PriceCache for MemoryCache {
    async fn load_record(&self) -> Option<CacheRecord> {
        let record = self.slot.lock().await.clone()?;
        fresh_or_miss(record, Utc::now(), self.ttl)
    }

    async fn store(&self, series: &PriceSeries) {
        *self.slot.lock().await = Some(CacheRecord::captured_now(series.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn series() -> PriceSeries {
        let mut series = PriceSeries::new();
        series.insert(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 2000.0);
        series.insert(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 2010.5);
        series
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap()
    }

    fn record_aged(age: Duration) -> CacheRecord {
        CacheRecord {
            captured_at: now() - chrono::Duration::from_std(age).unwrap(),
            series: series(),
        }
    }

    #[test]
    fn freshness_flips_at_ttl() {
        let ttl = DEFAULT_CACHE_TTL;
        let young = record_aged(ttl - Duration::from_secs(1));
        let old = record_aged(ttl + Duration::from_secs(1));
        assert!(young.is_fresh(now(), ttl).unwrap());
        assert!(!old.is_fresh(now(), ttl).unwrap());
        assert!(!record_aged(ttl).is_fresh(now(), ttl).unwrap());
    }

    #[test]
    fn future_record_is_rejected() {
        let record = CacheRecord {
            captured_at: now() + chrono::Duration::seconds(30),
            series: series(),
        };
        assert!(matches!(
            record.is_fresh(now(), DEFAULT_CACHE_TTL),
            Err(CacheError::FutureTimestamp)
        ));
        assert_eq!(fresh_or_miss(record, now(), DEFAULT_CACHE_TTL), None);
    }

    #[tokio::test]
    async fn file_cache_honours_ttl_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let ttl = DEFAULT_CACHE_TTL;
        let cache = FileCache::new(path, ttl);
        let record = record_aged(Duration::ZERO);
        cache.write_record(&record).await.unwrap();

        let just_inside = now() + chrono::Duration::from_std(ttl - Duration::from_secs(1)).unwrap();
        let just_outside = now() + chrono::Duration::from_std(ttl + Duration::from_secs(1)).unwrap();
        let hit = cache.load_record_at(just_inside).await.unwrap();
        assert_eq!(hit.series, series());
        assert_eq!(hit.captured_at, record.captured_at);
        assert_eq!(cache.load_record_at(just_outside).await, None);
    }

    #[tokio::test]
    async fn stored_file_uses_timestamp_and_prices_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = FileCache::new(path.clone(), DEFAULT_CACHE_TTL);
        cache.store(&series()).await;

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(raw["timestamp"].is_f64());
        assert_eq!(raw["prices"]["2024-01-02"], 2010.5);
        assert_eq!(cache.load().await, Some(series()));
    }

    #[tokio::test]
    async fn concurrent_stores_leave_one_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = FileCache::new(path.clone(), DEFAULT_CACHE_TTL);
        let first = series();
        let mut second = series();
        second.insert(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), 2021.0);

        futures::join!(cache.store(&first), cache.store(&second));

        let stored = cache.load().await.unwrap();
        assert!(stored == first || stored == second);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_or_missing_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let missing = FileCache::new(dir.path().join("nope.json"), DEFAULT_CACHE_TTL);
        assert_eq!(missing.load().await, None);

        let path = dir.path().join("corrupt.json");
        std::fs::write(&path, b"{\"timestamp\": \"yesterday\"").unwrap();
        let corrupt = FileCache::new(path.clone(), DEFAULT_CACHE_TTL);
        assert_eq!(corrupt.load().await, None);

        std::fs::write(&path, br#"{"timestamp": 1704196800.0, "prices": {"not-a-date": 1.0}}"#)
            .unwrap();
        assert_eq!(corrupt.load_record_at(now()).await, None);
    }

    #[tokio::test]
    async fn failed_write_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(
            dir.path().join("missing-dir").join("cache.json"),
            DEFAULT_CACHE_TTL,
        );
        cache.store(&series()).await;
        assert_eq!(cache.load().await, None);
    }

    #[tokio::test]
    async fn memory_cache_expires_records() {
        let stale = CacheRecord {
            captured_at: Utc::now() - chrono::Duration::hours(2),
            series: series(),
        };
        let cache = MemoryCache::with_record(DEFAULT_CACHE_TTL, stale);
        assert_eq!(cache.load().await, None);
        cache.store(&series()).await;
        assert_eq!(cache.load().await, Some(series()));
    }
}
