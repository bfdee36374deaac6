use thiserror::Error;

use crate::datasources::StatusBoard;

/// Failure of a single upstream fetch. Always reported as a status, never raised.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("status code: {status}")]
    Upstream { status: u16 },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("no usable prices in response")]
    Empty,
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return SourceError::Upstream {
                status: status.as_u16(),
            };
        }
        if e.is_decode() {
            return SourceError::Malformed(e.to_string());
        }
        if e.is_timeout() {
            return SourceError::Transport("request timed out".to_owned());
        }
        SourceError::Transport(e.to_string())
    }
}

impl From<yahoo_finance_api::YahooError> for SourceError {
    fn from(e: yahoo_finance_api::YahooError) -> Self {
        use yahoo_finance_api::YahooError;
        match e {
            // carries the reply status, e.g. "503 Service Unavailable"
            YahooError::FetchFailed(status) => status
                .split_whitespace()
                .next()
                .and_then(|code| code.parse().ok())
                .map(|status| SourceError::Upstream { status })
                .unwrap_or_else(|| SourceError::Transport(format!("yahoo fetch failed: {}", status))),
            YahooError::ConnectionFailed(e) => e.into(),
            YahooError::DeserializeFailed(e) => SourceError::Malformed(e.to_string()),
            e @ (YahooError::InvalidJson | YahooError::DataInconsistency) => {
                SourceError::Malformed(e.to_string())
            }
            YahooError::EmptyDataSet => SourceError::Empty,
            e @ YahooError::BuilderFailed => SourceError::Transport(e.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cache record is stamped in the future")]
    FutureTimestamp,
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("please enter a positive number of days (got {days})")]
    InvalidInput { days: i64 },

    #[error("failed to fetch price data")]
    NoData { statuses: StatusBoard },
}
