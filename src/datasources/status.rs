use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Local, Utc};

/// Outcome of one source attempt within a refresh cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceStatus {
    pub source_name: String,
    pub succeeded: bool,
    pub detail: String,
    pub observed_at: DateTime<Utc>,
}

impl SourceStatus {
    pub fn success(source_name: &str, detail: impl Into<String>) -> SourceStatus {
        SourceStatus {
            source_name: source_name.to_owned(),
            succeeded: true,
            detail: detail.into(),
            observed_at: Utc::now(),
        }
    }

    pub fn failure(source_name: &str, detail: impl Into<String>) -> SourceStatus {
        SourceStatus {
            source_name: source_name.to_owned(),
            succeeded: false,
            detail: detail.into(),
            observed_at: Utc::now(),
        }
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timestamp = self.observed_at.with_timezone(&Local).format("%H:%M:%S");
        if self.succeeded {
            write!(f, "{} [{}]: ✓ Success", self.source_name, timestamp)?;
            if !self.detail.is_empty() {
                write!(f, " ({})", self.detail)?;
            }
            Ok(())
        } else {
            write!(f, "{} [{}]: ✗ Failed: {}", self.source_name, timestamp, self.detail)
        }
    }
}

/// One status per source name for a single refresh cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusBoard {
    statuses: BTreeMap<String, SourceStatus>,
}

impl StatusBoard {
    pub fn new() -> StatusBoard {
        StatusBoard::default()
    }

    pub fn record(&mut self, status: SourceStatus) {
        self.statuses.insert(status.source_name.clone(), status);
    }

    pub fn extend(&mut self, statuses: impl IntoIterator<Item = SourceStatus>) {
        for status in statuses {
            self.record(status);
        }
    }

    pub fn get(&self, source_name: &str) -> Option<&SourceStatus> {
        self.statuses.get(source_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceStatus> {
        self.statuses.values()
    }
}
