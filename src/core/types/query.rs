//! Query parameters and cursor state.

use crate::core::error::{ReductError, Result};
use std::time::Duration;

/// Entries a query reads from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntrySelector {
    Single(String),
    Multi(Vec<String>),
}

impl EntrySelector {
    /// Canonical ordered entry list. Duplicates are dropped, first wins.
    pub fn resolve(&self) -> Result<Vec<String>> {
        let entries = match self {
            EntrySelector::Single(name) => vec![name.clone()],
            EntrySelector::Multi(names) => {
                let mut entries: Vec<String> = Vec::with_capacity(names.len());
                for name in names {
                    if !entries.contains(name) {
                        entries.push(name.clone());
                    }
                }
                entries
            }
        };

        if entries.is_empty() || entries.iter().any(|e| e.is_empty()) {
            return Err(ReductError::Resolution(
                "A query needs at least one non-empty entry name".to_string(),
            ));
        }
        Ok(entries)
    }
}

impl From<&str> for EntrySelector {
    fn from(name: &str) -> Self {
        EntrySelector::Single(name.to_string())
    }
}

impl From<String> for EntrySelector {
    fn from(name: String) -> Self {
        EntrySelector::Single(name)
    }
}

impl From<Vec<String>> for EntrySelector {
    fn from(names: Vec<String>) -> Self {
        EntrySelector::Multi(names)
    }
}

impl From<&[&str]> for EntrySelector {
    fn from(names: &[&str]) -> Self {
        EntrySelector::Multi(names.iter().map(|n| n.to_string()).collect())
    }
}

/// Options of a query.
///
/// | Option | Default | Description |
/// |--------|---------|-------------|
/// | `start` | none | First timestamp (µs, inclusive) |
/// | `stop` | none | Last timestamp (µs, exclusive) |
/// | `ttl` | server default | Seconds the server keeps the query alive between fetches |
/// | `when` | none | Conditional filter, passed through as JSON |
/// | `strict` | server default | Fail on unknown labels in `when` |
/// | `limit` | none | Maximum number of records |
/// | `each_n` | none | Return every Nth record |
/// | `each_s` | none | Return a record every S seconds |
/// | `head_only` | `false` | Fetch metadata only (HEAD requests, empty payloads) |
/// | `continuous` | `false` | Keep polling for new records, never finish |
/// | `poll_interval` | 1 s | Wait between empty fetches in continuous mode |
#[derive(Clone, Debug, PartialEq)]
pub struct QueryOptions {
    pub start: Option<u64>,
    pub stop: Option<u64>,
    pub ttl: Option<u64>,
    pub when: Option<serde_json::Value>,
    pub strict: Option<bool>,
    pub limit: Option<u64>,
    pub each_n: Option<u64>,
    pub each_s: Option<f64>,
    pub head_only: bool,
    pub continuous: bool,
    pub poll_interval: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            start: None,
            stop: None,
            ttl: None,
            when: None,
            strict: None,
            limit: None,
            each_n: None,
            each_s: None,
            head_only: false,
            continuous: false,
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl QueryOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_start(mut self, start: u64) -> Self {
        self.start = Some(start);
        self
    }

    #[must_use]
    pub fn with_stop(mut self, stop: u64) -> Self {
        self.stop = Some(stop);
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl = Some(ttl_secs);
        self
    }

    #[must_use]
    pub fn with_when(mut self, condition: serde_json::Value) -> Self {
        self.when = Some(condition);
        self
    }

    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_each_n(mut self, n: u64) -> Self {
        self.each_n = Some(n);
        self
    }

    #[must_use]
    pub fn with_each_s(mut self, seconds: f64) -> Self {
        self.each_s = Some(seconds);
        self
    }

    #[must_use]
    pub fn head_only(mut self) -> Self {
        self.head_only = true;
        self
    }

    #[must_use]
    pub fn continuous(mut self) -> Self {
        self.continuous = true;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn mode(&self) -> QueryMode {
        if self.continuous {
            QueryMode::Continuous
        } else {
            QueryMode::OneShot
        }
    }

    /// TTL sent with the query.
    ///
    /// A continuous query must outlive the gap between two polls, so its TTL
    /// is at least `2 * poll_interval + 1` seconds.
    pub fn effective_ttl(&self) -> Option<u64> {
        if !self.continuous {
            return self.ttl;
        }
        let floor = (self.poll_interval.as_secs_f64() * 2.0 + 1.0).ceil() as u64;
        Some(self.ttl.map_or(floor, |ttl| ttl.max(floor)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryMode {
    OneShot,
    Continuous,
}

/// Server-side query the cursor is reading from.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryState {
    /// Opaque id returned when the query was opened.
    pub query_id: String,
    pub mode: QueryMode,
    pub poll_interval: Duration,
    pub entries: Vec<String>,
    pub exhausted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== EntrySelector Tests ==========

    #[test]
    fn test_single_selector() {
        let selector = EntrySelector::from("entry-1");
        assert_eq!(selector.resolve().unwrap(), vec!["entry-1".to_string()]);
    }

    #[test]
    fn test_multi_selector_keeps_order_and_drops_duplicates() {
        let selector = EntrySelector::from(&["b", "a", "b"][..]);
        assert_eq!(selector.resolve().unwrap(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_empty_selector_rejected() {
        assert!(EntrySelector::Multi(vec![]).resolve().is_err());
        assert!(EntrySelector::from("").resolve().is_err());
    }

    // ========== QueryOptions Tests ==========

    #[test]
    fn test_default_options() {
        let options = QueryOptions::default();
        assert_eq!(options.mode(), QueryMode::OneShot);
        assert_eq!(options.poll_interval, Duration::from_secs(1));
        assert!(!options.head_only);
        assert_eq!(options.effective_ttl(), None);
    }

    #[test]
    fn test_one_shot_ttl_passes_through() {
        let options = QueryOptions::new().with_ttl(5);
        assert_eq!(options.effective_ttl(), Some(5));
    }

    #[test]
    fn test_continuous_ttl_floor_from_poll_interval() {
        let options = QueryOptions::new()
            .continuous()
            .with_poll_interval(Duration::from_millis(200));
        // ceil(0.2 * 2 + 1) = 2
        assert_eq!(options.effective_ttl(), Some(2));
    }

    #[test]
    fn test_continuous_ttl_keeps_larger_value() {
        let options = QueryOptions::new()
            .continuous()
            .with_ttl(60)
            .with_poll_interval(Duration::from_secs(1));
        assert_eq!(options.effective_ttl(), Some(60));

        let options = QueryOptions::new()
            .continuous()
            .with_ttl(1)
            .with_poll_interval(Duration::from_secs(5));
        assert_eq!(options.effective_ttl(), Some(11));
    }

    #[test]
    fn test_partial_override() {
        let options = QueryOptions {
            limit: Some(10),
            ..Default::default()
        };
        assert_eq!(options.limit, Some(10));
        assert_eq!(options.start, None);
    }
}
