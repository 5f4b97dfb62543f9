use crate::error::ErrorKind;
use crate::request::Verb;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub collect_timing: bool,
    pub collect_errors: bool,
    pub collect_cache_stats: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            collect_timing: true,
            collect_errors: true,
            collect_cache_stats: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error(ErrorKind),
}

/// Point-in-time copy of the collector's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub total_cache_hits: u64,
    pub total_cache_misses: u64,
    pub total_retries: u64,
    pub average_response_time_ms: f64,
    pub requests_by_verb: BTreeMap<Verb, u64>,
    pub errors_by_kind: BTreeMap<ErrorKind, u64>,
    pub last_reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MetricsCollector {
    config: MetricsConfig,
    total_requests: u64,
    total_errors: u64,
    total_cache_hits: u64,
    total_cache_misses: u64,
    total_retries: u64,
    timed_requests: u64,
    average_response_time_ms: f64,
    requests_by_verb: BTreeMap<Verb, u64>,
    errors_by_kind: BTreeMap<ErrorKind, u64>,
    last_reset_at: DateTime<Utc>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}

impl MetricsCollector {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            config,
            total_requests: 0,
            total_errors: 0,
            total_cache_hits: 0,
            total_cache_misses: 0,
            total_retries: 0,
            timed_requests: 0,
            average_response_time_ms: 0.0,
            requests_by_verb: BTreeMap::new(),
            errors_by_kind: BTreeMap::new(),
            last_reset_at: Utc::now(),
        }
    }

    /// Records one completed call, however many attempts it took.
    pub fn record(&mut self, verb: Verb, outcome: Outcome, duration: Duration) {
        if !self.config.enabled {
            return;
        }

        self.total_requests += 1;
        *self.requests_by_verb.entry(verb).or_insert(0) += 1;

        if let Outcome::Error(kind) = outcome {
            self.total_errors += 1;
            if self.config.collect_errors {
                *self.errors_by_kind.entry(kind).or_insert(0) += 1;
            }
        }

        if self.config.collect_timing {
            self.timed_requests += 1;
            let sample = duration.as_secs_f64() * 1000.0;
            self.average_response_time_ms +=
                (sample - self.average_response_time_ms) / self.timed_requests as f64;
        }
    }

    pub fn record_cache_hit(&mut self) {
        if self.config.enabled && self.config.collect_cache_stats {
            self.total_cache_hits += 1;
        }
    }

    pub fn record_cache_miss(&mut self) {
        if self.config.enabled && self.config.collect_cache_stats {
            self.total_cache_misses += 1;
        }
    }

    /// Records attempts beyond the first one of a single call.
    pub fn record_retries(&mut self, count: u64) {
        if self.config.enabled {
            self.total_retries += count;
        }
    }

    /// Zeroes every counter. Configuration is kept.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests,
            total_errors: self.total_errors,
            total_cache_hits: self.total_cache_hits,
            total_cache_misses: self.total_cache_misses,
            total_retries: self.total_retries,
            average_response_time_ms: self.average_response_time_ms,
            requests_by_verb: self.requests_by_verb.clone(),
            errors_by_kind: self.errors_by_kind.clone(),
            last_reset_at: self.last_reset_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_verb_totals() {
        let mut metrics = MetricsCollector::default();
        for _ in 0..3 {
            metrics.record(Verb::Get, Outcome::Success, Duration::from_millis(10));
        }
        metrics.record(Verb::Post, Outcome::Success, Duration::from_millis(10));
        metrics.record(Verb::Put, Outcome::Success, Duration::from_millis(10));
        metrics.record(Verb::Get, Outcome::Error(ErrorKind::Network), Duration::ZERO);
        metrics.record(Verb::Delete, Outcome::Error(ErrorKind::NotFound), Duration::ZERO);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 7);
        assert_eq!(snapshot.total_errors, 2);
        assert_eq!(snapshot.requests_by_verb.values().sum::<u64>(), 7);
        assert_eq!(snapshot.requests_by_verb[&Verb::Get], 4);
        assert_eq!(snapshot.errors_by_kind[&ErrorKind::Network], 1);
    }

    #[test]
    fn test_running_average() {
        let mut metrics = MetricsCollector::default();
        metrics.record(Verb::Get, Outcome::Success, Duration::from_millis(100));
        metrics.record(Verb::Get, Outcome::Success, Duration::from_millis(200));
        metrics.record(Verb::Get, Outcome::Success, Duration::from_millis(300));
        let average = metrics.snapshot().average_response_time_ms;
        assert!((average - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_cache_counters_are_separate() {
        let mut metrics = MetricsCollector::default();
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_cache_hits, 1);
        assert_eq!(snapshot.total_cache_misses, 1);
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.total_errors, 0);
    }

    #[test]
    fn test_reset() {
        let mut metrics = MetricsCollector::default();
        metrics.record(Verb::Get, Outcome::Error(ErrorKind::Network), Duration::from_millis(5));
        metrics.record_retries(2);
        let before = metrics.snapshot();
        metrics.reset();
        let after = metrics.snapshot();
        assert_eq!(after.total_requests, 0);
        assert_eq!(after.total_retries, 0);
        assert!(after.requests_by_verb.is_empty());
        assert!(after.errors_by_kind.is_empty());
        assert_eq!(after.average_response_time_ms, 0.0);
        assert!(after.last_reset_at >= before.last_reset_at);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut metrics = MetricsCollector::default();
        let snapshot = metrics.snapshot();
        metrics.record(Verb::Get, Outcome::Success, Duration::ZERO);
        assert_eq!(snapshot.total_requests, 0);
    }

    #[test]
    fn test_disabled_flags() {
        let mut metrics = MetricsCollector::new(MetricsConfig {
            collect_timing: false,
            collect_errors: false,
            collect_cache_stats: false,
            ..MetricsConfig::default()
        });
        metrics.record(Verb::Get, Outcome::Error(ErrorKind::Network), Duration::from_millis(50));
        metrics.record_cache_hit();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 1);
        assert_eq!(snapshot.total_errors, 1);
        assert!(snapshot.errors_by_kind.is_empty());
        assert_eq!(snapshot.average_response_time_ms, 0.0);
        assert_eq!(snapshot.total_cache_hits, 0);

        let mut off = MetricsCollector::new(MetricsConfig {
            enabled: false,
            ..MetricsConfig::default()
        });
        off.record(Verb::Get, Outcome::Success, Duration::ZERO);
        assert_eq!(off.snapshot().total_requests, 0);
    }
}
