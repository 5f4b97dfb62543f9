use crate::error::TransportError;
use crate::request::{RequestDescriptor, Verb};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

const PREALLOCATE_LIMIT: usize = 1024;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_ms: u64,
    pub max_entries: usize,
    /// Regular expressions matched against the request path. A plain string
    /// acts as a substring match.
    pub exclude_patterns: Vec<String>,
    /// Period of the eager expiry sweep; 0 leaves eviction lazy.
    pub cleanup_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_ms: 300_000,
            max_entries: 100,
            exclude_patterns: Vec::new(),
            cleanup_interval_ms: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Value,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn is_valid(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) < self.ttl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
}

/// Bounded store of successful read responses with per-entry TTL.
///
/// Eviction is by insertion order, not recency.
#[derive(Debug)]
pub struct ResponseCache {
    config: CacheConfig,
    excludes: Vec<Regex>,
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Result<Self, TransportError> {
        let excludes = config
            .exclude_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|err| {
                    TransportError::Config(format!("invalid cache exclude pattern '{pattern}': {err}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let capacity = config.max_entries.min(PREALLOCATE_LIMIT);
        Ok(Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            config,
            excludes,
            hits: 0,
            misses: 0,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.excludes.iter().any(|pattern| pattern.is_match(path))
    }

    /// Only fetches are cached. Deletes share the read-style marker placement
    /// but are never served from the cache.
    pub fn is_cacheable(&self, request: &RequestDescriptor) -> bool {
        self.config.enabled && request.verb == Verb::Get && !self.is_excluded(&request.path)
    }

    pub fn get(&mut self, key: &str) -> Option<Value> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.is_valid(now) => {
                self.hits += 1;
                debug!("Cache hit: {}", key);
                Some(entry.payload.clone())
            }
            Some(_) => {
                self.remove(key);
                self.misses += 1;
                debug!("Cache entry expired: {}", key);
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put(&mut self, key: impl Into<String>, payload: Value) {
        let key = key.into();
        if self.config.max_entries == 0 {
            return;
        }

        if self.entries.contains_key(&key) {
            self.remove(&key);
        }

        while self.entries.len() >= self.config.max_entries {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                    debug!("Cache full, evicted {}", oldest);
                }
                None => break,
            }
        }

        let entry = CacheEntry {
            key: key.clone(),
            payload,
            inserted_at: Instant::now(),
            ttl: Duration::from_millis(self.config.ttl_ms),
        };
        self.order.push_back(key.clone());
        self.entries.insert(key, entry);
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_valid(now));
        let entries = &self.entries;
        self.order.retain(|key| entries.contains_key(key));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        let lookups = self.hits + self.misses;
        CacheStats {
            size: self.entries.len(),
            max_size: self.config.max_entries,
            hits: self.hits,
            misses: self.misses,
            hit_ratio: if lookups == 0 {
                0.0
            } else {
                self.hits as f64 / lookups as f64
            },
        }
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }
}
