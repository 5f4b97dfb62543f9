use crate::augment::{self, RequestAugmenter};
use crate::cache::{CacheStats, ResponseCache};
use crate::config::Config;
use crate::convention;
use crate::error::{classify_response, TransportError};
use crate::http::{HttpClient, ReqwestClient};
use crate::logging::LoggingConfig;
use crate::metrics::{MetricsCollector, MetricsSnapshot, Outcome};
use crate::request::{QueryParams, RequestDescriptor, Verb};
use crate::retry::RetryPolicy;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type Result<T> = std::result::Result<T, TransportError>;

/// Outbound API transport.
///
/// Every call goes through the same pipeline: cache lookup for fetches,
/// wire-convention conversion, marker injection, send with retry, and
/// conversion of the response back to the application convention.
///
/// Construct once and share by reference (or behind an `Arc`).
pub struct Transport {
    http: Arc<dyn HttpClient>,
    augmenter: RequestAugmenter,
    retry: RetryPolicy,
    cache: Arc<Mutex<ResponseCache>>,
    metrics: Mutex<MetricsCollector>,
    logging: LoggingConfig,
    shutdown: CancellationToken,
    closed: AtomicBool,
}

impl Transport {
    /// Creates a transport talking to `config.backend` over reqwest.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let http = ReqwestClient::new(&config.backend)?;
        Self::with_client(config, Arc::new(http))
    }

    /// Creates a transport over any [`HttpClient`]. The backend URL and
    /// credentials in `config` are ignored; they belong to the client.
    pub fn with_client(config: Config, http: Arc<dyn HttpClient>) -> Result<Self> {
        config.validate_options()?;

        let cleanup_interval = config.cache.cleanup_interval_ms;
        let sweep = config.cache.enabled && cleanup_interval > 0;
        let transport = Self {
            http,
            augmenter: RequestAugmenter::new(
                config.backend.marker_field.clone(),
                config.backend.marker_value.clone(),
            ),
            retry: RetryPolicy::new(config.retry),
            cache: Arc::new(Mutex::new(ResponseCache::new(config.cache)?)),
            metrics: Mutex::new(MetricsCollector::new(config.metrics)),
            logging: config.logging,
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
        };

        if sweep {
            transport.spawn_sweeper(Duration::from_millis(cleanup_interval));
        }

        Ok(transport)
    }

    fn spawn_sweeper(&self, period: Duration) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime; cache entries will only expire lazily");
            return;
        };
        let cache = Arc::clone(&self.cache);
        let shutdown = self.shutdown.clone();
        handle.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = cache.lock().await.purge_expired();
                        if purged > 0 {
                            debug!("Cache sweep removed {} expired entries", purged);
                        }
                    }
                }
            }
        });
    }

    // ========================================================================
    // Verb contract
    // ========================================================================

    pub async fn get(&self, path: &str, params: Option<QueryParams>) -> Result<Value> {
        self.get_with_cancel(path, params, &CancellationToken::new())
            .await
    }

    pub async fn post(&self, path: &str, body: Option<Value>) -> Result<Value> {
        self.post_with_cancel(path, body, &CancellationToken::new())
            .await
    }

    pub async fn put(&self, path: &str, body: Option<Value>) -> Result<Value> {
        self.put_with_cancel(path, body, &CancellationToken::new())
            .await
    }

    pub async fn patch(&self, path: &str, body: Option<Value>) -> Result<Value> {
        self.patch_with_cancel(path, body, &CancellationToken::new())
            .await
    }

    pub async fn delete(&self, path: &str, params: Option<QueryParams>) -> Result<Value> {
        self.delete_with_cancel(path, params, &CancellationToken::new())
            .await
    }

    pub async fn get_with_cancel(
        &self,
        path: &str,
        params: Option<QueryParams>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let request = RequestDescriptor::new(Verb::Get, path).with_query(params.unwrap_or_default());
        self.send(request, cancel).await
    }

    pub async fn post_with_cancel(
        &self,
        path: &str,
        body: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        self.send(RequestDescriptor::new(Verb::Post, path).with_body(body), cancel)
            .await
    }

    pub async fn put_with_cancel(
        &self,
        path: &str,
        body: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        self.send(RequestDescriptor::new(Verb::Put, path).with_body(body), cancel)
            .await
    }

    pub async fn patch_with_cancel(
        &self,
        path: &str,
        body: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        self.send(RequestDescriptor::new(Verb::Patch, path).with_body(body), cancel)
            .await
    }

    pub async fn delete_with_cancel(
        &self,
        path: &str,
        params: Option<QueryParams>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let request =
            RequestDescriptor::new(Verb::Delete, path).with_query(params.unwrap_or_default());
        self.send(request, cancel).await
    }

    /// Runs a fully built request through the pipeline.
    ///
    /// `cancel` is observed during backoff sleeps; destroying the transport
    /// aborts the call at any point.
    pub async fn send(&self, request: RequestDescriptor, cancel: &CancellationToken) -> Result<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let verb = request.verb;
        let path = request.path.clone();
        let started = Instant::now();
        let result = self.execute(request, cancel).await;

        let outcome = match &result {
            Ok(_) => Outcome::Success,
            Err(err) => {
                if self.logging.errors() {
                    warn!("{} {} failed: {}", verb, path, err);
                }
                Outcome::Error(err.kind())
            }
        };
        self.metrics
            .lock()
            .await
            .record(verb, outcome, started.elapsed());

        result
    }

    async fn execute(&self, request: RequestDescriptor, cancel: &CancellationToken) -> Result<Value> {
        request.validate()?;

        let cache_key = {
            let mut cache = self.cache.lock().await;
            if cache.is_cacheable(&request) {
                let key = request.cache_key();
                let hit = cache.get(&key);
                drop(cache);
                let mut metrics = self.metrics.lock().await;
                if let Some(payload) = hit {
                    metrics.record_cache_hit();
                    debug!("{} {} served from cache", request.verb, request.path);
                    return Ok(payload);
                }
                metrics.record_cache_miss();
                Some(key)
            } else {
                None
            }
        };

        let wire = self.augmenter.augment(augment::to_wire(request)?);
        if self.logging.requests() {
            let body = wire
                .body
                .as_ref()
                .map(|body| self.logging.render(body))
                .unwrap_or_default();
            debug!(
                "API request: {} {} {} {}",
                wire.verb,
                wire.path,
                self.logging.render_query(&wire.query),
                body
            );
        }

        let mut attempts = 0u32;
        let response = tokio::select! {
            result = self.retry.retry(cancel, |attempt| {
                attempts = attempt;
                self.send_once(&wire)
            }) => result,
            _ = self.shutdown.cancelled() => Err(TransportError::Cancelled),
        };

        if attempts > 1 {
            self.metrics
                .lock()
                .await
                .record_retries(u64::from(attempts - 1));
        }

        let payload = convention::to_application(&response?);
        if self.logging.responses() {
            debug!("API response: {} {} {}", wire.verb, wire.path, self.logging.render(&payload));
        }

        if let Some(key) = cache_key {
            // Checked under the lock `destroy` clears with, so a late
            // response cannot repopulate a destroyed cache.
            let mut cache = self.cache.lock().await;
            if !self.is_closed() && !self.shutdown.is_cancelled() {
                cache.put(key, payload.clone());
            }
        }

        Ok(payload)
    }

    async fn send_once(&self, request: &RequestDescriptor) -> Result<Value> {
        let response = self.http.send(request).await?;
        debug!("API response status: {}", response.status);
        classify_response(
            response.status,
            response.content_type.as_deref(),
            &response.body,
        )
    }

    // ========================================================================
    // Introspection and lifecycle
    // ========================================================================

    pub async fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.lock().await.snapshot()
    }

    pub async fn get_cache_stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }

    /// Zeroes metrics without touching the cache or calls in flight.
    pub async fn reset_metrics(&self) {
        self.metrics.lock().await.reset();
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Clears the cache, stops the sweeper and aborts pending backoffs.
    /// Safe to call more than once.
    pub async fn destroy(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("Destroying API transport");
        }
        self.shutdown.cancel();
        let mut cache = self.cache.lock().await;
        cache.clear();
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
