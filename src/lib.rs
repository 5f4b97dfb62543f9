//! # api-transport
//!
//! The outbound transport a tool-integration server uses to call its remote
//! JSON backend. Every domain operation funnels through one [`Transport`],
//! which owns field-convention mapping, retry with backoff, a bounded TTL
//! response cache and request metrics.
//!
//! ## Quick Start
//!
//! ```no_run
//! use api_transport::{Config, Transport};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), api_transport::TransportError> {
//! // Load configuration from config.toml
//! let config = Config::new()?;
//! let transport = Transport::new(config)?;
//!
//! // Bodies are written in camelCase and sent as snake_case
//! let _created = transport
//!     .post("/tests", Some(json!({ "testName": "smoke" })))
//!     .await?;
//!
//! // Responses come back in camelCase
//! let run = transport.get("/tests/1", None).await?;
//! println!("{}", run["executionId"]);
//!
//! println!("{:?}", transport.get_metrics().await);
//! transport.destroy().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! - **Cache check**: fetches of non-excluded paths are served from the
//!   [`ResponseCache`] while fresh
//! - **Wire conversion**: body and query keys rewritten to `snake_case`
//! - **Marker injection**: a fixed field identifies this client type
//! - **Send with retry**: [`RetryPolicy`] decides on each classified failure
//! - **Application conversion**: response keys rewritten to `camelCase`
//!
//! ## Configuration
//!
//! ```toml
//! [backend]
//! base_url = "https://api.example.com/v1"
//! api_key = "your_api_key"
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 1000
//!
//! [cache]
//! ttl_ms = 300000
//! exclude_patterns = ["/logs", "/status$"]
//! ```

pub mod augment;
pub mod cache;
pub mod config;
pub mod convention;
pub mod error;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod request;
pub mod retry;
pub mod transport;

// Re-export commonly used types at the crate root
pub use augment::RequestAugmenter;
pub use cache::{CacheConfig, CacheStats, ResponseCache};
pub use config::{BackendConfig, Config};
pub use error::{ErrorKind, TransportError};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use logging::LoggingConfig;
pub use metrics::{MetricsCollector, MetricsConfig, MetricsSnapshot, Outcome};
pub use request::{QueryParams, RequestDescriptor, Verb};
pub use retry::{RetryConfig, RetryDecision, RetryPolicy};
pub use transport::Transport;
pub use tokio_util::sync::CancellationToken;
