#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Intervention decision backend.
//!
//! Turns `{ context, mode, client_meta }` requests into validated
//! [`MutationCommand`](impetus_proto::MutationCommand)s for the editing
//! session to execute.
//!
//! # Request pipeline
//!
//! ```text
//! POST /generate-intervention
//! ├── contract version       426 / 422
//! ├── Idempotency-Key        422
//! ├── X-LLM-* overrides      422 for an unknown provider
//! ├── body schema            422
//! ├── IdempotencyCache       replay, then single flight per key
//! ├── RateLimiter            429 + Retry-After
//! ├── ProviderRegistry       per-request provider, 503 without a key
//! └── InterventionService    spawned; result cached on 200 / 400
//!     ├── LlmProvider        bounded by a timeout, failures are retryable
//!     ├── LlmMetrics         every call logged and counted
//!     └── decide             mode constraint, safety override, anchors, ids
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod provider;
pub mod rate_limit;
pub mod service;

pub use cache::{IdempotencyCache, spawn_sweeper};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, ServerConfig};
pub use error::{ApiError, ErrorBody};
pub use http::{AppState, router};
pub use metrics::{LlmCall, LlmCallStats, LlmMetrics};
pub use provider::{
	AnthropicProvider, DebugProvider, Draft, GeminiProvider, LlmProvider, OpenAiProvider, ProviderError,
	ProviderOverride, ProviderRegistry, ProviderSettings, RegistryError,
};
pub use rate_limit::{RateLimitConfig, RateLimitError, RateLimiter};
pub use service::{InterventionService, ServiceError};
