//! axum HTTP surface.
//!
//! | route | handler |
//! |---|---|
//! | `POST /generate-intervention` | [`generate_intervention`] |
//! | `POST /api/v1/impetus/generate-intervention` | same |
//! | `GET /health` | liveness |
//! | `GET /metrics` | LLM call counters, when enabled |

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use impetus_proto::{ContractVersion, InterventionRequest, VersionParseError};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::{IdempotencyCache, spawn_sweeper};
use crate::config::{ConfigError, CooldownConfig, ServerConfig};
use crate::error::ApiError;
use crate::provider::{ProviderOverride, ProviderRegistry};
use crate::rate_limit::RateLimiter;
use crate::service::InterventionService;


/// Required request key.
pub const IDEMPOTENCY_KEY: &str = "idempotency-key";
/// Optional contract version.
pub const CONTRACT_VERSION: &str = "contract-version";
/// Accepted spelling of [`CONTRACT_VERSION`].
pub const X_CONTRACT_VERSION: &str = "x-contract-version";
/// Rate-limit bucket.
pub const CLIENT_ID: &str = "x-client-id";
/// Set on responses replayed from the cache.
pub const IDEMPOTENT_REPLAYED: &str = "idempotent-replayed";
/// Seconds the client should wait before the next trigger.
pub const RETRIGGER_COOLDOWN: &str = "retrigger-cooldown";
/// Provider chosen by the caller.
pub const X_LLM_PROVIDER: &str = "x-llm-provider";
/// Model chosen by the caller.
pub const X_LLM_MODEL: &str = "x-llm-model";
/// The caller's own provider key.
pub const X_LLM_API_KEY: &str = "x-llm-api-key";

/// Longest accepted `Idempotency-Key`.
pub const IDEMPOTENCY_KEY_MAX_LEN: usize = 255;
/// Bucket for requests without `X-Client-Id`.
pub const ANONYMOUS_CLIENT: &str = "anonymous";

const SERVICE_NAME: &str = "impetus-lock";

/// A finished response as stored for replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
	status: StatusCode,
	body: Bytes,
	cooldown: Option<u64>,
}

impl StoredResponse {
	fn json(status: StatusCode, value: &impl Serialize, cooldown: Option<u64>) -> Result<Self, ApiError> {
		let body = serde_json::to_vec(value).map_err(|e| ApiError::Internal(e.to_string()))?;
		Ok(Self {
			status,
			body: Bytes::from(body),
			cooldown,
		})
	}

	/// Only commands and deterministic client errors are replayed.
	fn is_cacheable(&self) -> bool {
		matches!(self.status, StatusCode::OK | StatusCode::BAD_REQUEST)
	}

	fn into_response(self, replayed: bool) -> Response {
		let mut response = (self.status, self.body).into_response();
		let headers = response.headers_mut();
		headers.insert(
			header::CONTENT_TYPE,
			HeaderValue::from_static("application/json"),
		);
		if let Some(secs) = self.cooldown {
			headers.insert(RETRIGGER_COOLDOWN, HeaderValue::from(secs));
		}
		if replayed {
			headers.insert(IDEMPOTENT_REPLAYED, HeaderValue::from_static("true"));
		}
		response
	}
}

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
	service: Arc<InterventionService>,
	registry: Arc<ProviderRegistry>,
	cache: Arc<IdempotencyCache<StoredResponse>>,
	limiter: Arc<RateLimiter>,
	cooldown: CooldownConfig,
	min_contract_version: ContractVersion,
	metrics_enabled: bool,
}

impl AppState {
	/// Wires explicit components.
	pub fn new(
		service: Arc<InterventionService>,
		cache: Arc<IdempotencyCache<StoredResponse>>,
		limiter: Arc<RateLimiter>,
		config: &ServerConfig,
	) -> Self {
		Self {
			service,
			registry: Arc::new(ProviderRegistry::new(config.provider.clone())),
			cache,
			limiter,
			cooldown: config.cooldown,
			min_contract_version: config.min_contract_version,
			metrics_enabled: config.metrics.enabled,
		}
	}

	/// Builds every component from `config`.
	pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
		config.validate()?;
		let provider = config.provider.build()?;
		let service = InterventionService::new(provider).with_timeout(config.provider.timeout());
		Ok(Self::new(
			Arc::new(service),
			Arc::new(IdempotencyCache::new(config.cache.ttl())),
			Arc::new(RateLimiter::new(config.rate_limit.clone())),
			config,
		))
	}

	/// The idempotency cache.
	pub fn cache(&self) -> &Arc<IdempotencyCache<StoredResponse>> {
		&self.cache
	}

	/// Starts the background cache sweeper.
	pub fn spawn_sweeper(
		&self,
		interval: std::time::Duration,
		shutdown: CancellationToken,
	) -> tokio::task::JoinHandle<()> {
		spawn_sweeper(Arc::clone(&self.cache), interval, shutdown)
	}
}

/// Builds the router.
pub fn router(state: AppState) -> Router {
	let mut router = Router::new()
		.route("/health", get(health))
		.route("/generate-intervention", post(generate_intervention))
		.route(
			"/api/v1/impetus/generate-intervention",
			post(generate_intervention),
		);
	if state.metrics_enabled {
		router = router.route("/metrics", get(metrics));
	}
	router.with_state(state)
}

#[derive(Serialize)]
struct Health {
	status: &'static str,
	service: &'static str,
	version: &'static str,
}

async fn health() -> Json<Health> {
	Json(Health {
		status: "ok",
		service: SERVICE_NAME,
		version: env!("CARGO_PKG_VERSION"),
	})
}

async fn metrics(State(state): State<AppState>) -> Response {
	(
		[(
			header::CONTENT_TYPE,
			HeaderValue::from_static("text/plain; version=0.0.4"),
		)],
		state.service.metrics().render(),
	)
		.into_response()
}

/// `POST /generate-intervention`.
pub async fn generate_intervention(
	State(state): State<AppState>,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	match handle(state, &headers, &body).await {
		Ok(response) => response,
		Err(error) => {
			debug!(code = error.code(), %error, "request rejected");
			error.into_response()
		}
	}
}

async fn handle(state: AppState, headers: &HeaderMap, body: &[u8]) -> Result<Response, ApiError> {
	check_contract_version(headers, state.min_contract_version)?;
	let key = idempotency_key(headers)?;
	let selection = provider_override(headers)?;
	let request: InterventionRequest =
		serde_json::from_slice(body).map_err(|e| ApiError::InvalidBody(e.to_string()))?;
	if let Err(error) = request.validate()
		&& error.is_schema()
	{
		return Err(ApiError::InvalidBody(error.to_string()));
	}

	if let Some(hit) = state.cache.get(&key) {
		debug!(%key, "idempotent replay");
		return Ok(hit.into_response(true));
	}

	let slot = state.cache.lock_key(&key).await;
	if let Some(hit) = state.cache.get(&key) {
		debug!(%key, "idempotent replay after wait");
		return Ok(hit.into_response(true));
	}

	state.limiter.check(client_id(headers))?;
	let provider = state
		.registry
		.resolve(&selection)?
		.unwrap_or_else(|| state.service.provider());
	if !selection.is_empty() {
		debug!(%key, provider = provider.name(), model = provider.model(), "provider override");
	}

	let AppState {
		service,
		cache,
		cooldown,
		..
	} = state;
	let task = tokio::spawn(async move {
		let _slot = slot;
		let mode = request.mode;
		let stored = match service.generate_with(provider.as_ref(), &request).await {
			Ok(command) => {
				info!(
					%key,
					action = %command.action,
					action_id = %command.action_id,
					%mode,
					"intervention generated"
				);
				StoredResponse::json(StatusCode::OK, &command, Some(cooldown.for_mode(mode)))
			}
			Err(error) => {
				let error = ApiError::from(error);
				StoredResponse::json(error.status_code(), &error.body(), None)
			}
		}?;
		if stored.is_cacheable() {
			cache.set(key, stored.clone());
		}
		Ok::<_, ApiError>(stored)
	});

	let stored = task.await.map_err(|e| ApiError::Internal(e.to_string()))??;
	Ok(stored.into_response(false))
}

fn check_contract_version(headers: &HeaderMap, minimum: ContractVersion) -> Result<(), ApiError> {
	let Some(raw) = headers
		.get(CONTRACT_VERSION)
		.or_else(|| headers.get(X_CONTRACT_VERSION))
	else {
		return Ok(());
	};
	let text = raw
		.to_str()
		.map_err(|_| VersionParseError(String::from_utf8_lossy(raw.as_bytes()).into_owned()))?;
	let requested: ContractVersion = text.parse()?;
	if requested < minimum {
		return Err(ApiError::UnsupportedContractVersion { requested, minimum });
	}
	Ok(())
}

fn idempotency_key(headers: &HeaderMap) -> Result<String, ApiError> {
	let raw = headers
		.get(IDEMPOTENCY_KEY)
		.ok_or(ApiError::MissingIdempotencyKey)?;
	let bytes = raw.as_bytes();
	let valid = (1..=IDEMPOTENCY_KEY_MAX_LEN).contains(&bytes.len())
		&& bytes.iter().all(u8::is_ascii_graphic);
	if !valid {
		return Err(ApiError::InvalidIdempotencyKey);
	}
	raw.to_str()
		.map(str::to_owned)
		.map_err(|_| ApiError::InvalidIdempotencyKey)
}

fn provider_override(headers: &HeaderMap) -> Result<ProviderOverride, ApiError> {
	let text = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
	let provider = headers
		.get(X_LLM_PROVIDER)
		.map(|value| String::from_utf8_lossy(value.as_bytes()));
	ProviderOverride::parse(provider.as_deref(), text(X_LLM_MODEL), text(X_LLM_API_KEY)).map_err(ApiError::from)
}

fn client_id(headers: &HeaderMap) -> &str {
	headers
		.get(CLIENT_ID)
		.and_then(|value| value.to_str().ok())
		.filter(|id| !id.is_empty())
		.unwrap_or(ANONYMOUS_CLIENT)
}
