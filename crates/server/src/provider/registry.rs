//! Per-request provider selection.
//!
//! A request may name a provider, a model and its own key through the
//! `X-LLM-Provider`, `X-LLM-Model` and `X-LLM-Api-Key` headers. Without any of
//! them the service's default provider answers. Providers built from server
//! keys are cached per provider and model; providers built from a caller's key
//! are never cached.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use super::{AnthropicProvider, DebugProvider, GeminiProvider, LlmProvider, OpenAiProvider, ProviderError};
use crate::config::{ProviderConfig, ProviderKind};

/// Why no provider could be selected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
	/// `X-LLM-Provider` names no known provider.
	#[error("unsupported provider `{0}`")]
	Unsupported(String),
	/// Neither the server nor the request supplies a key.
	#[error("no API key configured for {0}; send X-LLM-Api-Key")]
	NotConfigured(ProviderKind),
	/// The provider client could not be built.
	#[error(transparent)]
	Setup(#[from] ProviderError),
}

/// Provider selection carried by one request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderOverride {
	/// Requested provider; the configured default when absent.
	pub provider: Option<ProviderKind>,
	/// Requested model.
	pub model: Option<String>,
	/// Caller's own key.
	pub api_key: Option<String>,
}

impl ProviderOverride {
	/// Reads raw header values. Blank values count as absent.
	pub fn parse(
		provider: Option<&str>,
		model: Option<&str>,
		api_key: Option<&str>,
	) -> Result<Self, RegistryError> {
		let provider = normalize(provider)
			.map(|name| name.parse::<ProviderKind>().map_err(|_| RegistryError::Unsupported(name)))
			.transpose()?;
		Ok(Self {
			provider,
			model: normalize(model),
			api_key: normalize(api_key),
		})
	}

	/// True when the request selects nothing.
	pub fn is_empty(&self) -> bool {
		self.provider.is_none() && self.model.is_none() && self.api_key.is_none()
	}
}

impl std::fmt::Debug for ProviderOverride {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ProviderOverride")
			.field("provider", &self.provider)
			.field("model", &self.model)
			.field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

fn normalize(value: Option<&str>) -> Option<String> {
	value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned)
}

/// Builds a provider of `kind` from `config`.
///
/// `model` and `api_key` replace the configured values when given.
pub fn connect(
	config: &ProviderConfig,
	kind: ProviderKind,
	model: Option<&str>,
	api_key: Option<&str>,
) -> Result<Arc<dyn LlmProvider>, RegistryError> {
	let settings = || {
		config
			.settings(kind, model, api_key)
			.ok_or(RegistryError::NotConfigured(kind))
	};
	let provider: Arc<dyn LlmProvider> = match kind {
		ProviderKind::Debug => Arc::new(DebugProvider::new(config.debug_action)),
		ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(settings()?)?),
		ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(settings()?)?),
		ProviderKind::Gemini => Arc::new(GeminiProvider::new(settings()?)?),
	};
	Ok(provider)
}

/// Resolves request overrides into providers.
pub struct ProviderRegistry {
	config: ProviderConfig,
	cached: Mutex<HashMap<(ProviderKind, String), Arc<dyn LlmProvider>>>,
}

impl ProviderRegistry {
	/// A registry over the server's provider settings.
	pub fn new(config: ProviderConfig) -> Self {
		Self {
			config,
			cached: Mutex::new(HashMap::new()),
		}
	}

	/// Provider used when a request names none.
	pub fn default_kind(&self) -> ProviderKind {
		self.config.kind
	}

	/// The provider `selection` asks for, or `None` to use the default.
	pub fn resolve(&self, selection: &ProviderOverride) -> Result<Option<Arc<dyn LlmProvider>>, RegistryError> {
		if selection.is_empty() {
			return Ok(None);
		}
		let kind = selection.provider.unwrap_or(self.config.kind);

		if let Some(api_key) = selection.api_key.as_deref() {
			debug!(provider = %kind, model = ?selection.model, "registry.byok");
			return connect(&self.config, kind, selection.model.as_deref(), Some(api_key)).map(Some);
		}

		let model = selection
			.model
			.clone()
			.unwrap_or_else(|| self.config.model(kind));
		if let Some(hit) = self.cached.lock().get(&(kind, model.clone())) {
			return Ok(Some(Arc::clone(hit)));
		}
		let provider = connect(&self.config, kind, Some(&model), None)?;
		debug!(provider = %kind, %model, "registry.build");
		self.cached
			.lock()
			.insert((kind, model), Arc::clone(&provider));
		Ok(Some(provider))
	}
}

impl std::fmt::Debug for ProviderRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ProviderRegistry")
			.field("default_kind", &self.config.kind)
			.field("cached", &self.cached.lock().len())
			.finish()
	}
}
