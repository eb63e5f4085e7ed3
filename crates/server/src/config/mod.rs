//! Server configuration.
//!
//! Sources, later ones winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (`--config`)
//! 3. the environment: `{OPENAI,ANTHROPIC,GEMINI}_API_KEY`, `_MODEL` and
//!    `_BASE_URL` per provider, plus `ENABLE_PROMETHEUS_METRICS`
//! 4. command line flags
//!
//! ```toml
//! bind = "127.0.0.1:8000"
//! min_contract_version = "1.0"
//!
//! [cache]
//! ttl_secs = 15
//! sweep_interval_secs = 30
//!
//! [rate_limit]
//! max_requests = 30
//! window_secs = 60
//!
//! [cooldown]
//! primary_secs = 60
//! chaos_secs = 30
//!
//! [metrics]
//! enabled = false
//!
//! [provider]
//! kind = "anthropic"
//! timeout_secs = 20
//!
//! [provider.anthropic]
//! model = "claude-3-5-haiku-latest"
//! temperature = 0.8
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use impetus_proto::{Action, ContractVersion, Mode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::registry::connect;
use crate::provider::{LlmProvider, ProviderSettings, RegistryError, anthropic, gemini, openai};
use crate::rate_limit::RateLimitConfig;


/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// The config file could not be read.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path that failed to read.
		path: PathBuf,
		/// Underlying error.
		error: std::io::Error,
	},
	/// The config file is not valid TOML for this schema.
	#[error("invalid config {path}: {error}")]
	Parse {
		/// Path that failed to parse.
		path: PathBuf,
		/// Underlying error.
		error: toml::de::Error,
	},
	/// A value is out of range.
	#[error("invalid setting `{field}`: {reason}")]
	Invalid {
		/// Offending field.
		field: &'static str,
		/// What is wrong with it.
		reason: String,
	},
	/// The provider could not be constructed.
	#[error("provider setup failed: {0}")]
	Provider(String),
}

impl ConfigError {
	fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
		Self::Invalid {
			field,
			reason: reason.into(),
		}
	}
}

/// Which provider drafts interventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
	/// Deterministic, offline.
	#[default]
	Debug,
	/// OpenAI-compatible chat completions.
	OpenAi,
	/// Anthropic messages.
	Anthropic,
	/// Google Gemini.
	Gemini,
}

impl ProviderKind {
	/// Every kind, in configuration order.
	pub const ALL: [Self; 4] = [Self::Debug, Self::OpenAi, Self::Anthropic, Self::Gemini];

	/// Configuration name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Debug => "debug",
			Self::OpenAi => "openai",
			Self::Anthropic => "anthropic",
			Self::Gemini => "gemini",
		}
	}

	/// Environment prefix for `_API_KEY`, `_MODEL` and `_BASE_URL`.
	const fn env_prefix(self) -> Option<&'static str> {
		match self {
			Self::Debug => None,
			Self::OpenAi => Some("OPENAI"),
			Self::Anthropic => Some("ANTHROPIC"),
			Self::Gemini => Some("GEMINI"),
		}
	}

	/// Model used when none is configured.
	pub const fn default_model(self) -> &'static str {
		match self {
			Self::Debug => "debug",
			Self::OpenAi => openai::DEFAULT_MODEL,
			Self::Anthropic => anthropic::DEFAULT_MODEL,
			Self::Gemini => gemini::DEFAULT_MODEL,
		}
	}

	const fn default_base_url(self) -> &'static str {
		match self {
			Self::Debug => "",
			Self::OpenAi => openai::DEFAULT_BASE_URL,
			Self::Anthropic => anthropic::DEFAULT_BASE_URL,
			Self::Gemini => gemini::DEFAULT_BASE_URL,
		}
	}

	const fn default_temperature(self) -> f32 {
		match self {
			Self::Debug => 0.0,
			Self::OpenAi => openai::DEFAULT_TEMPERATURE,
			Self::Anthropic => anthropic::DEFAULT_TEMPERATURE,
			Self::Gemini => gemini::DEFAULT_TEMPERATURE,
		}
	}
}

impl fmt::Display for ProviderKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ProviderKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let name = s.trim().to_ascii_lowercase();
		Self::ALL
			.into_iter()
			.find(|kind| kind.as_str() == name)
			.ok_or_else(|| format!("unknown provider `{name}`, expected debug, openai, anthropic or gemini"))
	}
}

/// Idempotency cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
	/// Entry lifetime in seconds.
	pub ttl_secs: u64,
	/// Seconds between background sweeps.
	pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			ttl_secs: 15,
			sweep_interval_secs: 30,
		}
	}
}

impl CacheConfig {
	/// Entry lifetime.
	pub fn ttl(&self) -> Duration {
		Duration::from_secs(self.ttl_secs)
	}

	/// Sweep period.
	pub fn sweep_interval(&self) -> Duration {
		Duration::from_secs(self.sweep_interval_secs)
	}
}

/// `Retrigger-Cooldown` advertised per mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CooldownConfig {
	/// Seconds after a primary intervention.
	pub primary_secs: u64,
	/// Seconds after a chaos intervention.
	pub chaos_secs: u64,
}

impl Default for CooldownConfig {
	fn default() -> Self {
		Self {
			primary_secs: 60,
			chaos_secs: 30,
		}
	}
}

impl CooldownConfig {
	/// Cooldown for `mode`, in seconds.
	pub fn for_mode(&self, mode: Mode) -> u64 {
		match mode {
			Mode::Primary => self.primary_secs,
			Mode::Chaos => self.chaos_secs,
		}
	}
}

/// Settings of one remote provider. Unset fields fall back to the
/// provider's own defaults.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
	/// Server-side credential. Prefer the environment.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub api_key: Option<String>,
	/// Model name.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub model: Option<String>,
	/// API root.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub base_url: Option<String>,
	/// Sampling temperature.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub temperature: Option<f32>,
}

impl fmt::Debug for RemoteConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RemoteConfig")
			.field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
			.field("model", &self.model)
			.field("base_url", &self.base_url)
			.field("temperature", &self.temperature)
			.finish()
	}
}

impl RemoteConfig {
	/// The configured key, if it is not blank.
	pub fn api_key(&self) -> Option<&str> {
		self.api_key.as_deref().map(str::trim).filter(|key| !key.is_empty())
	}
}

/// Provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
	/// Provider used when a request names none.
	pub kind: ProviderKind,
	/// Bound on one provider call, in seconds.
	pub timeout_secs: u64,
	/// Action the debug provider always proposes.
	pub debug_action: Action,
	/// OpenAI settings.
	pub openai: RemoteConfig,
	/// Anthropic settings.
	pub anthropic: RemoteConfig,
	/// Gemini settings.
	pub gemini: RemoteConfig,
}

impl Default for ProviderConfig {
	fn default() -> Self {
		Self {
			kind: ProviderKind::Debug,
			timeout_secs: 20,
			debug_action: Action::Provoke,
			openai: RemoteConfig::default(),
			anthropic: RemoteConfig::default(),
			gemini: RemoteConfig::default(),
		}
	}
}

impl ProviderConfig {
	/// Bound on one provider call.
	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout_secs)
	}

	/// Settings table of `kind`; `None` for the debug provider.
	pub fn remote(&self, kind: ProviderKind) -> Option<&RemoteConfig> {
		match kind {
			ProviderKind::Debug => None,
			ProviderKind::OpenAi => Some(&self.openai),
			ProviderKind::Anthropic => Some(&self.anthropic),
			ProviderKind::Gemini => Some(&self.gemini),
		}
	}

	fn remote_mut(&mut self, kind: ProviderKind) -> Option<&mut RemoteConfig> {
		match kind {
			ProviderKind::Debug => None,
			ProviderKind::OpenAi => Some(&mut self.openai),
			ProviderKind::Anthropic => Some(&mut self.anthropic),
			ProviderKind::Gemini => Some(&mut self.gemini),
		}
	}

	/// Model `kind` uses unless a request overrides it.
	pub fn model(&self, kind: ProviderKind) -> String {
		self.remote(kind)
			.and_then(|remote| remote.model.clone())
			.unwrap_or_else(|| kind.default_model().to_owned())
	}

	/// Resolved connection settings for `kind`.
	///
	/// `model` and `api_key` replace the configured values when given.
	/// Returns `None` for the debug provider and for a remote provider
	/// without any key.
	pub fn settings(
		&self,
		kind: ProviderKind,
		model: Option<&str>,
		api_key: Option<&str>,
	) -> Option<ProviderSettings> {
		let remote = self.remote(kind)?;
		let api_key = api_key.or_else(|| remote.api_key())?;
		Some(ProviderSettings {
			api_key: api_key.to_owned(),
			model: model.map_or_else(|| self.model(kind), str::to_owned),
			base_url: remote
				.base_url
				.clone()
				.unwrap_or_else(|| kind.default_base_url().to_owned()),
			temperature: remote.temperature.unwrap_or(kind.default_temperature()),
			request_timeout: self.timeout(),
		})
	}

	/// Builds the default provider.
	pub fn build(&self) -> Result<Arc<dyn LlmProvider>, ConfigError> {
		connect(self, self.kind, None, None).map_err(|error| match error {
			RegistryError::NotConfigured(_) => missing_key(self.kind),
			other => ConfigError::Provider(other.to_string()),
		})
	}
}

fn missing_key(kind: ProviderKind) -> ConfigError {
	let field = match kind {
		ProviderKind::Anthropic => "provider.anthropic.api_key",
		ProviderKind::Gemini => "provider.gemini.api_key",
		_ => "provider.openai.api_key",
	};
	let env = kind.env_prefix().unwrap_or("OPENAI");
	ConfigError::invalid(field, format!("required for {kind} (set {env}_API_KEY)"))
}

/// LLM call metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
	/// Serves `GET /metrics`. Calls are logged either way.
	pub enabled: bool,
}

/// Complete server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
	/// Listen address.
	pub bind: SocketAddr,
	/// Oldest `Contract-Version` accepted.
	pub min_contract_version: ContractVersion,
	/// Idempotency cache.
	pub cache: CacheConfig,
	/// Per-client rate limiting.
	pub rate_limit: RateLimitConfig,
	/// Advertised cooldowns.
	pub cooldown: CooldownConfig,
	/// Draft providers.
	pub provider: ProviderConfig,
	/// LLM call metrics.
	pub metrics: MetricsConfig,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
			min_contract_version: ContractVersion::new(1, 0, 0),
			cache: CacheConfig::default(),
			rate_limit: RateLimitConfig::default(),
			cooldown: CooldownConfig::default(),
			provider: ProviderConfig::default(),
			metrics: MetricsConfig::default(),
		}
	}
}

impl ServerConfig {
	/// Reads `path`, or returns defaults without one.
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		let Some(path) = path else {
			return Ok(Self::default());
		};
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_owned(),
			error,
		})?;
		toml::from_str(&text).map_err(|error| ConfigError::Parse {
			path: path.to_owned(),
			error,
		})
	}

	/// Applies provider settings found through `var`.
	///
	/// `var` is usually `|name| std::env::var(name).ok()`.
	pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
		for kind in ProviderKind::ALL {
			let (Some(prefix), Some(remote)) = (kind.env_prefix(), self.provider.remote_mut(kind)) else {
				continue;
			};
			if let Some(key) = var(&format!("{prefix}_API_KEY")) {
				remote.api_key = Some(key);
			}
			if let Some(model) = var(&format!("{prefix}_MODEL")) {
				remote.model = Some(model);
			}
			if let Some(base_url) = var(&format!("{prefix}_BASE_URL")) {
				remote.base_url = Some(base_url);
			}
		}
		if let Some(flag) = var("ENABLE_PROMETHEUS_METRICS") {
			self.metrics.enabled = matches!(
				flag.trim().to_ascii_lowercase().as_str(),
				"1" | "true" | "yes" | "on"
			);
		}
	}

	/// Rejects settings the server cannot run with.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.cache.ttl_secs == 0 {
			return Err(ConfigError::invalid("cache.ttl_secs", "must be positive"));
		}
		if self.cache.sweep_interval_secs == 0 {
			return Err(ConfigError::invalid("cache.sweep_interval_secs", "must be positive"));
		}
		if self.rate_limit.window_secs == 0 {
			return Err(ConfigError::invalid("rate_limit.window_secs", "must be positive"));
		}
		if self.rate_limit.max_requests == 0 {
			return Err(ConfigError::invalid("rate_limit.max_requests", "must be positive"));
		}
		if self.rate_limit.max_tracked_clients == 0 {
			return Err(ConfigError::invalid(
				"rate_limit.max_tracked_clients",
				"must be positive",
			));
		}
		if self.provider.timeout_secs == 0 {
			return Err(ConfigError::invalid("provider.timeout_secs", "must be positive"));
		}
		if self.min_contract_version > ContractVersion::CURRENT {
			return Err(ConfigError::invalid(
				"min_contract_version",
				format!(
					"{} is newer than the implemented {}",
					self.min_contract_version,
					ContractVersion::CURRENT
				),
			));
		}
		let kind = self.provider.kind;
		if let Some(remote) = self.provider.remote(kind)
			&& remote.api_key().is_none()
		{
			return Err(missing_key(kind));
		}
		Ok(())
	}
}
