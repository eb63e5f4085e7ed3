//! Content-generation providers.
//!
//! A provider only drafts *what* to do (`action` and `content`). Anchors,
//! ids and timestamps are decided by the service, never taken from the
//! provider.

use std::time::Duration;

use async_trait::async_trait;
use impetus_proto::{Action, InterventionRequest, Mode};
use reqwest::RequestBuilder;
use serde::Deserialize;
use thiserror::Error;

pub mod anthropic;
mod debug;
pub mod gemini;
pub mod openai;
pub mod registry;


pub use anthropic::AnthropicProvider;
pub use debug::DebugProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use registry::{ProviderOverride, ProviderRegistry, RegistryError};

/// Longest upstream error body kept in a [`ProviderError::Status`].
const ERROR_BODY_CHARS: usize = 512;

const PRIMARY_PROMPT: &str = "You apply creative pressure to a writer who is stuck. \
Reply with a JSON object {\"action\": \"provoke\", \"content\": string}. \
The content is one or two sentences starting with \"> [pressure - primary]: \" \
that introduce an unexpected turn. Never encourage, summarize or advise. \
Answer in the language of the text.";

const CHAOS_PROMPT: &str = "You apply unpredictable pressure to a writer. \
Reply with a JSON object whose action is \"provoke\", \"rewrite\" or \"delete\". \
provoke and rewrite carry a \"content\" string of one or two sentences starting \
with \"> [pressure - chaos]: \"; delete carries no content and removes the last \
sentence. Never explain the choice. Answer in the language of the text.";

/// Connection settings shared by every remote provider.
#[derive(Clone, PartialEq)]
pub struct ProviderSettings {
	/// Credential sent upstream.
	pub api_key: String,
	/// Model name.
	pub model: String,
	/// API root.
	pub base_url: String,
	/// Sampling temperature.
	pub temperature: f32,
	/// Per-request HTTP timeout.
	pub request_timeout: Duration,
}

impl std::fmt::Debug for ProviderSettings {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ProviderSettings")
			.field("api_key", &"<redacted>")
			.field("model", &self.model)
			.field("base_url", &self.base_url)
			.field("temperature", &self.temperature)
			.field("request_timeout", &self.request_timeout)
			.finish()
	}
}

impl ProviderSettings {
	/// `base_url` without a trailing slash, followed by `path`.
	fn endpoint(&self, path: &str) -> String {
		format!("{}/{path}", self.base_url.trim_end_matches('/'))
	}

	fn client(&self) -> Result<reqwest::Client, ProviderError> {
		reqwest::Client::builder()
			.timeout(self.request_timeout)
			.build()
			.map_err(|e| ProviderError::Transport(e.to_string()))
	}
}

fn system_prompt(mode: Mode) -> &'static str {
	match mode {
		Mode::Primary => PRIMARY_PROMPT,
		Mode::Chaos => CHAOS_PROMPT,
	}
}

/// Sends `request` and returns the body of a successful response.
async fn send(request: RequestBuilder, timeout: Duration) -> Result<Vec<u8>, ProviderError> {
	let response = request.send().await.map_err(|e| {
		if e.is_timeout() {
			ProviderError::Timeout(timeout)
		} else {
			ProviderError::Transport(e.to_string())
		}
	})?;

	let status = response.status();
	if !status.is_success() {
		let text = response.text().await.unwrap_or_default();
		return Err(ProviderError::Status {
			status: status.as_u16(),
			body: text.chars().take(ERROR_BODY_CHARS).collect(),
		});
	}

	response
		.bytes()
		.await
		.map(|body| body.to_vec())
		.map_err(|e| ProviderError::Transport(e.to_string()))
}

/// Parses the JSON draft a model wrote as its text answer.
fn parse_draft(text: &str) -> Result<Draft, ProviderError> {
	let draft: Draft = serde_json::from_str(text.trim())
		.map_err(|e| ProviderError::Malformed(format!("invalid draft: {e}")))?;
	draft.validate()?;
	Ok(draft)
}

/// A provider's proposal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Draft {
	/// Proposed action.
	pub action: Action,
	/// Proposed content; ignored for delete.
	#[serde(default)]
	pub content: Option<String>,
}

impl Draft {
	/// A provoke draft.
	pub fn provoke(content: impl Into<String>) -> Self {
		Self {
			action: Action::Provoke,
			content: Some(content.into()),
		}
	}

	/// A rewrite draft.
	pub fn rewrite(content: impl Into<String>) -> Self {
		Self {
			action: Action::Rewrite,
			content: Some(content.into()),
		}
	}

	/// A delete draft.
	pub fn delete() -> Self {
		Self {
			action: Action::Delete,
			content: None,
		}
	}

	/// Rejects drafts missing the content their action needs.
	pub fn validate(&self) -> Result<(), ProviderError> {
		let blank = self.content.as_deref().is_none_or(|c| c.trim().is_empty());
		if self.action.creates_lock() && blank {
			return Err(ProviderError::Malformed(format!(
				"{} draft without content",
				self.action
			)));
		}
		Ok(())
	}
}

/// Provider failure. Every variant is worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
	/// The provider did not answer in time.
	#[error("provider timed out after {}s", .0.as_secs())]
	Timeout(Duration),
	/// The request never completed.
	#[error("provider transport error: {0}")]
	Transport(String),
	/// The upstream answered with a non-success status.
	#[error("provider returned status {status}: {body}")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Response body, truncated.
		body: String,
	},
	/// The answer did not match the draft schema.
	#[error("malformed provider output: {0}")]
	Malformed(String),
}

impl ProviderError {
	/// Short code for call logs and metrics.
	pub fn code(&self) -> &'static str {
		match self {
			Self::Timeout(_) => "timeout",
			Self::Transport(_) => "transport",
			Self::Status { .. } => "upstream_status",
			Self::Malformed(_) => "malformed",
		}
	}
}

/// Drafts an intervention for a request.
#[async_trait]
pub trait LlmProvider: Send + Sync {
	/// Short name used in logs and configuration.
	fn name(&self) -> &'static str;

	/// Model reported in call logs.
	fn model(&self) -> &str {
		self.name()
	}

	/// Proposes an action for `request`.
	async fn draft(&self, request: &InterventionRequest) -> Result<Draft, ProviderError>;
}
