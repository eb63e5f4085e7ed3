//! Anthropic Messages API provider.

use async_trait::async_trait;
use impetus_proto::InterventionRequest;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Draft, LlmProvider, ProviderError, ProviderSettings, parse_draft, send, system_prompt};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
/// Public API root.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
/// Sampling temperature used when none is configured.
pub const DEFAULT_TEMPERATURE: f32 = 0.8;

/// `anthropic-version` header value.
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 400;

#[derive(Serialize)]
struct MessagesRequest<'a> {
	model: &'a str,
	max_tokens: u32,
	temperature: f32,
	system: &'a str,
	messages: [UserMessage<'a>; 1],
}

#[derive(Serialize)]
struct UserMessage<'a> {
	role: &'static str,
	content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
	#[serde(default)]
	content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
	#[serde(rename = "type")]
	kind: String,
	#[serde(default)]
	text: Option<String>,
}

/// Provider backed by the Anthropic `/messages` endpoint.
#[derive(Clone)]
pub struct AnthropicProvider {
	client: Client,
	settings: ProviderSettings,
}

impl AnthropicProvider {
	/// Builds the HTTP client.
	pub fn new(settings: ProviderSettings) -> Result<Self, ProviderError> {
		Ok(Self {
			client: settings.client()?,
			settings,
		})
	}
}

impl std::fmt::Debug for AnthropicProvider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AnthropicProvider")
			.field("model", &self.settings.model)
			.field("base_url", &self.settings.base_url)
			.finish_non_exhaustive()
	}
}

/// Extracts the draft from the first text block of a message.
pub(super) fn parse_message(body: &[u8]) -> Result<Draft, ProviderError> {
	let response: MessagesResponse = serde_json::from_slice(body)
		.map_err(|e| ProviderError::Malformed(format!("invalid message: {e}")))?;
	let text = response
		.content
		.into_iter()
		.filter(|block| block.kind == "text")
		.find_map(|block| block.text)
		.ok_or_else(|| ProviderError::Malformed("message has no text block".into()))?;
	parse_draft(&text)
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
	fn name(&self) -> &'static str {
		"anthropic"
	}

	fn model(&self) -> &str {
		&self.settings.model
	}

	async fn draft(&self, request: &InterventionRequest) -> Result<Draft, ProviderError> {
		let body = MessagesRequest {
			model: &self.settings.model,
			max_tokens: MAX_TOKENS,
			temperature: self.settings.temperature,
			system: system_prompt(request.mode),
			messages: [UserMessage {
				role: "user",
				content: &request.context,
			}],
		};

		let call = self
			.client
			.post(self.settings.endpoint("messages"))
			.header("x-api-key", &self.settings.api_key)
			.header("anthropic-version", API_VERSION)
			.json(&body);
		let bytes = send(call, self.settings.request_timeout).await?;
		let draft = parse_message(&bytes)?;
		debug!(action = %draft.action, model = %self.settings.model, "provider.draft");
		Ok(draft)
	}
}
