//! OpenAI-compatible chat completions provider.

use async_trait::async_trait;
use impetus_proto::InterventionRequest;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Draft, LlmProvider, ProviderError, ProviderSettings, parse_draft, send, system_prompt};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Public API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Sampling temperature used when none is configured.
pub const DEFAULT_TEMPERATURE: f32 = 0.9;

#[derive(Serialize)]
struct ChatRequest<'a> {
	model: &'a str,
	temperature: f32,
	response_format: ResponseFormat,
	messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ResponseFormat {
	#[serde(rename = "type")]
	kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
	role: &'static str,
	content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
	choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
	message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
	content: Option<String>,
}

/// Provider backed by an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiProvider {
	client: Client,
	settings: ProviderSettings,
}

impl OpenAiProvider {
	/// Builds the HTTP client.
	pub fn new(settings: ProviderSettings) -> Result<Self, ProviderError> {
		Ok(Self {
			client: settings.client()?,
			settings,
		})
	}
}

impl std::fmt::Debug for OpenAiProvider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OpenAiProvider")
			.field("model", &self.settings.model)
			.field("base_url", &self.settings.base_url)
			.finish_non_exhaustive()
	}
}

/// Extracts the draft from a chat completion body.
pub(super) fn parse_completion(body: &[u8]) -> Result<Draft, ProviderError> {
	let response: ChatResponse = serde_json::from_slice(body)
		.map_err(|e| ProviderError::Malformed(format!("invalid completion: {e}")))?;
	let content = response
		.choices
		.into_iter()
		.next()
		.and_then(|choice| choice.message.content)
		.ok_or_else(|| ProviderError::Malformed("completion has no content".into()))?;
	parse_draft(&content)
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
	fn name(&self) -> &'static str {
		"openai"
	}

	fn model(&self) -> &str {
		&self.settings.model
	}

	async fn draft(&self, request: &InterventionRequest) -> Result<Draft, ProviderError> {
		let body = ChatRequest {
			model: &self.settings.model,
			temperature: self.settings.temperature,
			response_format: ResponseFormat { kind: "json_object" },
			messages: [
				ChatMessage {
					role: "system",
					content: system_prompt(request.mode),
				},
				ChatMessage {
					role: "user",
					content: &request.context,
				},
			],
		};

		let call = self
			.client
			.post(self.settings.endpoint("chat/completions"))
			.bearer_auth(&self.settings.api_key)
			.json(&body);
		let bytes = send(call, self.settings.request_timeout).await?;
		let draft = parse_completion(&bytes)?;
		debug!(action = %draft.action, model = %self.settings.model, "provider.draft");
		Ok(draft)
	}
}
