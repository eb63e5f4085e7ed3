//! Google Gemini `generateContent` provider.

use async_trait::async_trait;
use impetus_proto::InterventionRequest;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Draft, LlmProvider, ProviderError, ProviderSettings, parse_draft, send, system_prompt};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-lite";
/// Public API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Sampling temperature used when none is configured.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

const MAX_OUTPUT_TOKENS: u32 = 512;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
	system_instruction: Parts<'a>,
	contents: [UserContent<'a>; 1],
	generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Parts<'a> {
	parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
	text: &'a str,
}

#[derive(Serialize)]
struct UserContent<'a> {
	role: &'static str,
	parts: [Part<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
	temperature: f32,
	max_output_tokens: u32,
	response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
	#[serde(default)]
	candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
	#[serde(default)]
	content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
	#[serde(default)]
	parts: Vec<ReplyPart>,
}

#[derive(Deserialize)]
struct ReplyPart {
	#[serde(default)]
	text: Option<String>,
}

/// Provider backed by the Gemini `models/{model}:generateContent` endpoint.
///
/// The key travels in the `x-goog-api-key` header, never in the URL.
#[derive(Clone)]
pub struct GeminiProvider {
	client: Client,
	settings: ProviderSettings,
}

impl GeminiProvider {
	/// Builds the HTTP client.
	pub fn new(settings: ProviderSettings) -> Result<Self, ProviderError> {
		Ok(Self {
			client: settings.client()?,
			settings,
		})
	}
}

impl std::fmt::Debug for GeminiProvider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GeminiProvider")
			.field("model", &self.settings.model)
			.field("base_url", &self.settings.base_url)
			.finish_non_exhaustive()
	}
}

/// Extracts the draft from the first non-empty text part of the first candidate.
pub(super) fn parse_generation(body: &[u8]) -> Result<Draft, ProviderError> {
	let response: GenerateResponse = serde_json::from_slice(body)
		.map_err(|e| ProviderError::Malformed(format!("invalid generation: {e}")))?;
	let text = response
		.candidates
		.into_iter()
		.next()
		.and_then(|candidate| candidate.content)
		.and_then(|content| {
			content
				.parts
				.into_iter()
				.filter_map(|part| part.text)
				.find(|text| !text.is_empty())
		})
		.ok_or_else(|| ProviderError::Malformed("generation has no text".into()))?;
	parse_draft(&text)
}

#[async_trait]
impl LlmProvider for GeminiProvider {
	fn name(&self) -> &'static str {
		"gemini"
	}

	fn model(&self) -> &str {
		&self.settings.model
	}

	async fn draft(&self, request: &InterventionRequest) -> Result<Draft, ProviderError> {
		let body = GenerateRequest {
			system_instruction: Parts {
				parts: [Part {
					text: system_prompt(request.mode),
				}],
			},
			contents: [UserContent {
				role: "user",
				parts: [Part {
					text: &request.context,
				}],
			}],
			generation_config: GenerationConfig {
				temperature: self.settings.temperature,
				max_output_tokens: MAX_OUTPUT_TOKENS,
				response_mime_type: "application/json",
			},
		};

		let path = format!("models/{}:generateContent", self.settings.model);
		let call = self
			.client
			.post(self.settings.endpoint(&path))
			.header("x-goog-api-key", &self.settings.api_key)
			.json(&body);
		let bytes = send(call, self.settings.request_timeout).await?;
		let draft = parse_generation(&bytes)?;
		debug!(action = %draft.action, model = %self.settings.model, "provider.draft");
		Ok(draft)
	}
}
