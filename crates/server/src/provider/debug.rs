use async_trait::async_trait;
use impetus_proto::{Action, InterventionRequest};

use super::{Draft, LlmProvider, ProviderError};

/// Characters of context echoed back in a debug draft.
const SNIPPET_CHARS: usize = 40;

/// Deterministic provider with no network access.
///
/// Always proposes the configured action, echoing the tail of the context
/// as content.
#[derive(Debug, Clone, Copy)]
pub struct DebugProvider {
	action: Action,
}

impl DebugProvider {
	/// A provider that always proposes `action`.
	pub fn new(action: Action) -> Self {
		Self { action }
	}
}

impl Default for DebugProvider {
	fn default() -> Self {
		Self::new(Action::Provoke)
	}
}

#[async_trait]
impl LlmProvider for DebugProvider {
	fn name(&self) -> &'static str {
		"debug"
	}

	async fn draft(&self, request: &InterventionRequest) -> Result<Draft, ProviderError> {
		let len = request.context_chars();
		let snippet: String = request
			.context
			.chars()
			.skip(len.saturating_sub(SNIPPET_CHARS))
			.collect();
		let content = format!("> [debug - {}]: {}", request.mode, snippet.trim());

		Ok(match self.action {
			Action::Provoke => Draft::provoke(content),
			Action::Rewrite => Draft::rewrite(content),
			Action::Delete => Draft::delete(),
		})
	}
}
