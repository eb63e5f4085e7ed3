//! Intervention decision service.
//!
//! Asks the provider for a draft, then applies the rules no provider can
//! override:
//!
//! - `primary` mode only ever provokes;
//! - a destructive draft on a context shorter than
//!   [`SAFETY_THRESHOLD_CHARS`] becomes a provoke with synthesized content;
//! - anchors are computed here from the client cursor;
//! - action ids, lock ids and timestamps are always minted here.

use std::sync::Arc;
use std::time::Duration;

use impetus_proto::{
	Action, Anchor, InterventionRequest, Mode, MutationCommand, RequestError,
};
use thiserror::Error;
use tokio::time::Instant;
use tracing::info;

use crate::metrics::{LlmCall, LlmMetrics};
use crate::provider::{Draft, LlmProvider, ProviderError};

pub mod text_window;

#[cfg(test)]
mod tests;

/// Contexts shorter than this, in characters, never get a destructive action.
pub const SAFETY_THRESHOLD_CHARS: usize = 50;
/// Content of a provoke forced by the safety guard.
pub const OVERRIDE_CONTENT: &str = "> [pressure - guard]: too little text yet, keep writing.";
/// Content of a provoke replacing a primary-mode delete.
pub const PRIMARY_FALLBACK_CONTENT: &str = "> [pressure - primary]: what if the opposite were true?";
/// Default bound on a provider call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(20);

/// Log target for overrides.
pub const AUDIT_TARGET: &str = "impetus::audit";

/// Why no command was produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
	/// The request is not acceptable.
	#[error(transparent)]
	Request(#[from] RequestError),
	/// The provider failed.
	#[error(transparent)]
	Provider(#[from] ProviderError),
}

impl ServiceError {
	/// Returns true if retrying the same request may succeed.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Provider(_))
	}
}

/// Produces mutation commands from requests.
pub struct InterventionService {
	provider: Arc<dyn LlmProvider>,
	timeout: Duration,
	metrics: Arc<LlmMetrics>,
}

impl InterventionService {
	/// Creates a service with the default provider timeout.
	pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
		Self {
			provider,
			timeout: DEFAULT_PROVIDER_TIMEOUT,
			metrics: Arc::new(LlmMetrics::new()),
		}
	}

	/// Bounds every provider call by `timeout`.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	/// Counts provider calls into `metrics`.
	pub fn with_metrics(mut self, metrics: Arc<LlmMetrics>) -> Self {
		self.metrics = metrics;
		self
	}

	/// Name of the default provider.
	pub fn provider_name(&self) -> &'static str {
		self.provider.name()
	}

	/// The default provider.
	pub fn provider(&self) -> Arc<dyn LlmProvider> {
		Arc::clone(&self.provider)
	}

	/// Provider call counters.
	pub fn metrics(&self) -> &Arc<LlmMetrics> {
		&self.metrics
	}

	/// Validates `request`, drafts with the default provider and applies the rules.
	pub async fn generate(&self, request: &InterventionRequest) -> Result<MutationCommand, ServiceError> {
		self.generate_with(self.provider.as_ref(), request).await
	}

	/// Like [`generate`](Self::generate), drafting with `provider`.
	pub async fn generate_with(
		&self,
		provider: &dyn LlmProvider,
		request: &InterventionRequest,
	) -> Result<MutationCommand, ServiceError> {
		request.validate()?;

		let started = Instant::now();
		let outcome = tokio::time::timeout(self.timeout, provider.draft(request))
			.await
			.map_err(|_| ProviderError::Timeout(self.timeout))
			.and_then(|draft| draft)
			.and_then(|draft| draft.validate().map(|()| draft));
		self.metrics.record(&LlmCall {
			provider: provider.name(),
			model: provider.model(),
			mode: request.mode,
			elapsed: started.elapsed(),
			error: outcome.as_ref().err(),
		});

		Ok(decide(request, outcome?))
	}
}

impl std::fmt::Debug for InterventionService {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InterventionService")
			.field("provider", &self.provider.name())
			.field("timeout", &self.timeout)
			.finish_non_exhaustive()
	}
}

/// Turns a validated draft into a command for `request`.
pub fn decide(request: &InterventionRequest, draft: Draft) -> MutationCommand {
	let mode = request.mode;
	let proposed = draft.action;
	let mut action = proposed;
	let mut content = draft.content;

	if mode == Mode::Primary && action != Action::Provoke {
		info!(
			target: AUDIT_TARGET,
			%proposed,
			"primary mode draft coerced to provoke"
		);
		if action == Action::Delete {
			content = Some(PRIMARY_FALLBACK_CONTENT.to_owned());
		}
		action = Action::Provoke;
	}

	let context_chars = request.context_chars();
	if action.is_destructive() && context_chars < SAFETY_THRESHOLD_CHARS {
		info!(
			target: AUDIT_TARGET,
			%proposed,
			context_chars,
			threshold = SAFETY_THRESHOLD_CHARS,
			"safety override: destructive draft on short context"
		);
		return safety_provoke(request);
	}

	let cursor = request.cursor();
	match action {
		Action::Provoke => MutationCommand::provoke(
			content.unwrap_or_else(|| PRIMARY_FALLBACK_CONTENT.to_owned()),
			Some(Anchor::pos(cursor)),
			mode,
		),
		Action::Delete | Action::Rewrite => {
			let (from, to) = text_window::last_sentence_range(cursor, &request.context);
			if from == to {
				info!(
					target: AUDIT_TARGET,
					%proposed,
					cursor,
					"safety override: nothing before the cursor"
				);
				return safety_provoke(request);
			}
			let anchor = Anchor::range(from, to);
			match (action, content) {
				(Action::Rewrite, Some(content)) => MutationCommand::rewrite(content, anchor, mode),
				_ => MutationCommand::delete(anchor, mode),
			}
		}
	}
}

fn safety_provoke(request: &InterventionRequest) -> MutationCommand {
	MutationCommand::provoke(
		OVERRIDE_CONTENT,
		Some(Anchor::pos(request.selection_from())),
		request.mode,
	)
}
