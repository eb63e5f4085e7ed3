use impetus_primitives::{CharIdx, Source};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on `context`, in characters.
pub const CONTEXT_MAX_CHARS: usize = 2000;

/// Decision policy requested by the client.
pub type Mode = Source;

/// Body of `POST /generate-intervention`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterventionRequest {
	/// Text before the cursor.
	pub context: String,
	/// Requested policy.
	pub mode: Mode,
	/// Editor state at request time.
	#[serde(default, alias = "clientMeta", skip_serializing_if = "Option::is_none")]
	pub client_meta: Option<ClientMeta>,
}

/// Editor state reported alongside a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMeta {
	/// Client document version.
	#[serde(alias = "docVersion")]
	pub doc_version: u64,
	/// Selection start (or cursor).
	#[serde(alias = "selectionFrom")]
	pub selection_from: CharIdx,
	/// Selection end (equal to `selection_from` without a selection).
	#[serde(alias = "selectionTo")]
	pub selection_to: CharIdx,
}

impl InterventionRequest {
	/// Length of `context` in characters.
	pub fn context_chars(&self) -> usize {
		self.context.chars().count()
	}

	/// Where new content goes: the selection end, or 0 without metadata.
	pub fn cursor(&self) -> CharIdx {
		self.client_meta.map_or(0, |meta| meta.selection_to)
	}

	/// The selection start, or 0 without metadata.
	pub fn selection_from(&self) -> CharIdx {
		self.client_meta.map_or(0, |meta| meta.selection_from)
	}

	/// Checks constraints serde cannot express.
	pub fn validate(&self) -> Result<(), RequestError> {
		let len = self.context_chars();
		if len == 0 {
			return Err(RequestError::EmptyContext);
		}
		if len > CONTEXT_MAX_CHARS {
			return Err(RequestError::ContextTooLong { len });
		}
		if let Some(meta) = self.client_meta
			&& meta.selection_from > meta.selection_to
		{
			return Err(RequestError::InvertedSelection {
				from: meta.selection_from,
				to: meta.selection_to,
			});
		}
		Ok(())
	}
}

/// A request body that parsed but is not acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestError {
	/// `context` is empty.
	#[error("context must not be empty")]
	EmptyContext,
	/// `context` exceeds [`CONTEXT_MAX_CHARS`].
	#[error("context has {len} characters, limit is {CONTEXT_MAX_CHARS}")]
	ContextTooLong {
		/// Actual length in characters.
		len: usize,
	},
	/// The reported selection is inverted.
	#[error("selection_from {from} is after selection_to {to}")]
	InvertedSelection {
		/// Reported start.
		from: CharIdx,
		/// Reported end.
		to: CharIdx,
	},
}

impl RequestError {
	/// Returns true for shape violations; false for semantic ones.
	pub fn is_schema(&self) -> bool {
		!matches!(self, Self::InvertedSelection { .. })
	}
}
