//! Edit operation types: commit requests, policies, results and errors.

use thiserror::Error;

use crate::range::CharLen;
use crate::transaction::Transaction;

/// How a commit interacts with undo history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UndoPolicy {
	/// Record the inverse as a new undo step and clear redo.
	#[default]
	Record,
	/// Apply without recording; existing history is rebased over the edit.
	NoUndo,
}

/// Who asked for an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOrigin {
	/// Interactive user edit.
	User,
	/// Replay of an undo step.
	Undo,
	/// Replay of a redo step.
	Redo,
	/// Backend-issued mutation, tagged with the operation name.
	Mutator(&'static str),
	/// Internal housekeeping, tagged with a reason.
	Internal(&'static str),
}

impl EditOrigin {
	/// Returns true for edits that must bypass the mutation guard.
	pub fn is_privileged(self) -> bool {
		matches!(self, Self::Mutator(_) | Self::Internal(_))
	}
}

/// A request to apply a transaction through the document commit gate.
#[derive(Debug, Clone)]
pub struct EditCommit {
	/// The transaction to apply.
	pub tx: Transaction,
	/// Undo behavior.
	pub undo: UndoPolicy,
	/// Edit provenance.
	pub origin: EditOrigin,
}

impl EditCommit {
	/// A user edit recorded in history.
	pub fn user(tx: Transaction) -> Self {
		Self {
			tx,
			undo: UndoPolicy::Record,
			origin: EditOrigin::User,
		}
	}

	/// Sets the undo policy.
	pub fn with_undo(mut self, undo: UndoPolicy) -> Self {
		self.undo = undo;
		self
	}

	/// Sets the origin.
	pub fn with_origin(mut self, origin: EditOrigin) -> Self {
		self.origin = origin;
		self
	}
}

/// Outcome of a commit that passed the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitResult {
	/// Whether content changed.
	pub applied: bool,
	/// Version before the commit.
	pub version_before: u64,
	/// Version after the commit.
	pub version_after: u64,
	/// Whether an undo step was pushed.
	pub undo_recorded: bool,
}

impl CommitResult {
	/// A commit that changed nothing.
	pub fn unchanged(version: u64) -> Self {
		Self {
			applied: false,
			version_before: version,
			version_after: version,
			undo_recorded: false,
		}
	}
}

/// Errors raised by the commit gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EditError {
	/// The transaction was built against a document of a different length.
	#[error("transaction expects {expected} characters, document has {actual}")]
	LengthMismatch {
		/// Source length the changeset was built for.
		expected: CharLen,
		/// Current document length.
		actual: CharLen,
	},
	/// Privileged origins cannot enter through the public commit gate.
	#[error("privileged edits are reserved for the content mutator")]
	PrivilegedOrigin,
}
