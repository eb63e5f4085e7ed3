//! Document - the live, node-attributed content of an editing session.
//!
//! A [`Document`] owns the one authoritative [`Content`], its version counter,
//! the current selection and the undo [`History`]. There is no other copy of
//! the content: the guard, the resolver and the mutator all read or mutate
//! this instance.
//!
//! # Commit gate
//!
//! A document is read-only outside this crate. User edits reach the
//! crate-private [`Document::commit`] only through
//! [`EditorSession::dispatch`](crate::EditorSession::dispatch), after every
//! transaction filter has allowed them. `commit` refuses privileged origins;
//! those go through [`Document::commit_privileged`], which only the content
//! mutator calls.

#[cfg(test)]
mod tests;

use impetus_primitives::{
	CommitResult, Content, EditCommit, EditError, EditOrigin, Range, Transaction, UndoPolicy,
};
use tracing::trace;

use crate::history::History;

/// The live document.
///
/// Core fields are private to enforce invariants: the version increments once
/// per applied transaction and history always matches the content.
#[derive(Debug, Default)]
pub struct Document {
	/// Text plus node table.
	content: Content,
	/// Incremented on every applied transaction.
	version: u64,
	/// Primary selection, mapped through every edit.
	selection: Range,
	/// Undo/redo stacks.
	history: History,
}

impl Document {
	/// Creates a document holding plain text.
	pub fn new(text: &str) -> Self {
		Self::from_content(Content::new(text))
	}

	/// Creates a document from prepared content.
	pub fn from_content(content: Content) -> Self {
		Self {
			content,
			..Self::default()
		}
	}

	/// Returns the content.
	pub fn content(&self) -> &Content {
		&self.content
	}

	/// Returns the length in characters.
	pub fn len_chars(&self) -> usize {
		self.content.len_chars()
	}

	/// Returns the document version.
	pub fn version(&self) -> u64 {
		self.version
	}

	/// Returns the primary selection.
	pub fn selection(&self) -> Range {
		self.selection
	}

	/// Returns the undo history.
	pub fn history(&self) -> &History {
		&self.history
	}

	/// Returns whether undo is available.
	pub fn can_undo(&self) -> bool {
		self.history.can_undo()
	}

	/// Returns whether redo is available.
	pub fn can_redo(&self) -> bool {
		self.history.can_redo()
	}

	/// Applies an edit through the commit gate.
	///
	/// # Errors
	///
	/// - [`EditError::PrivilegedOrigin`] for mutator or internal origins.
	/// - [`EditError::LengthMismatch`] if the transaction was built for other content.
	pub(crate) fn commit(&mut self, commit: EditCommit) -> Result<CommitResult, EditError> {
		if commit.origin.is_privileged() {
			return Err(EditError::PrivilegedOrigin);
		}
		self.commit_unchecked(commit)
	}

	/// Applies a mutator edit that bypasses history.
	///
	/// The edit is excluded from undo and redo; stored steps are rebased over it.
	pub(crate) fn commit_privileged(
		&mut self,
		tx: Transaction,
		operation: &'static str,
	) -> Result<CommitResult, EditError> {
		self.commit_unchecked(EditCommit {
			tx,
			undo: UndoPolicy::NoUndo,
			origin: EditOrigin::Mutator(operation),
		})
	}

	/// The transaction the next undo would apply.
	pub fn pending_undo(&self) -> Option<Transaction> {
		self.history.peek_undo().cloned().map(Transaction::new)
	}

	/// The transaction the next redo would apply.
	pub fn pending_redo(&self) -> Option<Transaction> {
		self.history.peek_redo().cloned().map(Transaction::new)
	}

	/// Applies the top undo step and moves it to redo.
	///
	/// Returns `None` when there is nothing to undo.
	pub(crate) fn apply_undo(&mut self) -> Option<CommitResult> {
		let tx = self.pending_undo()?;
		let before = self.content.clone();
		let result = self.apply(&tx);
		self.history.commit_undo(&before);
		trace!(version = result.version_after, "document.undo");
		Some(result)
	}

	/// Applies the top redo step and moves it to undo.
	///
	/// Returns `None` when there is nothing to redo.
	pub(crate) fn apply_redo(&mut self) -> Option<CommitResult> {
		let tx = self.pending_redo()?;
		let before = self.content.clone();
		let result = self.apply(&tx);
		self.history.commit_redo(&before);
		trace!(version = result.version_after, "document.redo");
		Some(result)
	}

	fn commit_unchecked(&mut self, commit: EditCommit) -> Result<CommitResult, EditError> {
		let EditCommit { tx, undo, origin } = commit;
		let expected = tx.changes().len();
		let actual = self.content.len_chars();
		if !tx.changes().is_empty() && expected != actual {
			return Err(EditError::LengthMismatch { expected, actual });
		}

		if !tx.changes_content() {
			if let Some(selection) = tx.selection() {
				self.selection = selection.clamp(actual);
			}
			return Ok(CommitResult::unchanged(self.version));
		}

		let undo_recorded = match undo {
			UndoPolicy::Record => {
				self.history.record(&tx, &self.content);
				true
			}
			UndoPolicy::NoUndo => {
				self.history.rebase_over(tx.changes());
				false
			}
		};

		let mut result = self.apply(&tx);
		result.undo_recorded = undo_recorded;
		trace!(?origin, ?undo, version = result.version_after, "document.commit");
		Ok(result)
	}

	/// Applies content, selection and version updates.
	fn apply(&mut self, tx: &Transaction) -> CommitResult {
		let version_before = self.version;
		tx.apply(&mut self.content);
		self.selection = match tx.selection() {
			Some(selection) => selection,
			None => tx.map_range(self.selection),
		}
		.clamp(self.content.len_chars());
		self.version = self.version.wrapping_add(1);

		CommitResult {
			applied: true,
			version_before,
			version_after: self.version,
			undo_recorded: false,
		}
	}
}
