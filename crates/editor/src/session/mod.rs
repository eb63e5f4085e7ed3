//! Editing session: one document, its filters and the privileged mutator.
//!
//! Mutation is single-threaded and cooperative. Each dispatched transaction
//! runs filter check, accept or veto, and commit to completion before the
//! next one is considered. The only shared state is the [`LockRegistry`].


use std::sync::Arc;

use impetus_primitives::{CharIdx, CommitResult, EditCommit, EditError, LockId, Source, Transaction};
use impetus_proto::MutationCommand;
use tracing::debug;

use crate::document::Document;
use crate::guard::{MutationGuard, TransactionFilter};
use crate::mutator::{ContentMutator, Mutation, MutationError};
use crate::registry::LockRegistry;

/// What happened to a dispatched transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
	/// The transaction passed every filter and was committed.
	Applied(CommitResult),
	/// A filter vetoed the transaction; the document is unchanged.
	Vetoed,
}

impl DispatchOutcome {
	/// Returns true if the transaction was committed.
	pub fn is_applied(&self) -> bool {
		matches!(self, Self::Applied(_))
	}
}

/// Owns the live document and routes every edit through the right path.
///
/// User edits, undo and redo pass through the filters; mutation commands go
/// through the [`ContentMutator`].
pub struct EditorSession {
	document: Document,
	registry: Arc<LockRegistry>,
	filters: Vec<Box<dyn TransactionFilter>>,
	mutator: ContentMutator,
}

impl EditorSession {
	/// Creates a session over `document` with a default [`MutationGuard`].
	pub fn new(document: Document, registry: Arc<LockRegistry>) -> Self {
		let guard = MutationGuard::new(Arc::clone(&registry));
		Self::with_guard(document, registry, guard)
	}

	/// Creates a session with a preconfigured guard.
	pub fn with_guard(document: Document, registry: Arc<LockRegistry>, guard: MutationGuard) -> Self {
		let mutator = ContentMutator::new(Arc::clone(&registry));
		Self {
			document,
			registry,
			filters: vec![Box::new(guard)],
			mutator,
		}
	}

	/// Adds a filter consulted after the existing ones.
	pub fn add_filter(&mut self, filter: impl TransactionFilter + 'static) {
		self.filters.push(Box::new(filter));
	}

	/// Returns the document.
	pub fn document(&self) -> &Document {
		&self.document
	}

	/// Returns the lock registry.
	pub fn registry(&self) -> &Arc<LockRegistry> {
		&self.registry
	}

	/// Dispatches a user edit recorded in history.
	pub fn dispatch(&mut self, tx: Transaction) -> Result<DispatchOutcome, EditError> {
		self.dispatch_commit(EditCommit::user(tx))
	}

	/// Dispatches an edit with an explicit policy.
	///
	/// Privileged origins are refused by the commit gate.
	pub fn dispatch_commit(&mut self, commit: EditCommit) -> Result<DispatchOutcome, EditError> {
		if !self.allowed(&commit.tx) {
			return Ok(DispatchOutcome::Vetoed);
		}
		self.document.commit(commit).map(DispatchOutcome::Applied)
	}

	/// Undoes the last recorded edit. Returns `None` if there is nothing to undo.
	///
	/// A vetoed undo stays on the undo stack.
	pub fn undo(&mut self) -> Option<DispatchOutcome> {
		let tx = self.document.pending_undo()?;
		if !self.allowed(&tx) {
			return Some(DispatchOutcome::Vetoed);
		}
		self.document.apply_undo().map(DispatchOutcome::Applied)
	}

	/// Redoes the last undone edit. Returns `None` if there is nothing to redo.
	///
	/// A vetoed redo stays on the redo stack.
	pub fn redo(&mut self) -> Option<DispatchOutcome> {
		let tx = self.document.pending_redo()?;
		if !self.allowed(&tx) {
			return Some(DispatchOutcome::Vetoed);
		}
		self.document.apply_redo().map(DispatchOutcome::Applied)
	}

	/// See [`ContentMutator::insert_locked`].
	pub fn insert_locked(
		&mut self,
		pos: CharIdx,
		content: &str,
		lock_id: LockId,
		source: Source,
	) -> Result<Mutation, MutationError> {
		self.mutator
			.insert_locked(&mut self.document, pos, content, lock_id, source)
	}

	/// See [`ContentMutator::replace_range_with_lock`].
	pub fn replace_range_with_lock(
		&mut self,
		from: CharIdx,
		to: CharIdx,
		content: &str,
		lock_id: LockId,
		source: Source,
	) -> Result<Mutation, MutationError> {
		self.mutator
			.replace_range_with_lock(&mut self.document, from, to, content, lock_id, source)
	}

	/// See [`ContentMutator::delete_range`].
	pub fn delete_range(&mut self, from: CharIdx, to: CharIdx) -> Result<Mutation, MutationError> {
		self.mutator.delete_range(&mut self.document, from, to)
	}

	/// Executes a mutation command against the document as it is now.
	pub fn execute(&mut self, command: &MutationCommand) -> Result<Mutation, MutationError> {
		self.mutator.execute(&mut self.document, command)
	}

	/// Runs every filter; the first veto wins.
	fn allowed(&self, tx: &Transaction) -> bool {
		let allowed = self
			.filters
			.iter()
			.all(|filter| filter.should_allow(tx, &self.document));
		if !allowed {
			debug!(version = self.document.version(), "session.vetoed");
		}
		allowed
	}
}

impl std::fmt::Debug for EditorSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EditorSession")
			.field("document", &self.document)
			.field("locks", &self.registry.count())
			.field("filters", &self.filters.len())
			.finish()
	}
}
