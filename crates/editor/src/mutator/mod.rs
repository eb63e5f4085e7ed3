//! The privileged writer.
//!
//! [`ContentMutator`] is the only component that commits through the
//! privileged path. Every operation produces exactly one transaction, excluded
//! from undo and redo, and is never seen by the transaction filters.


use std::sync::Arc;

use impetus_primitives::{CharIdx, CommitResult, EditError, LockId, NodeAttrs, Source, Transaction};
use impetus_proto::{Action, CommandError, MutationCommand};
use thiserror::Error;
use tracing::{debug, info};

use crate::anchor::{AnchorError, AnchorResolver, ResolvedTarget};
use crate::document::Document;
use crate::registry::LockRegistry;

/// Why a privileged mutation was refused. No mutation is applied on error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
	/// The command breaks a per-action requirement.
	#[error(transparent)]
	Command(#[from] CommandError),
	/// The anchor does not resolve against the current content.
	#[error(transparent)]
	Anchor(#[from] AnchorError),
	/// The commit gate refused the transaction.
	#[error(transparent)]
	Edit(#[from] EditError),
	/// Locked content must not be empty or whitespace.
	#[error("locked content must not be blank")]
	EmptyContent,
	/// The lock id is already in use.
	#[error("lock {0} is already registered")]
	DuplicateLock(LockId),
	/// A plain delete would remove locked content.
	#[error("range [{from}, {to}) overlaps lock {lock_id}")]
	Locked {
		/// Start of the refused range.
		from: CharIdx,
		/// End of the refused range.
		to: CharIdx,
		/// First registered lock found in the range.
		lock_id: LockId,
	},
}

/// Result of an applied mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
	/// What the commit gate reported.
	pub commit: CommitResult,
	/// Span of the new content after the edit, empty for deletes.
	pub from: CharIdx,
	/// End of the new content.
	pub to: CharIdx,
	/// Lock created by the mutation.
	pub lock_id: Option<LockId>,
}

/// Performs the three privileged edits and registers the locks they create.
#[derive(Debug, Clone)]
pub struct ContentMutator {
	registry: Arc<LockRegistry>,
	resolver: AnchorResolver,
}

impl ContentMutator {
	/// Creates a mutator backed by `registry`.
	pub fn new(registry: Arc<LockRegistry>) -> Self {
		let resolver = AnchorResolver::new(Arc::clone(&registry));
		Self { registry, resolver }
	}

	/// Inserts `content` at `pos` as a new node locked under `lock_id`.
	///
	/// A position strictly inside a registered lock moves to the end of that
	/// lock's node, so an existing lock is never split.
	pub fn insert_locked(
		&self,
		doc: &mut Document,
		pos: CharIdx,
		content: &str,
		lock_id: LockId,
		source: Source,
	) -> Result<Mutation, MutationError> {
		self.check_new_lock(content, &lock_id)?;
		let len = doc.len_chars();
		if pos > len {
			return Err(AnchorError::PositionOutOfBounds { pos, len }.into());
		}

		let at = self.snap_out_of_lock(doc, pos);
		let tx = Transaction::insert_node(
			doc.content(),
			at,
			content,
			NodeAttrs::locked(lock_id.clone(), source),
		);
		let commit = doc.commit_privileged(tx, "insert_locked")?;
		self.registry.register(lock_id.clone(), source);

		let to = at + content.chars().count();
		info!(%lock_id, %source, from = at, to, "mutator.insert_locked");
		Ok(Mutation {
			commit,
			from: at,
			to,
			lock_id: Some(lock_id),
		})
	}

	/// Replaces `[from, to)` with `content` locked under `lock_id`.
	///
	/// The range may contain locked content; this is the privileged path. An
	/// end that falls strictly inside a registered lock is widened to that
	/// lock's boundary, so a lock is either replaced whole or left whole.
	pub fn replace_range_with_lock(
		&self,
		doc: &mut Document,
		from: CharIdx,
		to: CharIdx,
		content: &str,
		lock_id: LockId,
		source: Source,
	) -> Result<Mutation, MutationError> {
		self.check_new_lock(content, &lock_id)?;
		check_span(doc, from, to)?;
		let (from, to) = self.widen_over_locks(doc, from, to);

		let tx = Transaction::replace_with_node(
			doc.content(),
			from,
			to,
			content,
			NodeAttrs::locked(lock_id.clone(), source),
		);
		let commit = doc.commit_privileged(tx, "replace_range_with_lock")?;
		self.registry.register(lock_id.clone(), source);

		let end = from + content.chars().count();
		info!(%lock_id, %source, from, to, replaced_to = end, "mutator.replace_range_with_lock");
		Ok(Mutation {
			commit,
			from,
			to: end,
			lock_id: Some(lock_id),
		})
	}

	/// Removes `[from, to)`. Refuses ranges overlapping a registered lock.
	pub fn delete_range(&self, doc: &mut Document, from: CharIdx, to: CharIdx) -> Result<Mutation, MutationError> {
		check_span(doc, from, to)?;

		let locked = doc
			.content()
			.nodes_overlapping(from, to)
			.filter_map(|node| node.attrs.lock_id())
			.find(|id| self.registry.is_locked(id.as_str()))
			.cloned();
		if let Some(lock_id) = locked {
			debug!(%lock_id, from, to, "mutator.delete_range refused");
			return Err(MutationError::Locked { from, to, lock_id });
		}

		let tx = Transaction::delete(doc.content(), from, to);
		let commit = doc.commit_privileged(tx, "delete_range")?;
		info!(from, to, "mutator.delete_range");
		Ok(Mutation {
			commit,
			from,
			to: from,
			lock_id: None,
		})
	}

	/// Validates `command`, resolves its anchor against the document as it is
	/// now, and performs the matching operation.
	pub fn execute(&self, doc: &mut Document, command: &MutationCommand) -> Result<Mutation, MutationError> {
		command.validate()?;
		let target = command
			.anchor
			.as_ref()
			.map(|anchor| self.resolver.resolve(anchor, doc.content()))
			.transpose()?;

		debug!(
			action = %command.action,
			action_id = %command.action_id,
			?target,
			version = doc.version(),
			"mutator.execute"
		);

		let source = command.source;
		match command.action {
			Action::Provoke => {
				let at = target.map_or(doc.len_chars(), ResolvedTarget::insertion_point);
				let (content, lock_id) = lock_payload(command)?;
				self.insert_locked(doc, at, content, lock_id, source)
			}
			Action::Rewrite => {
				let (from, to) = span_of(target, Action::Rewrite)?;
				let (content, lock_id) = lock_payload(command)?;
				self.replace_range_with_lock(doc, from, to, content, lock_id, source)
			}
			Action::Delete => {
				let (from, to) = span_of(target, Action::Delete)?;
				self.delete_range(doc, from, to)
			}
		}
	}

	fn check_new_lock(&self, content: &str, lock_id: &LockId) -> Result<(), MutationError> {
		if content.trim().is_empty() {
			return Err(MutationError::EmptyContent);
		}
		if self.registry.is_locked(lock_id.as_str()) {
			return Err(MutationError::DuplicateLock(lock_id.clone()));
		}
		Ok(())
	}

	/// Moves `pos` to the end of the registered lock node strictly enclosing it.
	fn snap_out_of_lock(&self, doc: &Document, pos: CharIdx) -> CharIdx {
		self.enclosing_lock(doc, pos).map_or(pos, |(_, end)| end)
	}

	/// Pushes `from` back and `to` forward past any registered lock they split.
	fn widen_over_locks(&self, doc: &Document, from: CharIdx, to: CharIdx) -> (CharIdx, CharIdx) {
		let widened = (
			self.enclosing_lock(doc, from).map_or(from, |(start, _)| start),
			self.enclosing_lock(doc, to).map_or(to, |(_, end)| end),
		);
		if widened != (from, to) {
			debug!(from, to, widened_from = widened.0, widened_to = widened.1, "mutator.widen");
		}
		widened
	}

	/// Span of the registered lock node whose interior strictly contains `pos`.
	fn enclosing_lock(&self, doc: &Document, pos: CharIdx) -> Option<(CharIdx, CharIdx)> {
		doc.content()
			.node_enclosing(pos)
			.filter(|node| {
				node.attrs
					.lock_id()
					.is_some_and(|id| self.registry.is_locked(id.as_str()))
			})
			.map(|node| (node.start, node.end))
	}
}

fn check_span(doc: &Document, from: CharIdx, to: CharIdx) -> Result<(), AnchorError> {
	if to <= from {
		return Err(AnchorError::InvertedRange { from, to });
	}
	let len = doc.len_chars();
	if to > len {
		return Err(AnchorError::RangeOutOfBounds { from, to, len });
	}
	Ok(())
}

fn span_of(target: Option<ResolvedTarget>, action: Action) -> Result<(CharIdx, CharIdx), CommandError> {
	match target {
		Some(ResolvedTarget::Span { from, to }) => Ok((from, to)),
		Some(ResolvedTarget::Point(_)) => Err(CommandError::PositionAnchor { action }),
		None => Err(CommandError::MissingAnchor { action }),
	}
}

fn lock_payload(command: &MutationCommand) -> Result<(&str, LockId), CommandError> {
	let action = command.action;
	let content = command
		.content
		.as_deref()
		.ok_or(CommandError::MissingContent { action })?;
	let lock_id = command
		.lock_id
		.clone()
		.ok_or(CommandError::MissingLockId { action })?;
	Ok((content, lock_id))
}
