//! Transaction-based undo history.
//!
//! Each step stores one changeset: on the undo stack it reverts an edit, on
//! the redo stack it re-applies one. The opposite changeset is computed by
//! inversion at the moment a step moves between stacks.
//!
//! # Excluded edits
//!
//! An edit committed with [`UndoPolicy::NoUndo`] is never recorded. Every
//! stored step is rebased over it instead, so undoing older edits still lands
//! on the right text and never reverts the excluded edit.
//!
//! [`UndoPolicy::NoUndo`]: impetus_primitives::UndoPolicy::NoUndo


use impetus_primitives::{ChangeSet, Content, Transaction};
use tracing::trace;

/// Maximum undo history size.
pub const MAX_UNDO: usize = 100;

/// Undo and redo stacks for one document.
#[derive(Debug, Default)]
pub struct History {
	undo_stack: Vec<ChangeSet>,
	redo_stack: Vec<ChangeSet>,
}

impl History {
	/// Creates empty history.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns whether undo is available.
	pub fn can_undo(&self) -> bool {
		!self.undo_stack.is_empty()
	}

	/// Returns whether redo is available.
	pub fn can_redo(&self) -> bool {
		!self.redo_stack.is_empty()
	}

	/// Returns the undo stack length.
	pub fn undo_len(&self) -> usize {
		self.undo_stack.len()
	}

	/// Returns the redo stack length.
	pub fn redo_len(&self) -> usize {
		self.redo_stack.len()
	}

	/// Records `tx` for undo; `before` is the pre-edit content.
	///
	/// Clears redo and enforces [`MAX_UNDO`] by dropping the oldest step.
	pub fn record(&mut self, tx: &Transaction, before: &Content) {
		self.undo_stack.push(tx.changes().invert(before));
		self.redo_stack.clear();

		if self.undo_stack.len() > MAX_UNDO {
			self.undo_stack.remove(0);
		}
	}

	/// The changeset the next undo would apply.
	pub fn peek_undo(&self) -> Option<&ChangeSet> {
		self.undo_stack.last()
	}

	/// The changeset the next redo would apply.
	pub fn peek_redo(&self) -> Option<&ChangeSet> {
		self.redo_stack.last()
	}

	/// Moves the top undo step to redo after it was applied.
	///
	/// `before` is the content the undo step was applied to.
	pub fn commit_undo(&mut self, before: &Content) {
		if let Some(step) = self.undo_stack.pop() {
			self.redo_stack.push(step.invert(before));
		}
	}

	/// Moves the top redo step to undo after it was applied.
	///
	/// `before` is the content the redo step was applied to.
	pub fn commit_redo(&mut self, before: &Content) {
		if let Some(step) = self.redo_stack.pop() {
			self.undo_stack.push(step.invert(before));
			if self.undo_stack.len() > MAX_UNDO {
				self.undo_stack.remove(0);
			}
		}
	}

	/// Rebases every stored step over `change`, which applies to the current
	/// content and is not itself recorded.
	pub fn rebase_over(&mut self, change: &ChangeSet) {
		if change.is_identity() {
			return;
		}
		let undo = rebase_stack(&mut self.undo_stack, change);
		let redo = rebase_stack(&mut self.redo_stack, change);
		trace!(
			undo_len = self.undo_stack.len(),
			redo_len = self.redo_stack.len(),
			undo_dropped = undo,
			redo_dropped = redo,
			"history.rebase"
		);
	}
}

/// Rebases a stack whose top applies to the current content.
///
/// Walking from the top down, `change` is carried into the coordinate space of
/// each older step. Steps that become no-ops are dropped; the count of dropped
/// steps is returned.
fn rebase_stack(stack: &mut Vec<ChangeSet>, change: &ChangeSet) -> usize {
	let mut over = change.clone();
	for step in stack.iter_mut().rev() {
		let (rebased, carried) = step.transform(&over);
		*step = rebased;
		over = carried;
	}
	let before = stack.len();
	stack.retain(|step| !step.is_identity());
	before - stack.len()
}
