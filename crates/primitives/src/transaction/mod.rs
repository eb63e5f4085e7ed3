//! Undoable edits: changesets wrapped with an optional selection.

mod changeset;
mod transform;
mod types;


pub use changeset::ChangeSet;
pub use types::{Bias, Change, Insertion, Operation, Tendril, Touch};

use crate::attrs::NodeAttrs;
use crate::content::Content;
use crate::range::{CharIdx, Range};

/// A changeset plus the selection to install after it applies.
///
/// A transaction with an empty changeset only moves the selection and never
/// changes content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
	changes: ChangeSet,
	selection: Option<Range>,
}

impl Transaction {
	/// Wraps an existing changeset.
	pub fn new(changes: ChangeSet) -> Self {
		Self {
			changes,
			selection: None,
		}
	}

	/// Builds a transaction from unattributed replacements.
	///
	/// Changes are sorted by start; a change overlapping its predecessor is
	/// clipped to begin where the predecessor ended, and ends are clamped to
	/// the document length.
	pub fn change(doc: &Content, changes: impl IntoIterator<Item = Change>) -> Self {
		let len = doc.len_chars();
		let mut changes: Vec<Change> = changes.into_iter().collect();
		changes.sort_by_key(|change| change.start);

		let mut cs = ChangeSet::new();
		let mut last = 0;
		for Change {
			start,
			end,
			replacement,
		} in changes
		{
			let start = start.clamp(last, len);
			let end = end.clamp(start, len);
			cs.retain(start - last);
			if let Some(text) = replacement {
				cs.insert(text);
			}
			cs.delete(end - start);
			last = end;
		}
		cs.retain(len - last);

		Self::new(cs)
	}

	/// Inserts unattributed text at `at`.
	pub fn insert(doc: &Content, at: CharIdx, text: impl Into<Tendril>) -> Self {
		Self::change(
			doc,
			[Change {
				start: at,
				end: at,
				replacement: Some(text.into()),
			}],
		)
	}

	/// Deletes `[from, to)`.
	pub fn delete(doc: &Content, from: CharIdx, to: CharIdx) -> Self {
		Self::change(
			doc,
			[Change {
				start: from,
				end: to,
				replacement: None,
			}],
		)
	}

	/// Inserts a new node carrying `attrs` at `at`.
	pub fn insert_node(doc: &Content, at: CharIdx, text: impl Into<Tendril>, attrs: NodeAttrs) -> Self {
		Self::replace_with_node(doc, at, at, text, attrs)
	}

	/// Replaces `[from, to)` with a new node carrying `attrs`.
	pub fn replace_with_node(
		doc: &Content,
		from: CharIdx,
		to: CharIdx,
		text: impl Into<Tendril>,
		attrs: NodeAttrs,
	) -> Self {
		let len = doc.len_chars();
		let from = from.min(len);
		let to = to.clamp(from, len);

		let mut cs = ChangeSet::new();
		cs.retain(from);
		cs.insert_with(text.into(), attrs);
		cs.delete(to - from);
		cs.retain(len - to);
		Self::new(cs)
	}

	/// A transaction that only moves the selection.
	pub fn select(range: Range) -> Self {
		Self {
			changes: ChangeSet::new(),
			selection: Some(range),
		}
	}

	/// Sets the selection to install after the transaction applies.
	pub fn with_selection(mut self, range: Range) -> Self {
		self.selection = Some(range);
		self
	}

	/// Returns the changeset.
	pub fn changes(&self) -> &ChangeSet {
		&self.changes
	}

	/// Consumes the transaction, returning its changeset.
	pub fn into_changes(self) -> ChangeSet {
		self.changes
	}

	/// Returns the selection to install, if any.
	pub fn selection(&self) -> Option<Range> {
		self.selection
	}

	/// Returns true if applying the transaction alters text or node attributes.
	pub fn changes_content(&self) -> bool {
		!self.changes.is_identity()
	}

	/// Applies the changeset to `doc`.
	pub fn apply(&self, doc: &mut Content) {
		self.changes.apply(doc);
	}

	/// Returns a transaction undoing this one; `before` is the pre-edit content.
	pub fn invert(&self, before: &Content) -> Transaction {
		Self::new(self.changes.invert(before))
	}

	/// Maps a selection range through the changes.
	pub fn map_range(&self, range: Range) -> Range {
		range.map(|pos| self.changes.map_pos(pos, Bias::Right))
	}
}

impl From<ChangeSet> for Transaction {
	fn from(changes: ChangeSet) -> Self {
		Self::new(changes)
	}
}
