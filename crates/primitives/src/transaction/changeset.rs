use super::types::{Bias, Insertion, Operation, Tendril, Touch};
use crate::attrs::NodeAttrs;
use crate::content::{Content, NodeCursor, NodeTableBuilder};
use crate::range::{CharIdx, CharLen};

/// A sequence of operations representing a set of changes to a document.
///
/// ChangeSet uses Operational Transformation (OT) principles to represent document
/// changes as a sequence of retain, delete, and insert operations. This representation
/// enables inversion, position mapping and transformation against concurrent changes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
	/// Sequence of retain/delete/insert operations.
	pub(super) changes: Vec<Operation>,
	/// Length of the source document before changes.
	pub(super) len: usize,
	/// Length of the document after applying changes.
	pub(super) len_after: usize,
}

impl ChangeSet {
	/// Creates a new empty changeset.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the length of the source document (before changes).
	pub fn len(&self) -> usize {
		self.len
	}

	/// Returns the length of the document after applying changes.
	pub fn len_after(&self) -> usize {
		self.len_after
	}

	/// Returns true if this changeset contains no operations.
	pub fn is_empty(&self) -> bool {
		self.changes.is_empty()
	}

	/// Returns true if applying this changeset leaves any document unchanged.
	pub fn is_identity(&self) -> bool {
		self.changes.iter().all(|op| matches!(op, Operation::Retain(_)))
	}

	/// Returns a slice of all operations in this changeset.
	pub fn changes(&self) -> &[Operation] {
		&self.changes
	}

	/// Adds a retain operation, preserving N characters from the source.
	///
	/// Consecutive retain operations are automatically merged.
	pub fn retain(&mut self, n: CharLen) {
		if n == 0 {
			return;
		}

		self.len += n;
		self.len_after += n;

		if let Some(Operation::Retain(count)) = self.changes.last_mut() {
			*count += n;
		} else {
			self.changes.push(Operation::Retain(n));
		}
	}

	/// Adds a delete operation, removing N characters from the source.
	///
	/// Consecutive delete operations are automatically merged.
	pub fn delete(&mut self, n: CharLen) {
		if n == 0 {
			return;
		}

		self.len += n;

		if let Some(Operation::Delete(count)) = self.changes.last_mut() {
			*count += n;
		} else {
			self.changes.push(Operation::Delete(n));
		}
	}

	/// Adds an unattributed insert operation.
	pub fn insert(&mut self, text: Tendril) {
		self.insert_with(text, NodeAttrs::PLAIN);
	}

	/// Adds an insert operation whose text carries `attrs`.
	///
	/// Inserts are kept ahead of a trailing delete so that a replacement always
	/// reads insert-then-delete, and merge with a preceding insert only when the
	/// attributes match.
	pub fn insert_with(&mut self, text: Tendril, attrs: NodeAttrs) {
		if text.is_empty() {
			return;
		}

		let ins = Insertion::new(text, attrs);
		self.len_after += ins.char_len();

		let slot = match self.changes.last() {
			Some(Operation::Delete(_)) => self.changes.len() - 1,
			_ => self.changes.len(),
		};

		if slot > 0
			&& let Some(Operation::Insert(prev)) = self.changes.get_mut(slot - 1)
			&& prev.attrs() == ins.attrs()
		{
			prev.push_str(&ins);
			return;
		}

		self.changes.insert(slot, Operation::Insert(ins));
	}

	/// Applies this changeset to content, modifying text and node table in place.
	///
	/// `self.len()` must equal the content length; callers check this through
	/// the document commit gate.
	pub fn apply(&self, content: &mut Content) {
		if self.changes.is_empty() {
			return;
		}
		debug_assert_eq!(self.len, content.len_chars());

		let mut table = NodeTableBuilder::with_capacity(content.node_count() + 2);
		{
			let mut cursor = NodeCursor::new(content.spans());
			for op in &self.changes {
				match op {
					Operation::Retain(n) => cursor.take(*n, |len, attrs| table.push(len, attrs.clone())),
					Operation::Delete(n) => cursor.take(*n, |_, _| {}),
					Operation::Insert(ins) => table.push(ins.char_len(), ins.attrs().clone()),
				}
			}
			cursor.take_rest(|len, attrs| table.push(len, attrs.clone()));
		}

		let (rope, nodes) = content.parts_mut();
		let mut pos = 0;
		for op in &self.changes {
			match op {
				Operation::Retain(n) => {
					pos += n;
				}
				Operation::Delete(n) => {
					rope.remove(pos..pos + n);
				}
				Operation::Insert(ins) => {
					rope.insert(pos, ins.text());
					pos += ins.char_len();
				}
			}
		}
		*nodes = table.finish();
	}

	/// Inverts this changeset to create one that undoes its effects.
	///
	/// `before` is the content this changeset applies to. Deleted text is
	/// re-inserted with the attributes it carried.
	pub fn invert(&self, before: &Content) -> ChangeSet {
		let mut result = ChangeSet::new();
		let rope = before.rope();
		let mut cursor = NodeCursor::new(before.spans());

		let mut pos = 0;
		for op in &self.changes {
			match op {
				Operation::Retain(n) => {
					result.retain(*n);
					cursor.take(*n, |_, _| {});
					pos += n;
				}
				Operation::Delete(n) => {
					cursor.take(*n, |len, attrs| {
						let text: String = rope.slice(pos..pos + len).chars().collect();
						result.insert_with(text, attrs.clone());
						pos += len;
					});
				}
				Operation::Insert(ins) => {
					result.delete(ins.char_len());
				}
			}
		}
		if pos < before.len_chars() {
			result.retain(before.len_chars() - pos);
		}

		result
	}

	/// Maps a position through this changeset using the specified bias.
	pub fn map_pos(&self, pos: CharIdx, bias: Bias) -> CharIdx {
		let mut old_pos = 0;
		let mut new_pos = 0;

		for op in &self.changes {
			if old_pos > pos {
				break;
			}

			match op {
				Operation::Retain(n) => {
					if old_pos + n > pos {
						return new_pos + (pos - old_pos);
					}
					old_pos += n;
					new_pos += n;
				}
				Operation::Delete(n) => {
					if old_pos + n > pos {
						return new_pos;
					}
					old_pos += n;
				}
				Operation::Insert(ins) => {
					if old_pos == pos && bias == Bias::Left {
						// Position is exactly at insert point, stay before
					} else {
						new_pos += ins.char_len();
					}
				}
			}
		}

		new_pos + (pos - old_pos)
	}

	/// Iterates the regions of the source document this changeset affects.
	///
	/// Retains produce nothing; consecutive inserts and deletes are reported
	/// individually in source coordinates.
	pub fn touches(&self) -> impl Iterator<Item = Touch<'_>> {
		let mut pos: CharIdx = 0;
		self.changes.iter().filter_map(move |op| match op {
			Operation::Retain(n) => {
				pos += n;
				None
			}
			Operation::Delete(n) => {
				let from = pos;
				pos += n;
				Some(Touch::Delete { from, to: pos })
			}
			Operation::Insert(insertion) => Some(Touch::Insert { at: pos, insertion }),
		})
	}
}
