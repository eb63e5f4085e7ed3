use crate::attrs::NodeAttrs;
use crate::range::{CharIdx, CharLen};

/// Owned text carried by an insert.
pub type Tendril = String;

/// Replace `[start, end)` with `replacement`, or delete it when there is none.
///
/// Replacement text is plain; locked nodes go through
/// [`Transaction::insert_node`](super::Transaction::insert_node).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
	/// First replaced character.
	pub start: CharIdx,
	/// One past the last replaced character.
	pub end: CharIdx,
	/// New text.
	pub replacement: Option<Tendril>,
}

/// Which side of an insertion a position sticks to when it sits exactly at
/// the insertion point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
	/// Stay in front of the inserted text.
	Left,
	/// Move past the inserted text.
	Right,
}

/// Inserted text, its character count and the attributes its node carries.
///
/// `char_len == text.chars().count()` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
	text: Tendril,
	char_len: CharLen,
	attrs: NodeAttrs,
}

impl Insertion {
	/// Counts characters once up front.
	#[inline]
	pub fn new(text: Tendril, attrs: NodeAttrs) -> Self {
		let char_len = text.chars().count();
		Self {
			text,
			char_len,
			attrs,
		}
	}

	/// No text.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.char_len == 0
	}

	/// Text to insert.
	#[inline]
	pub fn text(&self) -> &str {
		&self.text
	}

	/// Length in characters.
	#[inline]
	pub fn char_len(&self) -> CharLen {
		self.char_len
	}

	/// Attributes stamped on the new node.
	#[inline]
	pub fn attrs(&self) -> &NodeAttrs {
		&self.attrs
	}

	/// Merges `other`, which must carry the same attributes.
	pub(super) fn push_str(&mut self, other: &Insertion) {
		debug_assert_eq!(self.attrs, other.attrs);
		self.text.push_str(&other.text);
		self.char_len += other.char_len;
	}
}

/// One step of a [`ChangeSet`](super::ChangeSet), read left to right over the
/// source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
	/// Keep the next n source characters.
	Retain(CharLen),
	/// Drop the next n source characters.
	Delete(CharLen),
	/// Emit new text here.
	Insert(Insertion),
}

/// A region of the source document affected by a changeset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Touch<'a> {
	/// Characters `[from, to)` of the source are removed.
	Delete {
		/// First removed character.
		from: CharIdx,
		/// One past the last removed character.
		to: CharIdx,
	},
	/// Text is inserted at source position `at`.
	Insert {
		/// Insertion point in source coordinates.
		at: CharIdx,
		/// The inserted text.
		insertion: &'a Insertion,
	},
}
