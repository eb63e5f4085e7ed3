/// Character offset into a document. Anchors, locks and selections all use
/// this coordinate space; byte offsets never cross a crate boundary.
pub type CharIdx = usize;

/// Character count.
pub type CharLen = usize;

/// A selection between a fixed `anchor` and a moving `head`.
///
/// Either end may be the larger one; the covered span is `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Range {
	/// Fixed end.
	pub anchor: CharIdx,
	/// Cursor end.
	pub head: CharIdx,
}

impl Range {
	/// Range from `anchor` to `head`.
	pub fn new(anchor: CharIdx, head: CharIdx) -> Self {
		Self { anchor, head }
	}

	/// Start of the covered span.
	#[inline]
	pub fn from(&self) -> CharIdx {
		self.anchor.min(self.head)
	}

	/// End of the covered span, exclusive.
	#[inline]
	pub fn to(&self) -> CharIdx {
		self.anchor.max(self.head)
	}

	/// Characters covered.
	#[inline]
	pub fn len(&self) -> CharLen {
		self.to() - self.from()
	}

	/// True for a bare cursor.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.anchor == self.head
	}

	/// Moves both ends through `f`, keeping orientation.
	pub fn map(self, mut f: impl FnMut(CharIdx) -> CharIdx) -> Self {
		Self {
			anchor: f(self.anchor),
			head: f(self.head),
		}
	}

	/// Pulls both ends back to at most `len_chars`.
	pub fn clamp(&self, len_chars: CharLen) -> Self {
		self.map(|pos| pos.min(len_chars))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn span_is_orientation_free() {
		let forward = Range::new(2, 7);
		let backward = Range::new(7, 2);
		assert_eq!((forward.from(), forward.to()), (backward.from(), backward.to()));
		assert_eq!(backward.len(), 5);
		assert!(Range::default().is_empty());
	}

	#[test]
	fn clamp_keeps_orientation() {
		assert_eq!(Range::new(40, 3).clamp(10), Range::new(10, 3));
	}
}
