use impetus_primitives::{CharIdx, LockId};
use serde::{Deserialize, Serialize};

/// Where a mutation lands in the document.
///
/// Offsets are character positions. A [`Anchor::LockRef`] names a lock and is
/// resolved against the live document when the mutation executes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Anchor {
	/// A single offset.
	#[serde(rename = "pos")]
	Position {
		/// Offset in characters.
		from: CharIdx,
	},
	/// The half-open interval `[from, to)`.
	#[serde(rename = "range")]
	Range {
		/// Start offset, inclusive.
		from: CharIdx,
		/// End offset, exclusive.
		to: CharIdx,
	},
	/// The current location of an existing lock.
	#[serde(rename = "lock_id")]
	LockRef {
		/// Referenced lock.
		#[serde(alias = "refLockId")]
		ref_lock_id: LockId,
	},
}

impl Anchor {
	/// A position anchor.
	pub fn pos(from: CharIdx) -> Self {
		Self::Position { from }
	}

	/// A range anchor. No ordering check happens here.
	pub fn range(from: CharIdx, to: CharIdx) -> Self {
		Self::Range { from, to }
	}

	/// A lock reference.
	pub fn lock(ref_lock_id: impl Into<LockId>) -> Self {
		Self::LockRef {
			ref_lock_id: ref_lock_id.into(),
		}
	}

	/// Wire name of the variant.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Position { .. } => "pos",
			Self::Range { .. } => "range",
			Self::LockRef { .. } => "lock_id",
		}
	}
}
