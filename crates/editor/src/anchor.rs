//! Resolves wire anchors against the live document.

use std::sync::Arc;

use impetus_primitives::{CharIdx, Content, LockId};
use impetus_proto::Anchor;
use thiserror::Error;

use crate::registry::LockRegistry;

/// A validated location in the current content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTarget {
	/// A single offset, `0..=len`.
	Point(CharIdx),
	/// A non-empty span `[from, to)` within the document.
	Span {
		/// Start, inclusive.
		from: CharIdx,
		/// End, exclusive.
		to: CharIdx,
	},
}

impl ResolvedTarget {
	/// The offset new content goes to: the point itself, or the span end.
	pub fn insertion_point(self) -> CharIdx {
		match self {
			Self::Point(pos) => pos,
			Self::Span { to, .. } => to,
		}
	}
}

/// Why an anchor could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnchorError {
	/// Position past the document end.
	#[error("position {pos} is outside the document (length {len})")]
	PositionOutOfBounds {
		/// Requested offset.
		pos: CharIdx,
		/// Document length.
		len: usize,
	},
	/// `to <= from`.
	#[error("range [{from}, {to}) is empty or inverted")]
	InvertedRange {
		/// Requested start.
		from: CharIdx,
		/// Requested end.
		to: CharIdx,
	},
	/// Range end past the document end.
	#[error("range [{from}, {to}) exceeds the document (length {len})")]
	RangeOutOfBounds {
		/// Requested start.
		from: CharIdx,
		/// Requested end.
		to: CharIdx,
		/// Document length.
		len: usize,
	},
	/// The referenced lock was never registered.
	#[error("lock {0} is not registered")]
	UnknownLock(LockId),
	/// The referenced lock is registered but no node carries it any more.
	#[error("lock {0} is no longer present in the document")]
	LockNotFound(LockId),
	/// The lock's nodes are separated by other content.
	#[error("lock {lock_id} is split into {nodes} separate nodes")]
	LockFragmented {
		/// The referenced lock.
		lock_id: LockId,
		/// Number of nodes carrying it.
		nodes: usize,
	},
}

/// Validates anchors against the content at the moment of execution.
///
/// Lock references are looked up in the live node table on every call; no
/// offset is ever cached.
#[derive(Debug, Clone)]
pub struct AnchorResolver {
	registry: Arc<LockRegistry>,
}

impl AnchorResolver {
	/// Creates a resolver backed by `registry`.
	pub fn new(registry: Arc<LockRegistry>) -> Self {
		Self { registry }
	}

	/// Resolves `anchor` against `content`.
	pub fn resolve(&self, anchor: &Anchor, content: &Content) -> Result<ResolvedTarget, AnchorError> {
		let len = content.len_chars();
		match anchor {
			&Anchor::Position { from } => {
				if from > len {
					return Err(AnchorError::PositionOutOfBounds { pos: from, len });
				}
				Ok(ResolvedTarget::Point(from))
			}
			&Anchor::Range { from, to } => {
				if to <= from {
					return Err(AnchorError::InvertedRange { from, to });
				}
				if to > len {
					return Err(AnchorError::RangeOutOfBounds { from, to, len });
				}
				Ok(ResolvedTarget::Span { from, to })
			}
			Anchor::LockRef { ref_lock_id } => {
				if !self.registry.is_locked(ref_lock_id.as_str()) {
					return Err(AnchorError::UnknownLock(ref_lock_id.clone()));
				}
				let mut nodes = content.lock_nodes(ref_lock_id.as_str());
				let Some(node) = nodes.next() else {
					return Err(AnchorError::LockNotFound(ref_lock_id.clone()));
				};
				let rest = nodes.count();
				if rest > 0 {
					return Err(AnchorError::LockFragmented {
						lock_id: ref_lock_id.clone(),
						nodes: rest + 1,
					});
				}
				Ok(ResolvedTarget::Span {
					from: node.start,
					to: node.end,
				})
			}
		}
	}
}
