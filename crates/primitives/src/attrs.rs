use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a lock.
///
/// Lock ids are minted by the backend when a locked region is created and are
/// compared by value only. Borrowing as `str` allows hash lookups without
/// allocating.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockId(String);

impl LockId {
	/// Prefix carried by every freshly minted id.
	pub const PREFIX: &'static str = "lock_";

	/// Wraps an existing identifier.
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	/// Mints a new unique identifier (`lock_<uuid v4>`).
	pub fn mint() -> Self {
		Self(format!("{}{}", Self::PREFIX, Uuid::new_v4()))
	}

	/// Returns the identifier as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Returns true if the identifier is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Display for LockId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl Borrow<str> for LockId {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl AsRef<str> for LockId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl From<&str> for LockId {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for LockId {
	fn from(value: String) -> Self {
		Self(value)
	}
}

/// Decision policy that produced a lock or a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
	/// Strictly additive policy.
	#[serde(alias = "muse")]
	Primary,
	/// Policy that may delete or rewrite, subject to the safety guard.
	#[serde(alias = "loki")]
	Chaos,
}

impl Source {
	/// Wire name of the source.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Primary => "primary",
			Self::Chaos => "chaos",
		}
	}
}

impl fmt::Display for Source {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Structured attributes carried by a document node.
///
/// A node with a `lock_id` is a candidate lock; whether it is enforced depends
/// on the lock registry, not on the attribute alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodeAttrs {
	/// Lock identifier stamped on the node.
	pub lock_id: Option<LockId>,
	/// Policy that created the node.
	pub source: Option<Source>,
}

impl NodeAttrs {
	/// Attributes of ordinary, unlocked text.
	pub const PLAIN: Self = Self {
		lock_id: None,
		source: None,
	};

	/// Attributes of a locked node.
	pub fn locked(lock_id: LockId, source: Source) -> Self {
		Self {
			lock_id: Some(lock_id),
			source: Some(source),
		}
	}

	/// Returns true if the node carries no attributes.
	pub fn is_plain(&self) -> bool {
		self.lock_id.is_none() && self.source.is_none()
	}

	/// Returns the lock id, if any.
	pub fn lock_id(&self) -> Option<&LockId> {
		self.lock_id.as_ref()
	}
}
