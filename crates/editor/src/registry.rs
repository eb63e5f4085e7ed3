//! Authoritative set of active locks.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use impetus_primitives::{LockId, Source};
use parking_lot::RwLock;
use tracing::debug;

/// An active lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
	/// Identifier stamped on the locked nodes.
	pub lock_id: LockId,
	/// Policy that created the lock.
	pub source: Source,
	/// Registration time.
	pub created_at: DateTime<Utc>,
}

/// Hash-backed registry of locks.
///
/// Locks are permanent for the session: there is no removal operation.
/// Lookups borrow as `&str` and never allocate.
#[derive(Debug, Default)]
pub struct LockRegistry {
	locks: RwLock<HashMap<LockId, Lock>>,
}

impl LockRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a lock. Returns false if the id was already registered, in
	/// which case the existing entry is kept.
	pub fn register(&self, lock_id: LockId, source: Source) -> bool {
		let mut locks = self.locks.write();
		if locks.contains_key(&lock_id) {
			return false;
		}
		debug!(%lock_id, %source, "lock.register");
		let lock = Lock {
			lock_id: lock_id.clone(),
			source,
			created_at: Utc::now(),
		};
		locks.insert(lock_id, lock);
		true
	}

	/// Returns true if `lock_id` is registered.
	pub fn is_locked(&self, lock_id: &str) -> bool {
		self.locks.read().contains_key(lock_id)
	}

	/// Returns the lock registered under `lock_id`.
	pub fn get(&self, lock_id: &str) -> Option<Lock> {
		self.locks.read().get(lock_id).cloned()
	}

	/// Number of registered locks.
	pub fn count(&self) -> usize {
		self.locks.read().len()
	}

	/// Snapshot of every registered id.
	pub fn all(&self) -> HashSet<LockId> {
		self.locks.read().keys().cloned().collect()
	}
}
