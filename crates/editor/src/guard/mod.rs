//! Mutation guard: vetoes transactions that touch registered locks.
//!
//! The guard plugs into the session through [`TransactionFilter`]. For every
//! region a transaction touches it reads the structured `lock_id` attribute of
//! the affected nodes and asks the [`LockRegistry`]. The first hit vetoes the
//! whole transaction.
//!
//! A transaction touches:
//!
//! - every node overlapping a deleted range,
//! - the node strictly enclosing an insertion point (an insertion on a node
//!   boundary touches neither neighbour),
//! - any inserted node carrying a lock id at all. Only the content mutator
//!   stamps locks, and it never passes through the filters.

#[cfg(test)]
mod tests;

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use impetus_primitives::{Node, Touch, Transaction};
use tracing::{debug, trace};

use crate::document::Document;
use crate::registry::LockRegistry;

/// Interception point consulted before a transaction reaches the commit gate.
pub trait TransactionFilter: Send + Sync {
	/// Returns false to veto `tx`. `doc` is the document before the edit.
	fn should_allow(&self, tx: &Transaction, doc: &Document) -> bool;
}

/// Side channel invoked once per vetoed transaction.
pub type RejectCallback = Box<dyn Fn() + Send + Sync>;

/// Longest prefix of a node inspected for a legacy marker.
pub const LEGACY_SCAN_LIMIT: usize = 256;

/// Longest lock id accepted from a legacy marker.
pub const LEGACY_ID_MAX: usize = 64;

const LEGACY_OPEN: &str = "<!-- lock:";
const LEGACY_CLOSE: &str = "-->";

/// Guard tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardConfig {
	/// Also recognise `<!-- lock:ID -->` markers in nodes without a structured
	/// lock attribute. Off by default.
	pub legacy_markers: bool,
}

/// Vetoes transactions that touch locked nodes.
pub struct MutationGuard {
	registry: Arc<LockRegistry>,
	config: GuardConfig,
	on_reject: Option<RejectCallback>,
}

impl MutationGuard {
	/// Creates a guard backed by `registry`.
	pub fn new(registry: Arc<LockRegistry>) -> Self {
		Self {
			registry,
			config: GuardConfig::default(),
			on_reject: None,
		}
	}

	/// Replaces the configuration.
	pub fn with_config(mut self, config: GuardConfig) -> Self {
		self.config = config;
		self
	}

	/// Installs the rejection side channel.
	pub fn on_reject(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
		self.on_reject = Some(Box::new(callback));
		self
	}

	/// Returns the first registered lock `tx` touches, if any.
	///
	/// Transactions that change no content are never scanned.
	pub fn find_violation(&self, tx: &Transaction, doc: &Document) -> Option<String> {
		if !tx.changes_content() {
			return None;
		}
		let content = doc.content();

		for touch in tx.changes().touches() {
			let hit = match touch {
				Touch::Delete { from, to } => content
					.nodes_overlapping(from, to)
					.find_map(|node| self.registered_lock(&node)),
				Touch::Insert { at, insertion } => content
					.node_enclosing(at)
					.and_then(|node| self.registered_lock(&node))
					.or_else(|| insertion.attrs().lock_id().map(|id| id.to_string())),
			};
			if hit.is_some() {
				return hit;
			}
		}
		None
	}

	/// The node's lock id, if it is registered.
	fn registered_lock(&self, node: &Node<'_>) -> Option<String> {
		let candidate = match node.attrs.lock_id() {
			Some(id) => Cow::Borrowed(id.as_str()),
			None if self.config.legacy_markers => Cow::Owned(legacy_marker(node)?),
			None => return None,
		};
		let registered = self.registry.is_locked(&candidate);
		trace!(lock_id = %candidate, registered, start = node.start, end = node.end, "guard.node");
		registered.then(|| candidate.into_owned())
	}
}

impl TransactionFilter for MutationGuard {
	fn should_allow(&self, tx: &Transaction, doc: &Document) -> bool {
		match self.find_violation(tx, doc) {
			None => true,
			Some(lock_id) => {
				debug!(%lock_id, version = doc.version(), "guard.veto");
				if let Some(callback) = &self.on_reject {
					callback();
				}
				false
			}
		}
	}
}

impl fmt::Debug for MutationGuard {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MutationGuard")
			.field("config", &self.config)
			.field("locks", &self.registry.count())
			.field("on_reject", &self.on_reject.is_some())
			.finish()
	}
}

/// Reads a `<!-- lock:ID -->` marker from the first [`LEGACY_SCAN_LIMIT`]
/// characters of a node.
///
/// The id must be 1 to [`LEGACY_ID_MAX`] characters of `[A-Za-z0-9_-]`.
fn legacy_marker(node: &Node<'_>) -> Option<String> {
	let prefix: String = node.text().chars().take(LEGACY_SCAN_LIMIT).collect();
	let start = prefix.find(LEGACY_OPEN)? + LEGACY_OPEN.len();
	let rest = &prefix[start..];
	let end = rest.find(LEGACY_CLOSE)?;
	let id = rest[..end].trim();

	let valid = !id.is_empty()
		&& id.len() <= LEGACY_ID_MAX
		&& id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
	valid.then(|| id.to_owned())
}
