//! Core types for lock-aware text editing: ranges, node attributes, content
//! and transactions.

/// Node attributes, lock identifiers and lock sources.
pub mod attrs;
/// Rope-backed text with a node table.
pub mod content;
/// Edit operation types: errors, policies and results.
pub mod edit;
/// Character-indexed ranges.
pub mod range;
/// Undo/redo transaction primitives.
pub mod transaction;

pub use attrs::{LockId, NodeAttrs, Source};
pub use content::{Content, Node, Nodes};
pub use edit::{CommitResult, EditCommit, EditError, EditOrigin, UndoPolicy};
pub use range::{CharIdx, CharLen, Range};
pub use ropey::{Rope, RopeSlice};
pub use transaction::{Bias, Change, ChangeSet, Insertion, Operation, Tendril, Touch, Transaction};
