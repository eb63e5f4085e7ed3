#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Lock enforcement over a live, node-attributed document.
//!
//! # Main Types
//!
//! - [`EditorSession`] - owns the document and routes every edit
//! - [`Document`] - content, version, selection and undo history behind one commit gate
//! - [`LockRegistry`] - the authoritative set of locks
//! - [`MutationGuard`] - the [`TransactionFilter`] that vetoes edits touching locks
//! - [`AnchorResolver`] - validates anchors against the live content
//! - [`ContentMutator`] - the privileged writer that creates locks
//!
//! # Architecture
//!
//! ```text
//! EditorSession
//! ├── filters: [MutationGuard, ..]   // user edits, undo, redo
//! ├── mutator: ContentMutator        // privileged, excluded from history
//! │   └── resolver: AnchorResolver
//! └── document: Document
//!     └── history: History           // rebased over privileged edits
//!
//! LockRegistry is shared by the guard, the resolver and the mutator.
//! ```

pub mod anchor;
pub mod document;
pub mod guard;
pub mod history;
pub mod mutator;
pub mod registry;
pub mod session;

pub use anchor::{AnchorError, AnchorResolver, ResolvedTarget};
pub use document::Document;
pub use guard::{GuardConfig, MutationGuard, RejectCallback, TransactionFilter};
pub use history::{History, MAX_UNDO};
pub use mutator::{ContentMutator, Mutation, MutationError};
pub use registry::{Lock, LockRegistry};
pub use session::{DispatchOutcome, EditorSession};
