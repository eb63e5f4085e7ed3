use impetus_primitives::{
	Change, EditCommit, EditError, EditOrigin, LockId, NodeAttrs, Range, Source, Transaction,
	UndoPolicy,
};

use super::Document;

fn make_commit(tx: Transaction) -> EditCommit {
	EditCommit {
		tx,
		undo: UndoPolicy::Record,
		origin: EditOrigin::User,
	}
}

#[test]
fn commit_increments_version_once() {
	let mut doc = Document::new("hello");
	let version_before = doc.version();

	let tx = Transaction::change(
		doc.content(),
		[Change {
			start: 0,
			end: 5,
			replacement: Some("world".into()),
		}],
	);
	let result = doc.commit(make_commit(tx)).unwrap();

	assert!(result.applied);
	assert!(result.undo_recorded);
	assert_eq!(result.version_before, version_before);
	assert_eq!(doc.version(), version_before + 1);
	assert_eq!(doc.content().to_string(), "world");
}

#[test]
fn commit_refuses_privileged_origin() {
	let mut doc = Document::new("hello");
	let tx = Transaction::delete(doc.content(), 0, 5);
	let commit = make_commit(tx).with_origin(EditOrigin::Mutator("forged"));

	assert_eq!(doc.commit(commit), Err(EditError::PrivilegedOrigin));
	assert_eq!(doc.content().to_string(), "hello");
	assert_eq!(doc.version(), 0);
}

#[test]
fn commit_refuses_stale_transaction() {
	let mut doc = Document::new("hello");
	let stale = Transaction::delete(&impetus_primitives::Content::new("hi"), 0, 1);

	assert_eq!(
		doc.commit(make_commit(stale)),
		Err(EditError::LengthMismatch {
			expected: 2,
			actual: 5
		})
	);
}

#[test]
fn selection_only_commit_keeps_version() {
	let mut doc = Document::new("hello");
	let result = doc.commit(make_commit(Transaction::select(Range::new(1, 3)))).unwrap();

	assert!(!result.applied);
	assert_eq!(doc.version(), 0);
	assert_eq!(doc.selection(), Range::new(1, 3));
	assert!(!doc.can_undo());
}

#[test]
fn selection_is_mapped_through_edits() {
	let mut doc = Document::new("hello world");
	doc.commit(make_commit(Transaction::select(Range::new(6, 11)))).unwrap();
	doc.commit(make_commit(Transaction::insert(doc.content(), 0, ">> ")))
		.unwrap();
	assert_eq!(doc.selection(), Range::new(9, 14));
}

#[test]
fn no_undo_commit_is_not_recorded() {
	let mut doc = Document::new("hello");
	let tx = Transaction::insert(doc.content(), 5, "!");
	let result = doc
		.commit(make_commit(tx).with_undo(UndoPolicy::NoUndo))
		.unwrap();

	assert!(!result.undo_recorded);
	assert!(!doc.can_undo());
}

#[test]
fn privileged_commit_bypasses_history_and_keeps_earlier_undo() {
	let mut doc = Document::new("Hello world.");
	doc.commit(make_commit(Transaction::delete(doc.content(), 5, 11)))
		.unwrap();
	assert_eq!(doc.content().to_string(), "Hello.");

	let lock = NodeAttrs::locked(LockId::new("L1"), Source::Chaos);
	let tx = Transaction::insert_node(doc.content(), 6, " Locked.", lock);
	let result = doc.commit_privileged(tx, "test").unwrap();
	assert!(!result.undo_recorded);
	assert_eq!(doc.history().undo_len(), 1);

	let undone = doc.apply_undo().unwrap();
	assert!(undone.applied);
	assert_eq!(doc.content().to_string(), "Hello world. Locked.");
	assert_eq!(doc.content().find_lock("L1"), Some((12, 20)));
	assert!(doc.apply_undo().is_none());
}
