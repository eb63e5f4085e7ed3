use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use impetus_primitives::{Change, Content, LockId, NodeAttrs, Range, Source, Transaction};
use proptest::prelude::*;

use super::*;

fn locked(id: &str) -> NodeAttrs {
	NodeAttrs::locked(LockId::new(id), Source::Primary)
}

/// "Hello world." with "Hello" locked as L1.
fn fixture() -> (Arc<LockRegistry>, Document) {
	let registry = Arc::new(LockRegistry::new());
	registry.register(LockId::new("L1"), Source::Primary);
	let doc = Document::from_content(Content::from_nodes([
		("Hello", locked("L1")),
		(" world.", NodeAttrs::PLAIN),
	]));
	(registry, doc)
}

#[test]
fn delete_overlapping_lock_is_vetoed() {
	let (registry, doc) = fixture();
	let guard = MutationGuard::new(registry);
	assert!(!guard.should_allow(&Transaction::delete(doc.content(), 0, 5), &doc));
	assert!(!guard.should_allow(&Transaction::delete(doc.content(), 4, 8), &doc));
}

#[test]
fn delete_of_plain_text_is_allowed() {
	let (registry, doc) = fixture();
	let guard = MutationGuard::new(registry);
	assert!(guard.should_allow(&Transaction::delete(doc.content(), 6, 11), &doc));
	assert!(guard.should_allow(&Transaction::delete(doc.content(), 5, 6), &doc));
}

#[test]
fn insertion_inside_lock_is_vetoed_but_boundaries_are_not() {
	let (registry, doc) = fixture();
	let guard = MutationGuard::new(registry);
	assert!(!guard.should_allow(&Transaction::insert(doc.content(), 2, "x"), &doc));
	assert!(guard.should_allow(&Transaction::insert(doc.content(), 0, "x"), &doc));
	assert!(guard.should_allow(&Transaction::insert(doc.content(), 5, "x"), &doc));
}

#[test]
fn inserted_lock_attributes_are_always_vetoed() {
	let (registry, doc) = fixture();
	let guard = MutationGuard::new(Arc::clone(&registry));
	let forged = Transaction::insert_node(doc.content(), 12, "fake", locked("L1"));
	assert_eq!(guard.find_violation(&forged, &doc).as_deref(), Some("L1"));

	let premade = Transaction::insert_node(doc.content(), 12, "new", locked("L7"));
	assert_eq!(guard.find_violation(&premade, &doc).as_deref(), Some("L7"));
	assert!(!guard.should_allow(&premade, &doc));
	assert!(!registry.is_locked("L7"));
}

#[test]
fn unregistered_lock_attribute_does_not_protect_existing_text() {
	let registry = Arc::new(LockRegistry::new());
	let doc = Document::from_content(Content::from_nodes([("abc", locked("pending"))]));
	let guard = MutationGuard::new(registry);
	assert!(guard.should_allow(&Transaction::delete(doc.content(), 0, 3), &doc));
}

#[test]
fn selection_only_transactions_are_always_allowed() {
	let (registry, doc) = fixture();
	let guard = MutationGuard::new(registry);
	assert!(guard.should_allow(&Transaction::select(Range::new(0, 5)), &doc));
}

#[test]
fn multi_change_transaction_is_vetoed_as_a_whole() {
	let (registry, doc) = fixture();
	let guard = MutationGuard::new(registry);
	let tx = Transaction::change(
		doc.content(),
		[
			Change {
				start: 6,
				end: 11,
				replacement: Some("there".into()),
			},
			Change {
				start: 1,
				end: 2,
				replacement: None,
			},
		],
	);
	assert_eq!(guard.find_violation(&tx, &doc).as_deref(), Some("L1"));
}

#[test]
fn reject_callback_fires_once_per_veto() {
	let (registry, doc) = fixture();
	let rejections = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&rejections);
	let guard = MutationGuard::new(registry).on_reject(move || {
		counter.fetch_add(1, Ordering::SeqCst);
	});

	guard.should_allow(&Transaction::delete(doc.content(), 0, 12), &doc);
	guard.should_allow(&Transaction::delete(doc.content(), 6, 11), &doc);
	assert_eq!(rejections.load(Ordering::SeqCst), 1);
}

#[test]
fn legacy_markers_are_opt_in() {
	let registry = Arc::new(LockRegistry::new());
	registry.register(LockId::new("old-7"), Source::Chaos);
	let doc = Document::new("<!-- lock:old-7 -->\n> legacy block");
	let tx = Transaction::delete(doc.content(), 0, 5);

	let strict = MutationGuard::new(Arc::clone(&registry));
	assert!(strict.should_allow(&tx, &doc));

	let compat = MutationGuard::new(registry).with_config(GuardConfig {
		legacy_markers: true,
	});
	assert!(!compat.should_allow(&tx, &doc));
}

#[test]
fn legacy_scan_is_bounded() {
	let registry = Arc::new(LockRegistry::new());
	registry.register(LockId::new("far"), Source::Chaos);
	let text = format!("{}<!-- lock:far -->", "x".repeat(LEGACY_SCAN_LIMIT));
	let doc = Document::new(&text);
	let guard = MutationGuard::new(registry).with_config(GuardConfig {
		legacy_markers: true,
	});
	assert!(guard.should_allow(&Transaction::delete(doc.content(), 0, 1), &doc));
}

#[test]
fn legacy_marker_rejects_bad_ids() {
	let registry = Arc::new(LockRegistry::new());
	registry.register(LockId::new("a b"), Source::Chaos);
	let doc = Document::new("<!-- lock:a b -->");
	let guard = MutationGuard::new(registry).with_config(GuardConfig {
		legacy_markers: true,
	});
	assert!(guard.should_allow(&Transaction::delete(doc.content(), 0, 3), &doc));
}

proptest! {
	/// Any deletion overlapping the locked span is vetoed; any deletion outside it passes.
	#[test]
	fn lock_inviolability(from in 0usize..12, len in 1usize..12) {
		let (registry, doc) = fixture();
		let guard = MutationGuard::new(registry);
		let to = (from + len).min(12);
		prop_assume!(from < to);

		let allowed = guard.should_allow(&Transaction::delete(doc.content(), from, to), &doc);
		prop_assert_eq!(allowed, from >= 5);
	}

	/// Insertions are vetoed exactly when they land strictly inside the lock.
	#[test]
	fn insertion_points(at in 0usize..=12) {
		let (registry, doc) = fixture();
		let guard = MutationGuard::new(registry);
		let allowed = guard.should_allow(&Transaction::insert(doc.content(), at, "z"), &doc);
		prop_assert_eq!(allowed, !(1..5).contains(&at));
	}
}
