//! Operational transformation of concurrent changesets.
//!
//! Given two changesets `a` and `b` over the same source document,
//! [`ChangeSet::transform`] produces `a'` (applies after `b`) and `b'`
//! (applies after `a`) such that applying `b` then `a'` yields the same
//! document, node table included, as applying `a` then `b'`.

use super::changeset::ChangeSet;
use super::types::{Insertion, Operation};
use crate::range::CharLen;

/// The next unconsumed piece of an operation list.
enum Head<'a> {
	Retain(CharLen),
	Delete(CharLen),
	Insert(&'a Insertion),
	/// Operations are exhausted; the tail of the document is implicitly retained.
	End,
}

struct OpCursor<'a> {
	ops: &'a [Operation],
	index: usize,
	consumed: CharLen,
}

impl<'a> OpCursor<'a> {
	fn new(ops: &'a [Operation]) -> Self {
		Self {
			ops,
			index: 0,
			consumed: 0,
		}
	}

	fn head(&self) -> Head<'a> {
		match self.ops.get(self.index) {
			Some(Operation::Retain(n)) => Head::Retain(n - self.consumed),
			Some(Operation::Delete(n)) => Head::Delete(n - self.consumed),
			Some(Operation::Insert(ins)) => Head::Insert(ins),
			None => Head::End,
		}
	}

	/// Consumes `n` characters of the current retain or delete.
	fn consume(&mut self, n: CharLen) {
		let total = match self.ops.get(self.index) {
			Some(Operation::Retain(total) | Operation::Delete(total)) => *total,
			_ => return,
		};
		self.consumed += n;
		if self.consumed >= total {
			self.index += 1;
			self.consumed = 0;
		}
	}

	/// Skips the current insert.
	fn skip_insert(&mut self) {
		self.index += 1;
		self.consumed = 0;
	}
}

impl ChangeSet {
	/// Transforms `self` and `other`, both over the same source, against each other.
	///
	/// Returns `(self', other')` where `self'` applies after `other` and
	/// `other'` applies after `self`. When both insert at the same position,
	/// the text from `self` ends up first.
	pub fn transform(&self, other: &ChangeSet) -> (ChangeSet, ChangeSet) {
		debug_assert_eq!(self.len, other.len);

		let mut a_prime = ChangeSet::new();
		let mut b_prime = ChangeSet::new();
		let mut a = OpCursor::new(&self.changes);
		let mut b = OpCursor::new(&other.changes);

		loop {
			match (a.head(), b.head()) {
				(Head::End, Head::End) => break,
				(Head::Insert(ins), _) => {
					a_prime.insert_with(ins.text().to_owned(), ins.attrs().clone());
					b_prime.retain(ins.char_len());
					a.skip_insert();
				}
				(_, Head::Insert(ins)) => {
					a_prime.retain(ins.char_len());
					b_prime.insert_with(ins.text().to_owned(), ins.attrs().clone());
					b.skip_insert();
				}
				(Head::Retain(n), Head::Retain(m)) => {
					let len = n.min(m);
					a_prime.retain(len);
					b_prime.retain(len);
					a.consume(len);
					b.consume(len);
				}
				(Head::Delete(n), Head::Delete(m)) => {
					let len = n.min(m);
					a.consume(len);
					b.consume(len);
				}
				(Head::Delete(n), Head::Retain(m)) => {
					let len = n.min(m);
					a_prime.delete(len);
					a.consume(len);
					b.consume(len);
				}
				(Head::Retain(n), Head::Delete(m)) => {
					let len = n.min(m);
					b_prime.delete(len);
					a.consume(len);
					b.consume(len);
				}
				(Head::End, Head::Retain(m)) => {
					a_prime.retain(m);
					b_prime.retain(m);
					b.consume(m);
				}
				(Head::End, Head::Delete(m)) => {
					b_prime.delete(m);
					b.consume(m);
				}
				(Head::Retain(n), Head::End) => {
					a_prime.retain(n);
					b_prime.retain(n);
					a.consume(n);
				}
				(Head::Delete(n), Head::End) => {
					a_prime.delete(n);
					a.consume(n);
				}
			}
		}

		(a_prime, b_prime)
	}

	/// Rebases `self` so it applies after `over`, discarding `over'`.
	pub fn rebase(&self, over: &ChangeSet) -> ChangeSet {
		self.transform(over).0
	}
}
