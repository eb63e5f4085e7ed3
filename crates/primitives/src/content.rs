//! Rope-backed text with a node table of structured attributes.
//!
//! [`Content`] stores the text in a [`Rope`] and partitions it into an ordered
//! table of nodes. Each node covers a contiguous run of characters and carries
//! [`NodeAttrs`]. Lock detection reads those attributes; it never inspects the
//! text itself.
//!
//! # Invariants
//!
//! - Node lengths sum to `rope.len_chars()`.
//! - No node is empty.
//! - Adjacent nodes never carry equal attributes (they are merged on build).

#[cfg(test)]
mod tests;

use std::fmt;

use ropey::{Rope, RopeSlice};

use crate::attrs::NodeAttrs;
use crate::range::{CharIdx, CharLen};

/// A run of characters sharing one set of attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NodeSpan {
	pub(crate) len: CharLen,
	pub(crate) attrs: NodeAttrs,
}

/// Document text plus its node table.
#[derive(Clone, Default, PartialEq)]
pub struct Content {
	rope: Rope,
	nodes: Vec<NodeSpan>,
}

impl Content {
	/// Creates content made of a single plain node.
	pub fn new(text: &str) -> Self {
		Self::from_nodes([(text, NodeAttrs::PLAIN)])
	}

	/// Creates content from `(text, attrs)` pieces in document order.
	///
	/// Empty pieces are skipped and neighbours with equal attributes merge.
	pub fn from_nodes<'a>(pieces: impl IntoIterator<Item = (&'a str, NodeAttrs)>) -> Self {
		let mut rope = Rope::new();
		let mut table = NodeTableBuilder::default();
		for (text, attrs) in pieces {
			let len = text.chars().count();
			if len == 0 {
				continue;
			}
			rope.insert(rope.len_chars(), text);
			table.push(len, attrs);
		}
		Self {
			rope,
			nodes: table.finish(),
		}
	}

	/// Returns the text rope.
	pub fn rope(&self) -> &Rope {
		&self.rope
	}

	/// Returns a slice over the whole text.
	pub fn slice(&self) -> RopeSlice<'_> {
		self.rope.slice(..)
	}

	/// Returns the length in characters.
	pub fn len_chars(&self) -> CharLen {
		self.rope.len_chars()
	}

	/// Returns true if the content has no characters.
	pub fn is_empty(&self) -> bool {
		self.rope.len_chars() == 0
	}

	/// Returns the number of nodes.
	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	/// Iterates nodes in document order with their positions.
	pub fn nodes(&self) -> Nodes<'_> {
		Nodes {
			content: self,
			index: 0,
			start: 0,
		}
	}

	/// Iterates the nodes sharing at least one character with `[from, to)`.
	///
	/// Stops walking as soon as a node starts at or after `to`.
	pub fn nodes_overlapping(&self, from: CharIdx, to: CharIdx) -> impl Iterator<Item = Node<'_>> {
		self.nodes()
			.skip_while(move |node| node.end <= from)
			.take_while(move |node| node.start < to)
	}

	/// Returns the node whose interior strictly contains `pos`.
	///
	/// A position on a node boundary belongs to no interior.
	pub fn node_enclosing(&self, pos: CharIdx) -> Option<Node<'_>> {
		self.nodes()
			.take_while(|node| node.start < pos)
			.find(|node| node.start < pos && pos < node.end)
	}

	/// Iterates the nodes stamped with `lock_id`, in document order.
	pub fn lock_nodes<'a>(&'a self, lock_id: &'a str) -> impl Iterator<Item = Node<'a>> + 'a {
		self.nodes()
			.filter(move |node| node.attrs.lock_id().is_some_and(|id| id.as_str() == lock_id))
	}

	/// Returns the span of the one node stamped with `lock_id`.
	///
	/// Equal neighbours always merge, so an intact lock is exactly one node.
	/// A lock that is absent, or whose pieces are separated by other content,
	/// yields `None`.
	pub fn find_lock(&self, lock_id: &str) -> Option<(CharIdx, CharIdx)> {
		let mut nodes = self.lock_nodes(lock_id);
		let node = nodes.next()?;
		nodes.next().is_none().then_some((node.start, node.end))
	}

	pub(crate) fn parts_mut(&mut self) -> (&mut Rope, &mut Vec<NodeSpan>) {
		(&mut self.rope, &mut self.nodes)
	}

	pub(crate) fn spans(&self) -> &[NodeSpan] {
		&self.nodes
	}
}

impl fmt::Display for Content {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for chunk in self.rope.chunks() {
			f.write_str(chunk)?;
		}
		Ok(())
	}
}

impl fmt::Debug for Content {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.nodes()).finish()
	}
}

/// A positioned view of one node.
#[derive(Clone, Copy)]
pub struct Node<'a> {
	/// First character of the node.
	pub start: CharIdx,
	/// One past the last character of the node.
	pub end: CharIdx,
	/// Structured attributes of the node.
	pub attrs: &'a NodeAttrs,
	text: RopeSlice<'a>,
}

impl<'a> Node<'a> {
	/// Returns the node text.
	pub fn text(&self) -> RopeSlice<'a> {
		self.text
	}

	/// Returns the node length in characters.
	pub fn len(&self) -> CharLen {
		self.end - self.start
	}

	/// Nodes are never empty; provided for API symmetry.
	pub fn is_empty(&self) -> bool {
		self.start == self.end
	}
}

impl fmt::Debug for Node<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Node")
			.field("start", &self.start)
			.field("end", &self.end)
			.field("attrs", self.attrs)
			.field("text", &self.text.to_string())
			.finish()
	}
}

/// Iterator over positioned nodes.
pub struct Nodes<'a> {
	content: &'a Content,
	index: usize,
	start: CharIdx,
}

impl<'a> Iterator for Nodes<'a> {
	type Item = Node<'a>;

	fn next(&mut self) -> Option<Self::Item> {
		let span = self.content.nodes.get(self.index)?;
		let start = self.start;
		let end = start + span.len;
		self.index += 1;
		self.start = end;
		Some(Node {
			start,
			end,
			attrs: &span.attrs,
			text: self.content.rope.slice(start..end),
		})
	}
}

/// Accumulates node spans, dropping empties and merging equal neighbours.
#[derive(Default)]
pub(crate) struct NodeTableBuilder {
	nodes: Vec<NodeSpan>,
}

impl NodeTableBuilder {
	pub(crate) fn with_capacity(capacity: usize) -> Self {
		Self {
			nodes: Vec::with_capacity(capacity),
		}
	}

	pub(crate) fn push(&mut self, len: CharLen, attrs: NodeAttrs) {
		if len == 0 {
			return;
		}
		if let Some(last) = self.nodes.last_mut()
			&& last.attrs == attrs
		{
			last.len += len;
			return;
		}
		self.nodes.push(NodeSpan { len, attrs });
	}

	pub(crate) fn finish(self) -> Vec<NodeSpan> {
		self.nodes
	}
}

/// Walks a node table character-wise, handing out pieces of nodes.
pub(crate) struct NodeCursor<'a> {
	nodes: &'a [NodeSpan],
	index: usize,
	offset: CharLen,
}

impl<'a> NodeCursor<'a> {
	pub(crate) fn new(nodes: &'a [NodeSpan]) -> Self {
		Self {
			nodes,
			index: 0,
			offset: 0,
		}
	}

	/// Consumes `n` characters, calling `f` once per node piece.
	pub(crate) fn take(&mut self, mut n: CharLen, mut f: impl FnMut(CharLen, &'a NodeAttrs)) {
		while n > 0 {
			let Some(node) = self.nodes.get(self.index) else {
				return;
			};
			let step = (node.len - self.offset).min(n);
			f(step, &node.attrs);
			n -= step;
			self.offset += step;
			if self.offset == node.len {
				self.index += 1;
				self.offset = 0;
			}
		}
	}

	/// Consumes everything left.
	pub(crate) fn take_rest(&mut self, mut f: impl FnMut(CharLen, &'a NodeAttrs)) {
		while let Some(node) = self.nodes.get(self.index) {
			f(node.len - self.offset, &node.attrs);
			self.index += 1;
			self.offset = 0;
		}
	}
}
