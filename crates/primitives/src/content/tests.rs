use super::*;
use crate::attrs::{LockId, Source};

fn locked(id: &str) -> NodeAttrs {
	NodeAttrs::locked(LockId::new(id), Source::Chaos)
}

#[test]
fn new_content_is_one_plain_node() {
	let content = Content::new("Hello world.");
	assert_eq!(content.len_chars(), 12);
	assert_eq!(content.node_count(), 1);
	assert!(content.nodes().all(|node| node.attrs.is_plain()));
}

#[test]
fn empty_content_has_no_nodes() {
	let content = Content::new("");
	assert!(content.is_empty());
	assert_eq!(content.node_count(), 0);
	assert_eq!(content.nodes().count(), 0);
}

#[test]
fn equal_neighbours_merge() {
	let content = Content::from_nodes([
		("ab", NodeAttrs::PLAIN),
		("", locked("L1")),
		("cd", NodeAttrs::PLAIN),
		("ef", locked("L1")),
		("gh", locked("L1")),
	]);
	assert_eq!(content.to_string(), "abcdefgh");
	assert_eq!(content.node_count(), 2);
	assert_eq!(content.find_lock("L1"), Some((4, 8)));
}

#[test]
fn nodes_carry_positions_and_text() {
	let content = Content::from_nodes([("Hello", locked("L1")), (" world", NodeAttrs::PLAIN)]);
	let nodes: Vec<_> = content.nodes().collect();
	assert_eq!((nodes[0].start, nodes[0].end), (0, 5));
	assert_eq!(nodes[0].text().to_string(), "Hello");
	assert_eq!(nodes[1].len(), 6);
}

#[test]
fn positions_count_characters_not_bytes() {
	let content = Content::from_nodes([("你好", locked("L1")), ("。世界", NodeAttrs::PLAIN)]);
	assert_eq!(content.len_chars(), 5);
	assert_eq!(content.find_lock("L1"), Some((0, 2)));
}

#[test]
fn overlap_query_is_half_open() {
	let content = Content::from_nodes([
		("aaa", NodeAttrs::PLAIN),
		("bbb", locked("L1")),
		("ccc", NodeAttrs::PLAIN),
	]);
	let hit: Vec<_> = content.nodes_overlapping(2, 4).map(|n| n.start).collect();
	assert_eq!(hit, vec![0, 3]);

	let touching: Vec<_> = content.nodes_overlapping(6, 9).map(|n| n.start).collect();
	assert_eq!(touching, vec![6]);

	assert_eq!(content.nodes_overlapping(3, 3).count(), 0);
}

#[test]
fn enclosing_excludes_boundaries() {
	let content = Content::from_nodes([("aaa", NodeAttrs::PLAIN), ("bbb", locked("L1"))]);
	assert!(content.node_enclosing(3).is_none());
	assert!(content.node_enclosing(6).is_none());
	let inner = content.node_enclosing(4).map(|n| n.start);
	assert_eq!(inner, Some(3));
}

#[test]
fn find_lock_returns_the_single_node() {
	let content = Content::from_nodes([
		("x", NodeAttrs::PLAIN),
		("aa", locked("L1")),
		("bb", locked("L1")),
		("y", NodeAttrs::PLAIN),
	]);
	assert_eq!(content.find_lock("L1"), Some((1, 5)));
	assert_eq!(content.find_lock("L2"), None);
}

#[test]
fn separated_lock_pieces_are_not_one_span() {
	let content = Content::from_nodes([
		("aa", locked("L1")),
		("x", locked("L2")),
		("bb", locked("L1")),
	]);
	assert_eq!(content.lock_nodes("L1").count(), 2);
	assert_eq!(content.find_lock("L1"), None);
	assert_eq!(content.find_lock("L2"), Some((2, 3)));
}

#[test]
fn cursor_splits_nodes_at_requested_lengths() {
	let content = Content::from_nodes([("aaa", NodeAttrs::PLAIN), ("bb", locked("L1"))]);
	let mut cursor = NodeCursor::new(content.spans());
	let mut pieces = Vec::new();
	cursor.take(4, |len, attrs| pieces.push((len, attrs.is_plain())));
	cursor.take_rest(|len, attrs| pieces.push((len, attrs.is_plain())));
	assert_eq!(pieces, vec![(3, true), (1, false), (1, false)]);
}
