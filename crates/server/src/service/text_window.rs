//! Cursor-relative sentence ranges over the client's context window.

use impetus_primitives::CharIdx;

/// Shortest range targeted by a destructive action.
pub const SENTENCE_MIN_CHARS: usize = 12;
/// Longest range targeted by a destructive action.
pub const SENTENCE_MAX_CHARS: usize = 400;

fn is_boundary(c: char) -> bool {
	matches!(c, '。' | '！' | '？' | '!' | '?' | '.' | '\n')
}

/// Length in characters of the last sentence of `context`, clamped to
/// `[SENTENCE_MIN_CHARS, SENTENCE_MAX_CHARS]`.
///
/// Trailing whitespace is ignored; the sentence starts after the previous
/// boundary, minus its leading whitespace.
pub fn last_sentence_len(context: &str) -> usize {
	let chars: Vec<char> = context.trim_end().chars().collect();
	let Some((_, body)) = chars.split_last() else {
		return SENTENCE_MIN_CHARS;
	};
	let start = body.iter().rposition(|&c| is_boundary(c)).map_or(0, |i| i + 1);
	let len = chars[start..]
		.iter()
		.skip_while(|c| c.is_whitespace())
		.count();
	len.clamp(SENTENCE_MIN_CHARS, SENTENCE_MAX_CHARS)
}

/// Document range `[from, cursor)` covering the last sentence before `cursor`.
///
/// `context` is the text that ends at `cursor`.
pub fn last_sentence_range(cursor: CharIdx, context: &str) -> (CharIdx, CharIdx) {
	let len = last_sentence_len(context);
	(cursor.saturating_sub(len), cursor)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn picks_the_last_sentence() {
		let context = "Hello world. This is a test.";
		assert_eq!(last_sentence_len(context), "This is a test.".len());
		assert_eq!(last_sentence_range(28, context), (13, 28));
	}

	#[test]
	fn unterminated_tail_is_a_sentence() {
		let context = "The rain stopped. Somewhere a dog kept barking";
		assert_eq!(last_sentence_len(context), "Somewhere a dog kept barking".len());
	}

	#[test]
	fn trailing_whitespace_and_newlines_are_ignored() {
		let context = "First line is here\nSecond line is longer  \n\n";
		assert_eq!(last_sentence_len(context), "Second line is longer".len());
	}

	#[test]
	fn cjk_punctuation_counts_characters() {
		let context = "他打开门。犹豫着要不要进去，门后传来低沉的呼吸声！";
		assert_eq!(last_sentence_len(context), 20);
	}

	#[test]
	fn length_is_clamped() {
		assert_eq!(last_sentence_len(""), SENTENCE_MIN_CHARS);
		assert_eq!(last_sentence_len("   "), SENTENCE_MIN_CHARS);
		assert_eq!(last_sentence_len("Hi."), SENTENCE_MIN_CHARS);
		assert_eq!(last_sentence_len(&"a".repeat(1000)), SENTENCE_MAX_CHARS);
	}

	#[test]
	fn range_never_starts_before_zero() {
		assert_eq!(last_sentence_range(5, "Short words here."), (0, 5));
		assert_eq!(last_sentence_range(0, "Anything at all."), (0, 0));
	}
}
