use serde::Deserialize;
use serde::Serialize;

/// A location in a source file. `line` and `column` are 1-indexed, `offset`
/// is a byte offset from the start of the file.
#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Point {
	pub line: usize,
	pub column: usize,
	pub offset: usize,
}

impl Point {
	pub const fn new(line: usize, column: usize, offset: usize) -> Self {
		Self {
			line,
			column,
			offset,
		}
	}
}

/// Pre-computed table of line-start byte offsets for efficient offset-to-point
/// conversion. Built once per file (O(n)), then each lookup is a binary search.
#[derive(Debug, Clone)]
pub struct LineTable {
	/// Byte offsets of the start of each line. `line_starts[0]` is always 0.
	line_starts: Vec<usize>,
}

impl LineTable {
	pub fn new(content: &str) -> Self {
		let mut line_starts = vec![0];
		for (i, byte) in content.bytes().enumerate() {
			if byte == b'\n' {
				line_starts.push(i + 1);
			}
		}
		Self { line_starts }
	}

	/// Convert a byte offset into a 1-indexed [`Point`].
	pub fn point(&self, offset: usize) -> Point {
		let line_idx = match self.line_starts.binary_search(&offset) {
			Ok(exact) => exact,
			Err(insert) => insert.saturating_sub(1),
		};

		Point {
			line: line_idx + 1,
			column: offset - self.line_starts[line_idx] + 1,
			offset,
		}
	}
}

/// Byte offset of the first character of the line containing `offset`.
pub(crate) fn line_start(text: &str, offset: usize) -> usize {
	text[..offset].rfind('\n').map_or(0, |index| index + 1)
}

/// The leading whitespace of the line containing `offset`.
pub(crate) fn line_indent(text: &str, offset: usize) -> &str {
	let start = line_start(text, offset);
	let rest = &text[start..];
	let width = rest
		.bytes()
		.take_while(|byte| *byte == b' ' || *byte == b'\t')
		.count();
	&rest[..width]
}
