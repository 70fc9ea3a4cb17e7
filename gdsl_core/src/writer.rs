use std::cmp::Reverse;
use std::ops::Range;

use derive_more::Deref;
use serde::Serialize;
use tracing::debug;

use crate::DslError;
use crate::DslResult;
use crate::FileModel;
use crate::element::DslTree;
use crate::element::ElementId;
use crate::element::ElementKind;
use crate::element::Literal;
use crate::element::Quote;
use crate::element::Span;
use crate::element::Syntax;
use crate::element::is_identifier;
use crate::position::line_indent;
use crate::position::line_start;

/// Replace `range` of the original text with `replacement`. An empty range is
/// an insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextEdit {
	pub range: Range<usize>,
	pub replacement: String,
}

impl TextEdit {
	pub fn new(range: Range<usize>, replacement: impl Into<String>) -> Self {
		Self {
			range,
			replacement: replacement.into(),
		}
	}

	pub fn insert(offset: usize, text: impl Into<String>) -> Self {
		Self::new(offset..offset, text)
	}

	pub fn delete(range: Range<usize>) -> Self {
		Self::new(range, "")
	}
}

/// A set of non-overlapping edits sorted by position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deref)]
pub struct TextPatch(Vec<TextEdit>);

impl TextPatch {
	/// Sort the edits by position. Edits may touch but never overlap; an
	/// insertion at the start of a replaced range is applied before it.
	pub fn new(mut edits: Vec<TextEdit>) -> DslResult<Self> {
		edits.sort_by_key(|edit| (edit.range.start, edit.range.end));

		for pair in edits.windows(2) {
			let (previous, next) = (&pair[0], &pair[1]);
			if next.range.start < previous.range.end {
				return Err(DslError::UnwritableEdit(format!(
					"edit of bytes {}..{} overlaps edit of bytes {}..{}",
					next.range.start, next.range.end, previous.range.start, previous.range.end
				)));
			}
		}

		Ok(Self(edits))
	}

	/// Apply the patch to the text it was computed against.
	pub fn apply(&self, text: &str) -> String {
		let mut result = String::with_capacity(text.len());
		let mut cursor = 0;

		for edit in &self.0 {
			let start = edit.range.start.clamp(cursor, text.len());
			let end = edit.range.end.clamp(start, text.len());
			result.push_str(&text[cursor..start]);
			result.push_str(&edit.replacement);
			cursor = end;
		}

		result.push_str(&text[cursor..]);
		result
	}

	pub fn edits(&self) -> &[TextEdit] {
		&self.0
	}
}

/// Whether the tree of `file` differs from its persisted text.
pub fn has_pending_changes(file: &FileModel) -> bool {
	let tree = file.tree();
	!tree.removed().is_empty() || subtree_changed(tree, tree.root())
}

fn subtree_changed(tree: &DslTree, id: ElementId) -> bool {
	tree.children(id).iter().any(|child| {
		let element = tree.get(*child);
		element.modified || element.is_new() || subtree_changed(tree, *child)
	})
}

/// Compute the smallest patch that makes the persisted text of `file` match
/// its tree. Unmodified elements are never re-emitted, so a file without edits
/// produces an empty patch.
pub fn compute_patch(file: &FileModel, indent_unit: &str) -> DslResult<TextPatch> {
	let mut builder = PatchBuilder {
		tree: file.tree(),
		text: file.text(),
		unit: indent_unit,
		edits: Vec::new(),
	};

	let tree = builder.tree;
	let mut removed = tree.removed().to_vec();
	removed.sort_by_key(|range| (range.start, Reverse(range.end)));
	let mut covered = 0;
	for range in removed {
		// Statements removed before their enclosing block go with the block.
		if range.end <= covered && range.start < covered {
			continue;
		}
		covered = range.end;
		let range = builder.statement_lines(range);
		builder.edits.push(TextEdit::delete(range));
	}

	builder.collect(builder.tree.root())?;

	let patch = TextPatch::new(builder.edits)?;
	debug!(path = %file.path().display(), edits = patch.len(), "computed patch");
	Ok(patch)
}

struct PatchBuilder<'a> {
	tree: &'a DslTree,
	text: &'a str,
	unit: &'a str,
	edits: Vec<TextEdit>,
}

impl PatchBuilder<'_> {
	fn collect(&mut self, id: ElementId) -> DslResult<()> {
		let tree = self.tree;
		let element = tree.get(id);

		if id != tree.root() {
			let Some(span) = &element.span else {
				// Rendered as part of its parent's insertion.
				return Ok(());
			};

			if element.modified {
				let replacement = self.rerender(id, span)?;
				self.edits.push(TextEdit::new(span.value.clone(), replacement));
				return Ok(());
			}
		}

		if element.kind.is_block() {
			self.insert_new_children(id)?;
		}

		for child in &element.children {
			self.collect(*child)?;
		}

		Ok(())
	}

	fn rerender(&self, id: ElementId, span: &Span) -> DslResult<String> {
		let element = self.tree.get(id);
		let whole_statement = span.value == span.full
			&& matches!(
				element.syntax,
				Syntax::Assignment | Syntax::Application | Syntax::Call | Syntax::Infix
			);

		if whole_statement {
			let indent = line_indent(self.text, span.full.start);
			return render_statement(self.tree, id, indent, self.unit);
		}

		match element.syntax {
			Syntax::Application => render_arguments(self.tree, id),
			_ => render_value(self.tree, id),
		}
	}

	/// Insert runs of new statements next to their nearest parsed sibling.
	fn insert_new_children(&mut self, block: ElementId) -> DslResult<()> {
		let tree = self.tree;
		let children = tree.children(block);
		if !children.iter().any(|child| tree.get(*child).is_new()) {
			return Ok(());
		}

		let indent = self.child_indent(block);
		let mut index = 0;

		while index < children.len() {
			if !tree.get(children[index]).is_new() {
				index += 1;
				continue;
			}

			let run_start = index;
			while index < children.len() && tree.get(children[index]).is_new() {
				index += 1;
			}

			let rendered = children[run_start..index]
				.iter()
				.map(|child| render_statement(tree, *child, &indent, self.unit))
				.collect::<DslResult<Vec<_>>>()?;
			let previous = run_start.checked_sub(1).map(|previous| children[previous]);
			let next = children.get(index).copied();

			let edit = self.anchored_insertion(block, previous, next, &indent, &rendered);
			self.edits.push(edit);
		}

		Ok(())
	}

	fn anchored_insertion(
		&self,
		block: ElementId,
		previous: Option<ElementId>,
		next: Option<ElementId>,
		indent: &str,
		rendered: &[String],
	) -> TextEdit {
		let tree = self.tree;
		let text = self.text;

		if let Some(span) = previous.and_then(|id| tree.get(id).span.as_ref()) {
			let insertion: String = rendered
				.iter()
				.map(|statement| format!("\n{indent}{statement}"))
				.collect();
			return TextEdit::insert(span.full.end, insertion);
		}

		if let Some(span) = next.and_then(|id| tree.get(id).span.as_ref()) {
			let start = span.full.start;
			let line = line_start(text, start);
			if text[line..start].trim().is_empty() {
				let insertion: String = rendered
					.iter()
					.map(|statement| format!("{indent}{statement}\n"))
					.collect();
				return TextEdit::insert(line, insertion);
			}

			let insertion: String = rendered
				.iter()
				.map(|statement| format!("{statement}\n{indent}"))
				.collect();
			return TextEdit::insert(start, insertion);
		}

		let body = tree.get(block).span.as_ref().and_then(|span| span.body.clone());
		let Some(body) = body else {
			// The file root: append at the end.
			let mut insertion = String::new();
			if !text.is_empty() && !text.ends_with('\n') {
				insertion.push('\n');
			}
			for statement in rendered {
				insertion.push_str(statement);
				insertion.push('\n');
			}
			return TextEdit::insert(text.len(), insertion);
		};

		let lines: String = rendered
			.iter()
			.map(|statement| format!("\n{indent}{statement}"))
			.collect();

		if text[body.clone()].contains('\n') {
			TextEdit::insert(body.start, lines)
		} else {
			let outer = tree
				.get(block)
				.span
				.as_ref()
				.map_or("", |span| line_indent(text, span.full.start));
			TextEdit::new(body, format!("{lines}\n{outer}"))
		}
	}

	fn child_indent(&self, block: ElementId) -> String {
		let tree = self.tree;
		let parsed_child = tree
			.children(block)
			.iter()
			.find_map(|child| tree.get(*child).span.as_ref());

		if let Some(span) = parsed_child {
			return line_indent(self.text, span.full.start).to_string();
		}

		match &tree.get(block).span {
			Some(span) => format!("{}{}", line_indent(self.text, span.full.start), self.unit),
			None => String::new(),
		}
	}

	/// Extend a removed statement to its whole line when nothing else shares
	/// the line.
	fn statement_lines(&self, range: Range<usize>) -> Range<usize> {
		let text = self.text;
		let end = range.end.min(text.len());
		let start = range.start.min(end);
		let line = line_start(text, start);

		let rest = &text[end..];
		let line_end = rest.find('\n').map_or(text.len(), |index| end + index + 1);
		let trailing = text[end..line_end].trim();

		if text[line..start].trim().is_empty() && (trailing.is_empty() || trailing == ";") {
			line..line_end
		} else {
			start..end
		}
	}
}

/// Render an element as a complete statement at `indent`.
pub fn render_statement(
	tree: &DslTree,
	id: ElementId,
	indent: &str,
	unit: &str,
) -> DslResult<String> {
	let element = tree.get(id);

	if let ElementKind::Raw(text) = &element.kind {
		return Ok(text.clone());
	}

	match element.syntax {
		Syntax::Assignment => Ok(format!("{} = {}", element.name, render_value(tree, id)?)),
		Syntax::Application => {
			Ok(format!("{} {}", element.name, render_arguments(tree, id)?))
		}
		Syntax::Call => {
			match &element.kind {
				ElementKind::MethodCall { .. } => {
					Ok(format!("{}({})", element.name, render_arguments(tree, id)?))
				}
				_ => Ok(format!("{}({})", element.name, render_value(tree, id)?)),
			}
		}
		Syntax::Infix => render_value(tree, id),
		Syntax::Block => {
			let inner = format!("{indent}{unit}");
			let mut text = format!("{} {{", element.name);
			for child in &element.children {
				text.push('\n');
				text.push_str(&inner);
				text.push_str(&render_statement(tree, *child, &inner, unit)?);
			}
			text.push('\n');
			text.push_str(indent);
			text.push('}');
			Ok(text)
		}
		Syntax::Argument | Syntax::Entry => {
			Err(DslError::UnwritableEdit(format!(
				"`{}` is an expression, not a statement",
				element.name
			)))
		}
	}
}

/// Render the arguments of a call without the method name or parentheses.
fn render_arguments(tree: &DslTree, id: ElementId) -> DslResult<String> {
	let element = tree.get(id);
	match &element.kind {
		ElementKind::MethodCall { .. } => {
			let arguments = element
				.children
				.iter()
				.map(|child| render_value(tree, *child))
				.collect::<DslResult<Vec<_>>>()?;
			Ok(arguments.join(", "))
		}
		_ => render_value(tree, id),
	}
}

/// Render an element as an expression.
pub fn render_value(tree: &DslTree, id: ElementId) -> DslResult<String> {
	let element = tree.get(id);
	match &element.kind {
		ElementKind::Literal(literal) => Ok(render_literal(literal)),
		ElementKind::Reference(text) | ElementKind::Raw(text) => Ok(text.clone()),
		ElementKind::MethodCall { method, parens } => {
			let arguments = render_arguments(tree, id)?;
			if *parens {
				Ok(format!("{method}({arguments})"))
			} else {
				Ok(format!("{method} {arguments}"))
			}
		}
		ElementKind::Infix => {
			let pairs = element
				.children
				.iter()
				.map(|child| {
					render_value(tree, *child)
						.map(|value| format!("{} {value}", tree.get(*child).name))
				})
				.collect::<DslResult<Vec<_>>>()?;
			Ok(pairs.join(" "))
		}
		ElementKind::List => {
			let items = element
				.children
				.iter()
				.map(|child| render_value(tree, *child))
				.collect::<DslResult<Vec<_>>>()?;
			Ok(format!("[{}]", items.join(", ")))
		}
		ElementKind::Map { bracketed } => {
			let entries = element
				.children
				.iter()
				.map(|child| {
					render_value(tree, *child)
						.map(|value| format!("{}: {value}", render_key(&tree.get(*child).name)))
				})
				.collect::<DslResult<Vec<_>>>()?;

			match (bracketed, entries.is_empty()) {
				(true, true) => Ok("[:]".to_string()),
				(true, false) => Ok(format!("[{}]", entries.join(", "))),
				(false, _) => Ok(entries.join(", ")),
			}
		}
		ElementKind::Block => {
			Err(DslError::UnwritableEdit(format!(
				"block `{}` cannot be written as a value",
				element.name
			)))
		}
	}
}

fn render_key(key: &str) -> String {
	if is_identifier(key) {
		key.to_string()
	} else {
		render_string(key, Quote::Single)
	}
}

fn render_literal(literal: &Literal) -> String {
	match literal {
		Literal::String { value, quote } => render_string(value, *quote),
		Literal::Number(text) => text.clone(),
		Literal::Boolean(flag) => flag.to_string(),
	}
}

fn render_string(value: &str, quote: Quote) -> String {
	let quote = quote.fitting(value);
	let escaped = match quote {
		Quote::Single => escape_string(value, '\''),
		Quote::Double => escape_string(value, '"'),
		Quote::TripleSingle | Quote::TripleDouble => value.replace('\\', "\\\\"),
	};
	let delimiter = quote.delimiter();
	format!("{delimiter}{escaped}{delimiter}")
}

/// Escape a value for a single-line string delimited by `quote`.
fn escape_string(value: &str, quote: char) -> String {
	let mut escaped = String::with_capacity(value.len());
	for ch in value.chars() {
		match ch {
			'\\' => escaped.push_str("\\\\"),
			'\n' => escaped.push_str("\\n"),
			'\r' => escaped.push_str("\\r"),
			'\t' => escaped.push_str("\\t"),
			ch if ch == quote => {
				escaped.push('\\');
				escaped.push(ch);
			}
			ch => escaped.push(ch),
		}
	}
	escaped
}
