use std::fmt::Display;
use std::ops::Range;

use serde::Deserialize;
use serde::Serialize;

use crate::DslError;
use crate::DslResult;
use crate::Value;

/// Handle to an element inside a [`DslTree`] arena.
///
/// Handles stay valid for the lifetime of the tree they came from. Removing an
/// element only detaches it; the arena slot is reclaimed when the file is
/// re-parsed.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ElementId(pub(crate) u32);

impl ElementId {
	pub fn index(self) -> usize {
		self.0 as usize
	}
}

/// The delimiter used for a string literal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quote {
	/// `'value'`
	#[default]
	Single,
	/// `"value"`, may contain `$interpolation`
	Double,
	/// `'''value'''`
	TripleSingle,
	/// `"""value"""`
	TripleDouble,
}

impl Quote {
	pub fn delimiter(self) -> &'static str {
		match self {
			Self::Single => "'",
			Self::Double => "\"",
			Self::TripleSingle => "'''",
			Self::TripleDouble => "\"\"\"",
		}
	}

	/// Whether `$name` and `${expr}` are expanded inside strings with this
	/// delimiter.
	pub fn interpolates(self) -> bool {
		matches!(self, Self::Double | Self::TripleDouble)
	}

	/// The closest delimiter that can hold `value` verbatim. A `$` never
	/// goes into an interpolating string, and a triple-quoted string cannot
	/// contain its own quote character.
	pub fn fitting(self, value: &str) -> Self {
		let quote = match self {
			Self::Double if value.contains('$') => Self::Single,
			Self::TripleDouble if value.contains('$') => Self::TripleSingle,
			quote => quote,
		};

		match quote {
			Self::TripleSingle if value.contains('\'') => Self::Single,
			Self::TripleDouble if value.contains('"') => Self::Double,
			quote => quote,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
	String { value: String, quote: Quote },
	/// A number exactly as written. `1.5` and `1.50` are different literals.
	Number(String),
	Boolean(bool),
}

impl Literal {
	pub fn string(value: impl Into<String>) -> Self {
		Self::String {
			value: value.into(),
			quote: Quote::Single,
		}
	}

	pub fn number(text: impl Into<String>) -> Self {
		Self::Number(text.into())
	}

	/// Whether this literal is a string that will be interpolated.
	pub fn is_interpolated(&self) -> bool {
		matches!(self, Self::String { value, quote } if quote.interpolates() && value.contains('$'))
	}
}

/// The closed set of element kinds in a build script tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
	Literal(Literal),
	/// A symbolic name such as `rootProject.ext.kotlinVersion`, resolved on
	/// demand.
	Reference(String),
	/// `method(args)` or `method arg, arg`. Arguments are the children.
	MethodCall { method: String, parens: bool },
	/// `id 'x' version '1.0' apply false`. Each pair is a child named by its
	/// key; the first child carries the statement name.
	Infix,
	List,
	/// Children are the entries, named by their keys. Unbracketed maps are
	/// named arguments such as `apply plugin: 'java'`.
	Map { bracketed: bool },
	/// A named scope such as `android { ... }`.
	Block,
	/// A statement the parser does not model, kept verbatim.
	Raw(String),
}

impl ElementKind {
	pub fn is_block(&self) -> bool {
		matches!(self, Self::Block)
	}

	/// Kinds whose children are expressions rather than statements.
	pub fn is_container(&self) -> bool {
		matches!(
			self,
			Self::MethodCall { .. } | Self::Infix | Self::List | Self::Map { .. }
		)
	}
}

/// How an element is written in the source. The writer uses this both to
/// render new elements and to decide which span a modified element replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Syntax {
	/// `name = value`
	Assignment,
	/// `name value, value`
	Application,
	/// `name(value, value)`
	Call,
	/// `name value key value`
	Infix,
	/// An anonymous list item or call argument.
	Argument,
	/// `key: value` inside a map, named arguments or an infix expression.
	Entry,
	/// `name { ... }`
	Block,
}

/// Source location of a parsed element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
	/// The whole statement or expression.
	pub full: Range<usize>,
	/// The part replaced when the element's value changes.
	pub value: Range<usize>,
	/// For blocks: the text between the braces.
	pub body: Option<Range<usize>>,
}

impl Span {
	pub fn expression(range: Range<usize>) -> Self {
		Self {
			full: range.clone(),
			value: range,
			body: None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
	pub name: String,
	pub kind: ElementKind,
	pub syntax: Syntax,
	pub parent: Option<ElementId>,
	pub children: Vec<ElementId>,
	/// `None` for elements created through the model.
	pub span: Option<Span>,
	/// Set when a parsed element's value must be re-rendered.
	pub modified: bool,
}

impl Element {
	pub fn new(name: impl Into<String>, kind: ElementKind, syntax: Syntax) -> Self {
		Self {
			name: name.into(),
			kind,
			syntax,
			parent: None,
			children: Vec::new(),
			span: None,
			modified: false,
		}
	}

	/// The name split into lookup segments.
	pub fn segments(&self) -> Vec<String> {
		split_path(&self.name)
	}

	pub fn is_new(&self) -> bool {
		self.span.is_none()
	}
}

/// The element arena for one file. The root is always a [`ElementKind::Block`]
/// with an empty name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DslTree {
	elements: Vec<Element>,
	root: ElementId,
	/// Source ranges of parsed statements removed from their block.
	removed: Vec<Range<usize>>,
}

impl Default for DslTree {
	fn default() -> Self {
		Self::new()
	}
}

impl DslTree {
	pub fn new() -> Self {
		Self {
			elements: vec![Element::new("", ElementKind::Block, Syntax::Block)],
			root: ElementId(0),
			removed: Vec::new(),
		}
	}

	pub fn root(&self) -> ElementId {
		self.root
	}

	pub fn get(&self, id: ElementId) -> &Element {
		&self.elements[id.index()]
	}

	pub(crate) fn get_mut(&mut self, id: ElementId) -> &mut Element {
		&mut self.elements[id.index()]
	}

	pub fn len(&self) -> usize {
		self.elements.len()
	}

	pub fn is_empty(&self) -> bool {
		self.elements.len() <= 1
	}

	pub fn children(&self, id: ElementId) -> &[ElementId] {
		&self.get(id).children
	}

	pub fn parent(&self, id: ElementId) -> Option<ElementId> {
		self.get(id).parent
	}

	pub(crate) fn removed(&self) -> &[Range<usize>] {
		&self.removed
	}

	/// Ancestors of `id`, nearest first. Does not include `id` itself.
	pub fn ancestors(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
		std::iter::successors(self.parent(id), |current| self.parent(*current))
	}

	/// Whether the element is reachable from the root.
	pub fn is_attached(&self, id: ElementId) -> bool {
		id == self.root || self.ancestors(id).any(|ancestor| ancestor == self.root)
	}

	/// Children of `parent` with exactly this name, in declaration order.
	pub fn children_named(&self, parent: ElementId, name: &str) -> Vec<ElementId> {
		self.children(parent)
			.iter()
			.copied()
			.filter(|child| self.get(*child).name == name)
			.collect()
	}

	/// The last declared child of `parent` with this name.
	pub fn child_named(&self, parent: ElementId, name: &str) -> Option<ElementId> {
		self.children(parent)
			.iter()
			.rev()
			.copied()
			.find(|child| self.get(*child).name == name)
	}

	/// Allocate a detached element.
	pub fn alloc(&mut self, element: Element) -> ElementId {
		let id = ElementId(self.elements.len() as u32);
		self.elements.push(element);
		id
	}

	/// Allocate a detached subtree representing `value`.
	pub fn alloc_value(&mut self, name: &str, syntax: Syntax, value: &Value) -> ElementId {
		let kind = kind_for_value(value);
		let id = self.alloc(Element::new(name, kind, syntax));
		self.alloc_value_children(id, value);
		id
	}

	fn alloc_value_children(&mut self, id: ElementId, value: &Value) {
		match value {
			Value::List(items) => {
				for item in items {
					let child = self.alloc_value("", Syntax::Argument, item);
					self.link(id, None, child);
				}
			}
			Value::Map(entries) => {
				for (key, item) in entries {
					let child = self.alloc_value(key, Syntax::Entry, item);
					self.link(id, None, child);
				}
			}
			Value::String(_) | Value::Number(_) | Value::Boolean(_) => {}
		}
	}

	/// Allocate `value` and append it to `parent`: as `name = value` in a
	/// block, as an entry in a map or infix expression, as an item anywhere
	/// else.
	pub fn add_value(&mut self, parent: ElementId, name: &str, value: &Value) -> DslResult<ElementId> {
		let syntax = match self.get(parent).kind {
			ElementKind::Block => Syntax::Assignment,
			ElementKind::Map { .. } | ElementKind::Infix => Syntax::Entry,
			_ => Syntax::Argument,
		};
		let child = self.alloc_value(name, syntax, value);
		self.add_child(parent, child)
	}

	/// Append a detached element to `parent`.
	pub fn add_child(&mut self, parent: ElementId, child: ElementId) -> DslResult<ElementId> {
		let index = self.children(parent).len();
		self.insert_child(parent, index, child)?;
		Ok(child)
	}

	/// Insert a detached element into `parent` at `index`. Fails with
	/// [`DslError::UnwritableEdit`] and leaves the tree untouched when the
	/// result could not be written back as text.
	pub fn insert_child(
		&mut self,
		parent: ElementId,
		index: usize,
		child: ElementId,
	) -> DslResult<()> {
		if self.get(child).parent.is_some() || child == self.root {
			return Err(DslError::UnwritableEdit(format!(
				"element `{}` already has a parent",
				self.get(child).name
			)));
		}
		if self.ancestors(parent).any(|ancestor| ancestor == child) || parent == child {
			return Err(DslError::UnwritableEdit(
				"an element cannot contain itself".into(),
			));
		}

		let parent_kind = &self.get(parent).kind;
		let element = self.get(child);
		match parent_kind {
			ElementKind::Block => validate_statement(self, child)?,
			ElementKind::Map { .. } | ElementKind::Infix => {
				if element.name.is_empty() {
					return Err(DslError::UnwritableEdit(
						"map entries and infix pairs need a key".into(),
					));
				}
				validate_expression(self, child)?;
			}
			ElementKind::MethodCall { .. } | ElementKind::List => {
				validate_expression(self, child)?;
			}
			ElementKind::Literal(_) | ElementKind::Reference(_) | ElementKind::Raw(_) => {
				return Err(DslError::UnwritableEdit(format!(
					"`{}` cannot have children",
					self.get(parent).name
				)));
			}
		}

		self.link(parent, Some(index), child);
		self.touch_container(parent);
		Ok(())
	}

	/// Detach `child` from `parent`. Parsed statements removed from a block
	/// are remembered so the writer can delete their text.
	pub fn remove_child(&mut self, parent: ElementId, child: ElementId) -> DslResult<()> {
		let Some(position) = self.children(parent).iter().position(|c| *c == child) else {
			return Err(DslError::UnwritableEdit(format!(
				"`{}` is not a child of `{}`",
				self.get(child).name,
				self.get(parent).name
			)));
		};

		self.get_mut(parent).children.remove(position);
		self.get_mut(child).parent = None;

		if self.get(parent).kind.is_block() {
			if let Some(range) = self.get(child).span.as_ref().map(|span| span.full.clone()) {
				self.removed.push(range);
			}
		} else {
			self.touch_container(parent);
		}

		Ok(())
	}

	/// Replace the value of `id` with a literal.
	pub fn set_literal(&mut self, id: ElementId, literal: Literal) -> DslResult<()> {
		self.replace_kind(id, ElementKind::Literal(literal))
	}

	/// Replace the value of `id` with a reference to another property.
	pub fn set_reference(&mut self, id: ElementId, text: &str) -> DslResult<()> {
		if split_path(text).is_empty() {
			return Err(DslError::UnwritableEdit(format!(
				"`{text}` is not a valid reference"
			)));
		}
		self.replace_kind(id, ElementKind::Reference(text.to_string()))
	}

	/// Replace the value of `id` with `value`, rebuilding list and map
	/// children. String literals keep their original quote style.
	pub fn set_value(&mut self, id: ElementId, value: &Value) -> DslResult<()> {
		let mut kind = kind_for_value(value);
		if let (
			ElementKind::Literal(Literal::String { quote, .. }),
			ElementKind::Literal(Literal::String { quote: new_quote, .. }),
		) = (&self.get(id).kind, &mut kind)
		{
			*new_quote = quote.fitting(value.as_str().unwrap_or_default());
		}

		self.replace_kind(id, kind)?;
		self.alloc_value_children(id, value);
		Ok(())
	}

	fn replace_kind(&mut self, id: ElementId, kind: ElementKind) -> DslResult<()> {
		let element = self.get(id);
		if matches!(element.kind, ElementKind::Block) || element.syntax == Syntax::Block {
			return Err(DslError::UnwritableEdit(format!(
				"block `{}` cannot be replaced by a value",
				element.name
			)));
		}
		if id == self.root {
			return Err(DslError::UnwritableEdit(
				"the file root cannot be replaced".into(),
			));
		}

		for child in std::mem::take(&mut self.get_mut(id).children) {
			self.get_mut(child).parent = None;
		}

		let element = self.get_mut(id);
		// An infix statement only keeps its shape while it is infix.
		if element.syntax == Syntax::Infix && !matches!(kind, ElementKind::Infix) {
			element.syntax = Syntax::Assignment;
			if let Some(span) = &mut element.span {
				span.value = span.full.clone();
			}
		}
		element.kind = kind;
		element.modified = true;
		Ok(())
	}

	/// Turn `id 'x'` into the infix statement `id 'x'` so further pairs such
	/// as `version '1.0'` can be appended.
	pub fn convert_call_to_infix(&mut self, id: ElementId) -> DslResult<()> {
		let element = self.get(id);
		let ElementKind::MethodCall { .. } = element.kind else {
			return Ok(());
		};
		if element.children.len() != 1 {
			return Err(DslError::UnwritableEdit(format!(
				"`{}` needs exactly one argument to become an infix expression",
				element.name
			)));
		}

		let name = element.name.clone();
		let argument = element.children[0];
		let child = self.get_mut(argument);
		child.name = name;
		child.syntax = Syntax::Entry;

		let element = self.get_mut(id);
		element.kind = ElementKind::Infix;
		element.syntax = Syntax::Infix;
		element.modified = true;
		if let Some(span) = &mut element.span {
			span.value = span.full.clone();
		}
		Ok(())
	}

	fn link(&mut self, parent: ElementId, index: Option<usize>, child: ElementId) {
		self.get_mut(child).parent = Some(parent);
		let children = &mut self.get_mut(parent).children;
		match index {
			Some(index) if index <= children.len() => children.insert(index, child),
			_ => children.push(child),
		}
	}

	/// Parsed containers are re-rendered as a whole when their items change.
	fn touch_container(&mut self, parent: ElementId) {
		let element = self.get_mut(parent);
		if element.kind.is_container() && element.span.is_some() {
			element.modified = true;
		}
	}

	pub(crate) fn set_span(&mut self, id: ElementId, span: Span) {
		self.get_mut(id).span = Some(span);
	}

	pub(crate) fn attach_parsed(&mut self, parent: ElementId, child: ElementId) {
		self.link(parent, None, child);
	}
}

fn kind_for_value(value: &Value) -> ElementKind {
	match value {
		Value::String(text) => ElementKind::Literal(Literal::string(text.clone())),
		Value::Number(text) => ElementKind::Literal(Literal::Number(text.clone())),
		Value::Boolean(flag) => ElementKind::Literal(Literal::Boolean(*flag)),
		Value::List(_) => ElementKind::List,
		Value::Map(_) => ElementKind::Map { bracketed: true },
	}
}

fn validate_statement(tree: &DslTree, id: ElementId) -> DslResult<()> {
	let element = tree.get(id);
	if let ElementKind::Raw(text) = &element.kind {
		return if text.trim().is_empty() {
			Err(DslError::UnwritableEdit("empty raw statement".into()))
		} else {
			Ok(())
		};
	}

	if !is_valid_name(&element.name) {
		return Err(DslError::UnwritableEdit(format!(
			"`{}` is not a valid property name",
			element.name
		)));
	}

	match element.syntax {
		Syntax::Argument | Syntax::Entry => {
			Err(DslError::UnwritableEdit(format!(
				"`{}` is an expression, not a statement",
				element.name
			)))
		}
		Syntax::Block if !element.kind.is_block() => {
			Err(DslError::UnwritableEdit(format!(
				"`{}` is written as a block but is not one",
				element.name
			)))
		}
		_ if element.kind.is_block() && element.syntax != Syntax::Block => {
			Err(DslError::UnwritableEdit(format!(
				"block `{}` must use block syntax",
				element.name
			)))
		}
		_ => {
			for child in &element.children {
				if element.kind.is_block() {
					validate_statement(tree, *child)?;
				} else {
					validate_expression(tree, *child)?;
				}
			}
			Ok(())
		}
	}
}

fn validate_expression(tree: &DslTree, id: ElementId) -> DslResult<()> {
	let element = tree.get(id);
	if element.kind.is_block() {
		return Err(DslError::UnwritableEdit(format!(
			"block `{}` cannot be used as a value",
			element.name
		)));
	}
	for child in &element.children {
		validate_expression(tree, *child)?;
	}
	Ok(())
}

/// Whether `text` is a plain identifier.
pub fn is_identifier(text: &str) -> bool {
	let mut chars = text.chars();
	chars
		.next()
		.is_some_and(|first| first.is_ascii_alphabetic() || first == '_' || first == '$')
		&& chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Whether `name` can be written as the left-hand side of a statement.
pub fn is_valid_name(name: &str) -> bool {
	let segments = split_path(name);
	!segments.is_empty()
		&& segments
			.iter()
			.all(|segment| is_identifier(segment) || call_segment(segment).is_some())
}

/// Split a dotted name into segments, keeping call heads such as
/// `project(':lib')` intact.
pub fn split_path(name: &str) -> Vec<String> {
	let mut segments = Vec::new();
	let mut current = String::new();
	let mut depth = 0usize;
	let mut quote: Option<char> = None;

	for ch in name.chars() {
		match (quote, ch) {
			(Some(open), _) => {
				current.push(ch);
				if ch == open {
					quote = None;
				}
			}
			(None, '\'' | '"') => {
				quote = Some(ch);
				current.push(ch);
			}
			(None, '(') => {
				depth += 1;
				current.push(ch);
			}
			(None, ')') => {
				depth = depth.saturating_sub(1);
				current.push(ch);
			}
			(None, '.') if depth == 0 => {
				segments.push(std::mem::take(&mut current));
			}
			(None, c) if c.is_whitespace() && depth == 0 => {}
			(None, _) => current.push(ch),
		}
	}
	segments.push(current);

	if segments.iter().any(String::is_empty) {
		return Vec::new();
	}
	segments
}

/// Split a call segment such as `project(':lib')` into the method name and
/// its single string argument.
pub fn call_segment(segment: &str) -> Option<(&str, String)> {
	let open = segment.find('(')?;
	let method = segment[..open].trim();
	let inner = segment[open + 1..].strip_suffix(')')?.trim();
	if !is_identifier(method) {
		return None;
	}

	let argument = ['\'', '"']
		.iter()
		.find_map(|quote| inner.strip_prefix(*quote)?.strip_suffix(*quote))?;
	Some((method, argument.to_string()))
}

impl Display for Syntax {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let text = match self {
			Self::Assignment => "assignment",
			Self::Application => "application",
			Self::Call => "call",
			Self::Infix => "infix",
			Self::Argument => "argument",
			Self::Entry => "entry",
			Self::Block => "block",
		};
		write!(f, "{text}")
	}
}
