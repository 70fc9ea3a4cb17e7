use std::ops::Range;

use serde::Deserialize;
use serde::Serialize;
use tracing::trace;

use crate::DslError;
use crate::DslResult;
use crate::Value;
use crate::element::DslTree;
use crate::element::Element;
use crate::element::ElementId;
use crate::element::ElementKind;
use crate::element::Literal;
use crate::element::Span;
use crate::element::Syntax;
use crate::lexer::Token;
use crate::lexer::TokenKind;
use crate::lexer::tokenize;
use crate::lexer::unquote;
use crate::position::LineTable;

/// A diagnostic produced during parsing. These are issues that don't prevent
/// parsing from completing but indicate problems in the source content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ParseDiagnostic {
	/// A block was opened but never closed.
	UnclosedBlock {
		name: String,
		line: usize,
		column: usize,
	},
	/// A `}` with no matching `{`.
	UnexpectedClosingBrace { line: usize, column: usize },
	/// A statement the model does not understand. It is kept verbatim as a
	/// raw element.
	UnsupportedStatement {
		text: String,
		line: usize,
		column: usize,
	},
}

impl ParseDiagnostic {
	pub fn line(&self) -> usize {
		match self {
			Self::UnclosedBlock { line, .. }
			| Self::UnexpectedClosingBrace { line, .. }
			| Self::UnsupportedStatement { line, .. } => *line,
		}
	}

	pub fn column(&self) -> usize {
		match self {
			Self::UnclosedBlock { column, .. }
			| Self::UnexpectedClosingBrace { column, .. }
			| Self::UnsupportedStatement { column, .. } => *column,
		}
	}

	pub fn message(&self) -> String {
		match self {
			Self::UnclosedBlock { name, .. } => format!("block `{name}` is never closed"),
			Self::UnexpectedClosingBrace { .. } => "unexpected `}`".to_string(),
			Self::UnsupportedStatement { text, .. } => {
				let first_line = text.lines().next().unwrap_or_default();
				format!("statement is kept verbatim: `{first_line}`")
			}
		}
	}

	/// Whether the diagnostic makes the file unusable rather than partially
	/// modelled.
	pub fn is_error(&self) -> bool {
		matches!(self, Self::UnclosedBlock { .. })
	}
}

/// Parse a build script into an element tree.
///
/// Statements the parser does not understand are kept as raw elements, so
/// the only failure is a block that is never closed.
pub fn parse(content: impl AsRef<str>) -> DslResult<DslTree> {
	let (tree, diagnostics) = parse_with_diagnostics(content);

	if let Some(ParseDiagnostic::UnclosedBlock { name, line, column }) = diagnostics
		.into_iter()
		.find(ParseDiagnostic::is_error)
	{
		return Err(DslError::Syntax {
			line,
			column,
			message: format!("block `{name}` is never closed"),
		});
	}

	Ok(tree)
}

/// Parse a build script and return the tree together with diagnostics.
/// Unlike `parse()`, this does not error on unclosed blocks; instead they
/// are collected as diagnostics and the block extends to the end of the file.
pub fn parse_with_diagnostics(content: impl AsRef<str>) -> (DslTree, Vec<ParseDiagnostic>) {
	let content = content.as_ref();
	let mut parser = Parser::new(content);
	let root = parser.tree.root();
	parser.statements(root, false);

	trace!(
		elements = parser.tree.len(),
		diagnostics = parser.diagnostics.len(),
		"parsed build script"
	);

	(parser.tree, parser.diagnostics)
}

/// Parse a single literal expression such as `'1.0'`, `23` or
/// `['a', 'b']`.
pub fn parse_value(content: impl AsRef<str>) -> DslResult<Value> {
	let content = content.as_ref();
	let mut parser = Parser::new(content);
	parser.skip_newlines();

	let Some(id) = parser.expression() else {
		return Err(parser.error_here("expected a value"));
	};

	parser.skip_newlines();
	if parser.peek() != TokenKind::Eof {
		return Err(parser.error_here("unexpected text after the value"));
	}

	Value::from_element(&parser.tree, id).ok_or_else(|| {
		DslError::Syntax {
			line: 1,
			column: 1,
			message: "references cannot be used as literal values".to_string(),
		}
	})
}

struct Parser<'a> {
	source: &'a str,
	tokens: Vec<Token>,
	pos: usize,
	tree: DslTree,
	diagnostics: Vec<ParseDiagnostic>,
	lines: LineTable,
}

impl<'a> Parser<'a> {
	fn new(source: &'a str) -> Self {
		Self {
			source,
			tokens: tokenize(source),
			pos: 0,
			tree: DslTree::new(),
			diagnostics: Vec::new(),
			lines: LineTable::new(source),
		}
	}

	fn token(&self) -> &Token {
		&self.tokens[self.pos.min(self.tokens.len() - 1)]
	}

	fn peek(&self) -> TokenKind {
		self.token().kind
	}

	fn peek_at(&self, ahead: usize) -> TokenKind {
		self.tokens
			.get(self.pos + ahead)
			.map_or(TokenKind::Eof, |token| token.kind)
	}

	fn peek_text(&self) -> &'a str {
		&self.source[self.token().span.clone()]
	}

	fn text(&self, token: &Token) -> &'a str {
		&self.source[token.span.clone()]
	}

	fn bump(&mut self) -> Token {
		let token = self.token().clone();
		if self.pos < self.tokens.len() - 1 {
			self.pos += 1;
		}
		token
	}

	fn eat(&mut self, kind: TokenKind) -> Option<Token> {
		(self.peek() == kind).then(|| self.bump())
	}

	/// Start of the current token.
	fn offset(&self) -> usize {
		self.token().span.start
	}

	/// End of the last consumed token.
	fn last_end(&self) -> usize {
		self.pos
			.checked_sub(1)
			.map_or(0, |previous| self.tokens[previous].span.end)
	}

	fn skip_newlines(&mut self) {
		while self.peek() == TokenKind::Newline {
			self.bump();
		}
	}

	fn error_here(&self, message: &str) -> DslError {
		let point = self.lines.point(self.offset());
		DslError::Syntax {
			line: point.line,
			column: point.column,
			message: message.to_string(),
		}
	}

	/// Parse statements into `parent` until the end of input or, for nested
	/// blocks, the closing brace. Returns the closing brace span.
	fn statements(&mut self, parent: ElementId, nested: bool) -> Option<Range<usize>> {
		loop {
			match self.peek() {
				TokenKind::Newline | TokenKind::Semicolon => {
					self.bump();
				}
				TokenKind::Eof => return None,
				TokenKind::BraceClose if nested => return Some(self.bump().span),
				TokenKind::BraceClose => {
					let token = self.bump();
					let point = self.lines.point(token.span.start);
					self.diagnostics.push(ParseDiagnostic::UnexpectedClosingBrace {
						line: point.line,
						column: point.column,
					});
					let id = self.raw(token.span);
					self.tree.attach_parsed(parent, id);
				}
				_ => self.statement(parent),
			}
		}
	}

	fn statement(&mut self, parent: ElementId) {
		let checkpoint = self.pos;
		let start = self.offset();

		if let Some(id) = self.try_statement(start) {
			if self.tree.get(id).kind.is_block() || is_terminator(self.peek()) {
				self.tree.attach_parsed(parent, id);
				return;
			}
		}

		self.pos = checkpoint;
		let end = self.skip_statement();
		let point = self.lines.point(start);
		self.diagnostics.push(ParseDiagnostic::UnsupportedStatement {
			text: self.source[start..end].to_string(),
			line: point.line,
			column: point.column,
		});
		trace!(line = point.line, "keeping unsupported statement as raw text");

		let id = self.raw(start..end);
		self.tree.attach_parsed(parent, id);
	}

	fn raw(&mut self, range: Range<usize>) -> ElementId {
		let text = self.source[range.clone()].to_string();
		let id = self.tree.alloc(Element::new(
			"",
			ElementKind::Raw(text),
			Syntax::Application,
		));
		self.tree.set_span(id, Span::expression(range));
		id
	}

	/// Consume the rest of a statement, keeping brackets balanced. Returns the
	/// end offset.
	fn skip_statement(&mut self) -> usize {
		let mut depth = 0usize;
		let mut end = self.offset();

		loop {
			match self.peek() {
				TokenKind::Eof => break,
				TokenKind::Newline | TokenKind::Semicolon | TokenKind::BraceClose
					if depth == 0 =>
				{
					break;
				}
				TokenKind::ParenOpen | TokenKind::BracketOpen | TokenKind::BraceOpen => {
					depth += 1;
				}
				TokenKind::ParenClose | TokenKind::BracketClose | TokenKind::BraceClose => {
					depth = depth.saturating_sub(1);
				}
				_ => {}
			}
			end = self.bump().span.end;
		}

		end
	}

	fn try_statement(&mut self, start: usize) -> Option<ElementId> {
		if self.peek() != TokenKind::Ident {
			return None;
		}

		if self.peek_text() == "def" && self.peek_at(1) == TokenKind::Ident {
			self.bump();
			let token = self.bump();
			let name = self.text(&token).to_string();
			self.eat(TokenKind::Equals)?;
			return self.assignment(name, start);
		}

		let name = self.statement_name()?;
		match self.peek() {
			TokenKind::Equals => {
				self.bump();
				self.assignment(name, start)
			}
			TokenKind::BraceOpen => Some(self.block(name, start)),
			TokenKind::ParenOpen => self.call_statement(name, start),
			kind if is_terminator(kind) => None,
			_ => self.application(name, start),
		}
	}

	/// A dotted statement name. `project(':lib').` call heads are kept as a
	/// single segment.
	fn statement_name(&mut self) -> Option<String> {
		let mut segments = Vec::new();

		loop {
			let token = self.eat(TokenKind::Ident)?;
			let mut segment = self.text(&token).to_string();

			let call_head = self.peek() == TokenKind::ParenOpen
				&& matches!(self.peek_at(1), TokenKind::String(_))
				&& self.peek_at(2) == TokenKind::ParenClose
				&& self.peek_at(3) == TokenKind::Dot;
			if call_head {
				self.bump();
				let argument = self.bump();
				self.bump();
				segment = format!("{segment}({})", self.text(&argument));
			}

			segments.push(segment);

			if self.peek() == TokenKind::Dot && self.peek_at(1) == TokenKind::Ident {
				self.bump();
				continue;
			}

			break;
		}

		Some(segments.join("."))
	}

	fn assignment(&mut self, name: String, start: usize) -> Option<ElementId> {
		self.skip_newlines();
		let value_start = self.offset();
		let id = self.expression()?;
		let end = self.last_end();

		self.rename(id, name, Syntax::Assignment);
		self.tree.set_span(id, Span {
			full: start..end,
			value: value_start..end,
			body: None,
		});

		Some(id)
	}

	fn block(&mut self, name: String, start: usize) -> ElementId {
		let open = self.bump();
		let id = self
			.tree
			.alloc(Element::new(name.clone(), ElementKind::Block, Syntax::Block));

		let (end, body) = match self.statements(id, true) {
			Some(close) => (close.end, open.span.end..close.start),
			None => {
				let point = self.lines.point(start);
				self.diagnostics.push(ParseDiagnostic::UnclosedBlock {
					name,
					line: point.line,
					column: point.column,
				});
				(self.source.len(), open.span.end..self.source.len())
			}
		};

		self.tree.set_span(id, Span {
			full: start..end,
			value: start..end,
			body: Some(body),
		});

		id
	}

	fn call_statement(&mut self, name: String, start: usize) -> Option<ElementId> {
		self.bump();
		let args = self.arguments(Some(TokenKind::ParenClose), Vec::new())?;
		self.eat(TokenKind::ParenClose)?;

		// `id("x") version "1.0"`
		if self.peek() == TokenKind::Ident {
			let [first] = args.as_slice() else {
				return None;
			};
			return self.infix(name, start, *first);
		}

		let end = self.last_end();
		let id = self.tree.alloc(Element::new(
			name.clone(),
			ElementKind::MethodCall {
				method: name,
				parens: true,
			},
			Syntax::Call,
		));
		for arg in args {
			self.tree.attach_parsed(id, arg);
		}
		self.tree.set_span(id, Span::expression(start..end));

		Some(id)
	}

	fn application(&mut self, name: String, start: usize) -> Option<ElementId> {
		let value_start = self.offset();
		let mut args = Vec::new();

		if !self.at_named_entry() {
			let first = self.expression()?;
			if self.peek() == TokenKind::Ident {
				return self.infix(name, start, first);
			}
			args.push(first);
		}

		let args = self.arguments(None, args)?;
		let end = self.last_end();
		let id = self.tree.alloc(Element::new(
			name.clone(),
			ElementKind::MethodCall {
				method: name,
				parens: false,
			},
			Syntax::Application,
		));
		for arg in args {
			self.tree.attach_parsed(id, arg);
		}
		self.tree.set_span(id, Span {
			full: start..end,
			value: value_start..end,
			body: None,
		});

		Some(id)
	}

	/// `name value key value key value`
	fn infix(&mut self, name: String, start: usize, first: ElementId) -> Option<ElementId> {
		let id = self
			.tree
			.alloc(Element::new(name.clone(), ElementKind::Infix, Syntax::Infix));
		self.rename(first, name, Syntax::Entry);
		self.tree.attach_parsed(id, first);

		while self.peek() == TokenKind::Ident {
			let key = self.bump();
			let value_start = self.offset();
			let value = self.expression()?;
			let end = self.last_end();

			self.rename(value, self.text(&key).to_string(), Syntax::Entry);
			self.tree.set_span(value, Span {
				full: key.span.start..end,
				value: value_start..end,
				body: None,
			});
			self.tree.attach_parsed(id, value);
		}

		let end = self.last_end();
		self.tree.set_span(id, Span::expression(start..end));
		Some(id)
	}

	/// Comma separated arguments. Named arguments are collected into a single
	/// unbracketed map placed where the first of them appears.
	fn arguments(
		&mut self,
		close: Option<TokenKind>,
		mut args: Vec<ElementId>,
	) -> Option<Vec<ElementId>> {
		let nested = close.is_some();
		let mut named = None;

		if args.is_empty() {
			if nested {
				self.skip_newlines();
			}
			if close == Some(self.peek()) {
				return Some(args);
			}
			self.argument(&mut args, &mut named)?;
		}

		loop {
			if nested {
				self.skip_newlines();
			}
			if self.eat(TokenKind::Comma).is_none() {
				break;
			}
			self.skip_newlines();
			if close == Some(self.peek()) {
				break;
			}
			self.argument(&mut args, &mut named)?;
		}

		Some(args)
	}

	fn argument(
		&mut self,
		args: &mut Vec<ElementId>,
		named: &mut Option<ElementId>,
	) -> Option<()> {
		if !self.at_named_entry() {
			args.push(self.expression()?);
			return Some(());
		}

		let entry = self.entry()?;
		let entry_range = self.tree.get(entry).span.as_ref()?.full.clone();
		let map = match *named {
			Some(map) => map,
			None => {
				let map = self.tree.alloc(Element::new(
					"",
					ElementKind::Map { bracketed: false },
					Syntax::Argument,
				));
				self.tree.set_span(map, Span::expression(entry_range.clone()));
				args.push(map);
				*named = Some(map);
				map
			}
		};

		self.tree.attach_parsed(map, entry);
		if let Some(span) = &mut self.tree.get_mut(map).span {
			span.full.end = entry_range.end;
			span.value.end = entry_range.end;
		}

		Some(())
	}

	fn at_named_entry(&self) -> bool {
		matches!(self.peek(), TokenKind::Ident | TokenKind::String(_))
			&& self.peek_at(1) == TokenKind::Colon
	}

	/// `key: value`
	fn entry(&mut self) -> Option<ElementId> {
		let key_token = self.bump();
		let key = match key_token.kind {
			TokenKind::String(quote) => unquote(self.text(&key_token), quote),
			TokenKind::Ident => self.text(&key_token).to_string(),
			_ => return None,
		};
		self.eat(TokenKind::Colon)?;
		self.skip_newlines();

		let value_start = self.offset();
		let id = self.expression()?;
		let end = self.last_end();

		self.rename(id, key, Syntax::Entry);
		self.tree.set_span(id, Span {
			full: key_token.span.start..end,
			value: value_start..end,
			body: None,
		});

		Some(id)
	}

	fn expression(&mut self) -> Option<ElementId> {
		let start = self.offset();
		let kind = match self.peek() {
			TokenKind::String(quote) => {
				let token = self.bump();
				ElementKind::Literal(Literal::String {
					value: unquote(self.text(&token), quote),
					quote,
				})
			}
			TokenKind::Number => {
				let token = self.bump();
				ElementKind::Literal(Literal::Number(self.text(&token).to_string()))
			}
			TokenKind::Minus if self.peek_at(1) == TokenKind::Number => {
				self.bump();
				let token = self.bump();
				ElementKind::Literal(Literal::Number(format!("-{}", self.text(&token))))
			}
			TokenKind::Ident => return self.identifier_expression(),
			TokenKind::BracketOpen => return self.collection(),
			_ => return None,
		};

		Some(self.leaf(kind, start))
	}

	fn leaf(&mut self, kind: ElementKind, start: usize) -> ElementId {
		let id = self.tree.alloc(Element::new("", kind, Syntax::Argument));
		self.tree
			.set_span(id, Span::expression(start..self.last_end()));
		id
	}

	/// Booleans, constructors, references and method calls.
	fn identifier_expression(&mut self) -> Option<ElementId> {
		let start = self.offset();
		match self.peek_text() {
			"true" | "false" => {
				let value = self.bump();
				let flag = self.text(&value) == "true";
				return Some(self.leaf(ElementKind::Literal(Literal::Boolean(flag)), start));
			}
			"new" if self.peek_at(1) == TokenKind::Ident => return self.constructor(start),
			_ => {}
		}

		let mut call: Option<(usize, Vec<ElementId>)> = None;
		loop {
			self.eat(TokenKind::Ident)?;
			call = None;

			if self.peek() == TokenKind::ParenOpen {
				let method_end = self.last_end();
				self.bump();
				let args = self.arguments(Some(TokenKind::ParenClose), Vec::new())?;
				self.eat(TokenKind::ParenClose)?;
				call = Some((method_end, args));
			}

			if self.peek() == TokenKind::Dot && self.peek_at(1) == TokenKind::Ident {
				self.bump();
				continue;
			}

			break;
		}

		let end = self.last_end();
		let Some((method_end, args)) = call else {
			let reference = compact(&self.source[start..end]);
			return Some(self.leaf(ElementKind::Reference(reference), start));
		};

		let method = compact(&self.source[start..method_end]);
		let id = self.leaf(
			ElementKind::MethodCall {
				method,
				parens: true,
			},
			start,
		);
		for arg in args {
			self.tree.attach_parsed(id, arg);
		}

		Some(id)
	}

	/// `new File(rootDir, 'libs')`
	fn constructor(&mut self, start: usize) -> Option<ElementId> {
		self.bump();
		let type_start = self.offset();
		loop {
			self.eat(TokenKind::Ident)?;
			if self.peek() == TokenKind::Dot && self.peek_at(1) == TokenKind::Ident {
				self.bump();
				continue;
			}
			break;
		}
		let type_name = compact(&self.source[type_start..self.last_end()]);

		self.eat(TokenKind::ParenOpen)?;
		let args = self.arguments(Some(TokenKind::ParenClose), Vec::new())?;
		self.eat(TokenKind::ParenClose)?;

		let id = self.leaf(
			ElementKind::MethodCall {
				method: format!("new {type_name}"),
				parens: true,
			},
			start,
		);
		for arg in args {
			self.tree.attach_parsed(id, arg);
		}

		Some(id)
	}

	/// `[a, b]`, `[key: value]` or `[:]`
	fn collection(&mut self) -> Option<ElementId> {
		let start = self.offset();
		self.bump();
		self.skip_newlines();

		if self.peek() == TokenKind::Colon && self.peek_at(1) == TokenKind::BracketClose {
			self.bump();
			self.bump();
			return Some(self.leaf(ElementKind::Map { bracketed: true }, start));
		}

		let is_map = self.at_named_entry();
		let kind = if is_map {
			ElementKind::Map { bracketed: true }
		} else {
			ElementKind::List
		};
		let id = self.tree.alloc(Element::new("", kind, Syntax::Argument));

		loop {
			self.skip_newlines();
			if self.peek() == TokenKind::BracketClose {
				break;
			}

			let item = if is_map {
				self.entry()?
			} else {
				self.expression()?
			};
			self.tree.attach_parsed(id, item);

			self.skip_newlines();
			if self.eat(TokenKind::Comma).is_none() {
				break;
			}
		}

		self.skip_newlines();
		self.eat(TokenKind::BracketClose)?;
		self.tree
			.set_span(id, Span::expression(start..self.last_end()));

		Some(id)
	}

	fn rename(&mut self, id: ElementId, name: String, syntax: Syntax) {
		let element = self.tree.get_mut(id);
		element.name = name;
		element.syntax = syntax;
	}
}

fn is_terminator(kind: TokenKind) -> bool {
	matches!(
		kind,
		TokenKind::Newline | TokenKind::Semicolon | TokenKind::BraceClose | TokenKind::Eof
	)
}

/// Remove whitespace outside of quotes, e.g. `project( ':a' ) . name`.
fn compact(text: &str) -> String {
	let mut result = String::with_capacity(text.len());
	let mut quote: Option<char> = None;

	for ch in text.chars() {
		match quote {
			Some(open) => {
				if ch == open {
					quote = None;
				}
				result.push(ch);
			}
			None if ch == '\'' || ch == '"' => {
				quote = Some(ch);
				result.push(ch);
			}
			None if ch.is_whitespace() => {}
			None => result.push(ch),
		}
	}

	result
}
