use std::ops::Range;

use logos::Logos;
use snailquote::unescape;

use crate::element::Quote;

/// Raw tokens produced by logos. Whitespace (other than newlines) and comments
/// never reach the parser; their text stays in the source and is preserved
/// through spans.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip(r"([ \t\r\f]+|//[^\n]*|/\*([^*]|\*+[^*/])*\*+/|\\\r?\n)", allow_greedy = true))]
enum RawToken {
	#[token("\n")]
	Newline,
	#[token("{")]
	BraceOpen,
	#[token("}")]
	BraceClose,
	#[token("(")]
	ParenOpen,
	#[token(")")]
	ParenClose,
	#[token("[")]
	BracketOpen,
	#[token("]")]
	BracketClose,
	#[token(",")]
	Comma,
	#[token(":")]
	Colon,
	#[token("=")]
	Equals,
	#[token(".")]
	Dot,
	#[token(";")]
	Semicolon,
	#[token("-")]
	Minus,
	#[regex(r"[A-Za-z_$][A-Za-z0-9_$]*")]
	Ident,
	#[regex(r#""([^"\\\n]|\\.)*""#)]
	DoubleQuoted,
	#[regex(r"'([^'\\\n]|\\.)*'")]
	SingleQuoted,
	#[regex(r#""""([^"]|"[^"]|""[^"])*""""#)]
	TripleDoubleQuoted,
	#[regex(r"'''([^']|'[^']|''[^'])*'''")]
	TripleSingleQuoted,
	#[regex(r"[0-9]+(\.[0-9]+)*[A-Za-z]?")]
	Number,
}

/// The kind of a lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
	/// `\n`
	Newline,
	/// `{`
	BraceOpen,
	/// `}`
	BraceClose,
	/// `(`
	ParenOpen,
	/// `)`
	ParenClose,
	/// `[`
	BracketOpen,
	/// `]`
	BracketClose,
	/// `,`
	Comma,
	/// `:`
	Colon,
	/// `=`
	Equals,
	/// `.`
	Dot,
	/// `;`
	Semicolon,
	/// `-`
	Minus,
	/// An identifier or keyword, e.g. `android`, `def`, `true`
	Ident,
	/// A quoted string literal
	String(Quote),
	/// A numeric literal kept verbatim, e.g. `1.50`
	Number,
	/// Any character the DSL grammar does not know about (operators, stray
	/// quotes, ...). Statements containing one become raw leaves.
	Unknown,
	/// End of input.
	Eof,
}

impl From<RawToken> for TokenKind {
	fn from(raw: RawToken) -> Self {
		match raw {
			RawToken::Newline => Self::Newline,
			RawToken::BraceOpen => Self::BraceOpen,
			RawToken::BraceClose => Self::BraceClose,
			RawToken::ParenOpen => Self::ParenOpen,
			RawToken::ParenClose => Self::ParenClose,
			RawToken::BracketOpen => Self::BracketOpen,
			RawToken::BracketClose => Self::BracketClose,
			RawToken::Comma => Self::Comma,
			RawToken::Colon => Self::Colon,
			RawToken::Equals => Self::Equals,
			RawToken::Dot => Self::Dot,
			RawToken::Semicolon => Self::Semicolon,
			RawToken::Minus => Self::Minus,
			RawToken::Ident => Self::Ident,
			RawToken::DoubleQuoted => Self::String(Quote::Double),
			RawToken::SingleQuoted => Self::String(Quote::Single),
			RawToken::TripleDoubleQuoted => Self::String(Quote::TripleDouble),
			RawToken::TripleSingleQuoted => Self::String(Quote::TripleSingle),
			RawToken::Number => Self::Number,
		}
	}
}

/// A token and the byte range it covers in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
	pub kind: TokenKind,
	pub span: Range<usize>,
}

/// Tokenize a whole build script. The returned stream always ends with a
/// single [`TokenKind::Eof`] token positioned at the end of the source.
pub(crate) fn tokenize(source: &str) -> Vec<Token> {
	let mut tokens: Vec<Token> = RawToken::lexer(source)
		.spanned()
		.map(|(raw, span)| {
			Token {
				kind: raw.map_or(TokenKind::Unknown, TokenKind::from),
				span,
			}
		})
		.collect();

	tokens.push(Token {
		kind: TokenKind::Eof,
		span: source.len()..source.len(),
	});

	tokens
}

/// Decode the content of a quoted string token, processing escape sequences.
pub(crate) fn unquote(token_text: &str, quote: Quote) -> String {
	let width = quote.delimiter().len();
	let inner = token_text
		.get(width..token_text.len().saturating_sub(width))
		.unwrap_or_default();

	if !inner.contains('\\') {
		return inner.to_string();
	}

	let double_quoted = match quote {
		Quote::Double | Quote::TripleDouble => format!("\"{inner}\""),
		Quote::Single | Quote::TripleSingle => {
			format!("\"{}\"", inner.replace("\\'", "'").replace('"', "\\\""))
		}
	};

	unescape(&double_quoted).unwrap_or_else(|_| inner.to_string())
}
