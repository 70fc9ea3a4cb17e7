use std::fmt::Display;

use serde::Serialize;
use serde::ser::SerializeMap;
use serde::ser::SerializeSeq;

use crate::element::DslTree;
use crate::element::ElementId;
use crate::element::ElementKind;
use crate::element::Literal;

/// A resolved property value.
///
/// Numbers keep the text they were written with, so `1.50` and `1.5` stay
/// distinct and nothing is coerced through floating point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
	String(String),
	Number(String),
	Boolean(bool),
	List(Vec<Value>),
	/// Entries in declaration order.
	Map(Vec<(String, Value)>),
}

impl Value {
	pub fn string(text: impl Into<String>) -> Self {
		Self::String(text.into())
	}

	pub fn number(text: impl Into<String>) -> Self {
		Self::Number(text.into())
	}

	/// The text of a string or number value.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(text) | Self::Number(text) => Some(text),
			_ => None,
		}
	}

	pub fn as_list(&self) -> Option<&[Value]> {
		match self {
			Self::List(items) => Some(items),
			_ => None,
		}
	}

	/// Look up a map entry. The last entry with the key wins.
	pub fn get(&self, key: &str) -> Option<&Value> {
		match self {
			Self::Map(entries) => {
				entries
					.iter()
					.rev()
					.find(|(name, _)| name == key)
					.map(|(_, value)| value)
			}
			_ => None,
		}
	}

	/// Convert into a typed value.
	pub fn to<T: FromValue>(&self) -> Option<T> {
		T::from_value(self.clone())
	}

	/// Evaluate literal elements (and lists and maps of them) without any
	/// name resolution.
	pub fn from_element(tree: &DslTree, id: ElementId) -> Option<Self> {
		let element = tree.get(id);
		match &element.kind {
			ElementKind::Literal(literal) => Some(Self::from(literal)),
			ElementKind::List => {
				Some(Self::List(
					element
						.children
						.iter()
						.filter_map(|child| Self::from_element(tree, *child))
						.collect(),
				))
			}
			ElementKind::Map { .. } => {
				Some(Self::Map(
					element
						.children
						.iter()
						.filter_map(|child| {
							Self::from_element(tree, *child)
								.map(|value| (tree.get(*child).name.clone(), value))
						})
						.collect(),
				))
			}
			_ => None,
		}
	}
}

impl From<&Literal> for Value {
	fn from(literal: &Literal) -> Self {
		match literal {
			Literal::String { value, .. } => Self::String(value.clone()),
			Literal::Number(text) => Self::Number(text.clone()),
			Literal::Boolean(flag) => Self::Boolean(*flag),
		}
	}
}

impl From<&str> for Value {
	fn from(text: &str) -> Self {
		Self::String(text.to_string())
	}
}

impl From<String> for Value {
	fn from(text: String) -> Self {
		Self::String(text)
	}
}

impl From<bool> for Value {
	fn from(flag: bool) -> Self {
		Self::Boolean(flag)
	}
}

impl From<i64> for Value {
	fn from(number: i64) -> Self {
		Self::Number(number.to_string())
	}
}

impl From<u32> for Value {
	fn from(number: u32) -> Self {
		Self::Number(number.to_string())
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(items: Vec<T>) -> Self {
		Self::List(items.into_iter().map(Into::into).collect())
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::String(text) | Self::Number(text) => write!(f, "{text}"),
			Self::Boolean(flag) => write!(f, "{flag}"),
			Self::List(items) => {
				write!(f, "[")?;
				for (index, item) in items.iter().enumerate() {
					if index > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{item}")?;
				}
				write!(f, "]")
			}
			Self::Map(entries) if entries.is_empty() => write!(f, "[:]"),
			Self::Map(entries) => {
				write!(f, "[")?;
				for (index, (key, item)) in entries.iter().enumerate() {
					if index > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{key}: {item}")?;
				}
				write!(f, "]")
			}
		}
	}
}

impl Serialize for Value {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			Self::String(text) | Self::Number(text) => serializer.serialize_str(text),
			Self::Boolean(flag) => serializer.serialize_bool(*flag),
			Self::List(items) => {
				let mut seq = serializer.serialize_seq(Some(items.len()))?;
				for item in items {
					seq.serialize_element(item)?;
				}
				seq.end()
			}
			Self::Map(entries) => {
				let mut map = serializer.serialize_map(Some(entries.len()))?;
				for (key, item) in entries {
					map.serialize_entry(key, item)?;
				}
				map.end()
			}
		}
	}
}

/// Conversion from a resolved [`Value`] into a typed Rust value.
pub trait FromValue: Sized {
	fn from_value(value: Value) -> Option<Self>;
}

impl FromValue for Value {
	fn from_value(value: Value) -> Option<Self> {
		Some(value)
	}
}

impl FromValue for String {
	fn from_value(value: Value) -> Option<Self> {
		match value {
			Value::String(text) | Value::Number(text) => Some(text),
			Value::Boolean(flag) => Some(flag.to_string()),
			Value::List(_) | Value::Map(_) => None,
		}
	}
}

impl FromValue for i64 {
	fn from_value(value: Value) -> Option<Self> {
		let text = String::from_value(value)?;
		let digits = text.trim_end_matches(['L', 'l']);
		digits.parse().ok()
	}
}

impl FromValue for u32 {
	fn from_value(value: Value) -> Option<Self> {
		i64::from_value(value).and_then(|number| number.try_into().ok())
	}
}

impl FromValue for bool {
	fn from_value(value: Value) -> Option<Self> {
		match value {
			Value::Boolean(flag) => Some(flag),
			Value::String(text) if text == "true" => Some(true),
			Value::String(text) if text == "false" => Some(false),
			_ => None,
		}
	}
}

impl FromValue for Vec<Value> {
	fn from_value(value: Value) -> Option<Self> {
		match value {
			Value::List(items) => Some(items),
			_ => None,
		}
	}
}

impl FromValue for Vec<String> {
	fn from_value(value: Value) -> Option<Self> {
		match value {
			Value::List(items) => Some(items.into_iter().filter_map(String::from_value).collect()),
			other => String::from_value(other).map(|text| vec![text]),
		}
	}
}

/// The kind of value a property's own element holds, before resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
	/// The property is not declared.
	None,
	String,
	Integer,
	Decimal,
	Boolean,
	List,
	Map,
	Reference,
	/// A double-quoted string containing `$` injections.
	Interpolated,
	Block,
	Unknown,
}

impl ValueType {
	pub fn of(tree: &DslTree, id: ElementId) -> Self {
		let element = tree.get(id);
		match &element.kind {
			ElementKind::Literal(literal @ Literal::String { .. }) => {
				if literal.is_interpolated() {
					Self::Interpolated
				} else {
					Self::String
				}
			}
			ElementKind::Literal(Literal::Number(text)) => {
				if text.contains('.') {
					Self::Decimal
				} else {
					Self::Integer
				}
			}
			ElementKind::Literal(Literal::Boolean(_)) => Self::Boolean,
			ElementKind::Reference(_) => Self::Reference,
			ElementKind::List => Self::List,
			ElementKind::Map { .. } => Self::Map,
			ElementKind::Block => Self::Block,
			// `compileSdkVersion 23` is typed by its only argument.
			ElementKind::MethodCall { parens: false, .. } if element.children.len() == 1 => {
				Self::of(tree, element.children[0])
			}
			ElementKind::MethodCall { .. } | ElementKind::Infix | ElementKind::Raw(_) => {
				Self::Unknown
			}
		}
	}
}

/// A Java language level such as `1.8` or `11`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LanguageLevel(u8);

impl LanguageLevel {
	pub const JDK_1_8: Self = Self(8);
	pub const JDK_11: Self = Self(11);
	pub const JDK_17: Self = Self(17);

	/// Parse `1.8`, `8`, `JavaVersion.VERSION_1_8`, `VERSION_11` and the
	/// like. Compared as exact strings: `1.80` is not a language level.
	pub fn parse(text: &str) -> Option<Self> {
		let text = text.trim();
		let text = text.strip_prefix("JavaVersion.").unwrap_or(text);
		let normalized = text
			.strip_prefix("VERSION_")
			.map_or_else(|| text.to_string(), |rest| rest.replace('_', "."));

		let feature = match normalized.as_str() {
			"1.3" => 3,
			"1.4" => 4,
			"1.5" | "5" => 5,
			"1.6" | "6" => 6,
			"1.7" | "7" => 7,
			"1.8" | "8" => 8,
			"1.9" | "9" => 9,
			"10" => 10,
			"11" => 11,
			"12" => 12,
			"13" => 13,
			"14" => 14,
			"15" => 15,
			"16" => 16,
			"17" => 17,
			"18" => 18,
			"19" => 19,
			"20" => 20,
			"21" => 21,
			_ => return None,
		};

		Some(Self(feature))
	}

	/// The feature release number, `8` for `1.8`.
	pub fn feature(self) -> u8 {
		self.0
	}

	/// The `JavaVersion` constant naming this level.
	pub fn java_version_constant(self) -> String {
		if self.0 <= 8 {
			format!("JavaVersion.VERSION_1_{}", self.0)
		} else {
			format!("JavaVersion.VERSION_{}", self.0)
		}
	}
}

impl Display for LanguageLevel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.0 <= 8 {
			write!(f, "1.{}", self.0)
		} else {
			write!(f, "{}", self.0)
		}
	}
}
