use crate::DslError;
use crate::DslResult;
use crate::DslTree;
use crate::FileId;
use crate::Project;
use crate::Value;
use crate::element::Element;
use crate::element::ElementId;
use crate::element::ElementKind;
use crate::element::Literal;
use crate::element::Syntax;
use crate::element::split_path;
use crate::value::FromValue;
use crate::value::LanguageLevel;
use crate::value::ValueType;

use super::ensure_block;
use super::find_property;
use super::value_element;

/// Where a property lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Holder {
	/// Blocks below the file root, such as `["android", "defaultConfig"]`.
	/// Missing blocks are created when the property is set.
	Path(Vec<String>),
	/// An existing block, map or infix element.
	Element(ElementId),
}

/// A named property slot in a file.
///
/// The slot does not need to exist: reading an undeclared property falls
/// back to `subprojects` and `allprojects` configuration, and setting it
/// creates the declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyModel {
	file: FileId,
	holder: Holder,
	name: String,
}

impl PropertyModel {
	pub fn new(file: FileId, holder: Holder, name: impl Into<String>) -> Self {
		Self {
			file,
			holder,
			name: name.into(),
		}
	}

	pub fn file(&self) -> FileId {
		self.file
	}

	pub fn holder(&self) -> &Holder {
		&self.holder
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// The effective declaration: the last one when the property is declared
	/// more than once.
	pub fn element(&self, project: &Project) -> Option<ElementId> {
		let tree = project.file(self.file).tree();
		let segments = split_path(&self.name);
		if segments.is_empty() {
			return None;
		}

		match &self.holder {
			Holder::Path(path) => {
				let mut full = path.clone();
				full.extend(segments);
				find_property(tree, tree.root(), &full)
			}
			Holder::Element(holder) => {
				if !tree.is_attached(*holder) {
					return None;
				}
				if tree.get(*holder).kind.is_block() {
					find_property(tree, *holder, &segments)
				} else {
					tree.child_named(*holder, &self.name)
				}
			}
		}
	}

	pub fn exists(&self, project: &Project) -> bool {
		self.element(project).is_some()
	}

	/// The kind of value as written, before any reference is followed.
	pub fn value_type(&self, project: &Project) -> ValueType {
		let tree = project.file(self.file).tree();
		self.element(project)
			.map_or(ValueType::None, |id| ValueType::of(tree, id))
	}

	/// The resolved value converted to `T`.
	pub fn value<T: FromValue>(&self, project: &Project) -> Option<T> {
		self.resolved(project).and_then(T::from_value)
	}

	/// The resolved value. References are followed transitively, and an
	/// undeclared property is looked up in inherited configuration.
	pub fn resolved(&self, project: &Project) -> Option<Value> {
		let resolver = project.resolver();
		match self.element(project) {
			Some(id) => resolver.value_of(self.file, id),
			None => {
				let file = project.file(self.file);
				let node = file.node()?;
				resolver.inherited_value(node, &self.full_path(file.tree()))
			}
		}
	}

	/// The value as written. `None` for references and calls.
	pub fn unresolved_value(&self, project: &Project) -> Option<Value> {
		let tree = project.file(self.file).tree();
		let id = value_element(tree, self.element(project)?);
		Value::from_element(tree, id)
	}

	/// The text of the reference this property is set to, if any.
	pub fn reference_text(&self, project: &Project) -> Option<String> {
		let tree = project.file(self.file).tree();
		let id = value_element(tree, self.element(project)?);
		match &tree.get(id).kind {
			ElementKind::Reference(text) => Some(text.clone()),
			_ => None,
		}
	}

	/// Set the property to a literal, list or map value. An existing
	/// declaration keeps its shape (`name value` stays `name value`);
	/// otherwise `name = value` is added to the holder.
	pub fn set_value(&self, project: &mut Project, value: impl Into<Value>) -> DslResult<()> {
		let value = value.into();
		let existing = self.element(project);

		project.edit(self.file, |tree| {
			match existing {
				Some(id) => {
					let target = value_element(tree, id);
					tree.set_value(target, &value)
				}
				None => {
					self.insert(tree, |tree, name, syntax| tree.alloc_value(name, syntax, &value))
						.map(|_| ())
				}
			}
		})
	}

	/// Point the property at another one, e.g. `rootProject.ext.minSdk`.
	pub fn set_reference(&self, project: &mut Project, reference: &str) -> DslResult<()> {
		if split_path(reference).is_empty() {
			return Err(DslError::UnwritableEdit(format!(
				"`{reference}` is not a valid reference"
			)));
		}
		let existing = self.element(project);

		project.edit(self.file, |tree| {
			match existing {
				Some(id) => {
					let target = value_element(tree, id);
					tree.set_reference(target, reference)
				}
				None => {
					self.insert(tree, |tree, name, syntax| {
						tree.alloc(Element::new(
							name,
							ElementKind::Reference(reference.to_string()),
							syntax,
						))
					})
					.map(|_| ())
				}
			}
		})
	}

	/// Remove the effective declaration. Earlier declarations of the same
	/// property are kept, so the property may still have a value afterwards.
	pub fn delete(&self, project: &mut Project) -> DslResult<bool> {
		let Some(id) = self.element(project) else {
			return Ok(false);
		};
		project.edit(self.file, |tree| super::detach(tree, id).map(|()| true))
	}

	/// Append an item to a list property, creating the list when the
	/// property is not declared.
	pub fn add_list_value(&self, project: &mut Project, value: impl Into<Value>) -> DslResult<()> {
		let value = value.into();
		let existing = self.element(project);

		project.edit(self.file, |tree| {
			match existing {
				Some(id) => {
					let target = value_element(tree, id);
					if !matches!(tree.get(target).kind, ElementKind::List) {
						return Err(DslError::UnwritableEdit(format!(
							"`{}` is not a list",
							self.name
						)));
					}
					let item = tree.alloc_value("", Syntax::Argument, &value);
					tree.add_child(target, item).map(|_| ())
				}
				None => {
					let list = Value::List(vec![value]);
					self.insert(tree, |tree, name, syntax| tree.alloc_value(name, syntax, &list))
						.map(|_| ())
				}
			}
		})
	}

	/// Read the value as a Java language level. Accepts `1.8`, `'1.8'`,
	/// `JavaVersion.VERSION_1_8` and `VERSION_11`.
	pub fn language_level(&self, project: &Project) -> Option<LanguageLevel> {
		if let Some(level) = self
			.reference_text(project)
			.and_then(|reference| LanguageLevel::parse(&reference))
		{
			return Some(level);
		}
		self.value::<String>(project)
			.and_then(|text| LanguageLevel::parse(&text))
	}

	/// Write a language level in the style of the existing declaration:
	/// a `JavaVersion` constant replaces a reference, a number replaces a
	/// number, anything else becomes a string.
	pub fn set_language_level(&self, project: &mut Project, level: LanguageLevel) -> DslResult<()> {
		let tree = project.file(self.file).tree();
		let existing = self
			.element(project)
			.map(|id| tree.get(value_element(tree, id)).kind.clone());

		match existing {
			Some(ElementKind::Reference(_)) => {
				self.set_reference(project, &level.java_version_constant())
			}
			Some(ElementKind::Literal(Literal::Number(_))) => {
				self.set_value(project, Value::number(level.to_string()))
			}
			_ => self.set_value(project, level.to_string()),
		}
	}

	/// Allocate a new declaration with `create` and add it to the holder.
	fn insert(
		&self,
		tree: &mut DslTree,
		create: impl FnOnce(&mut DslTree, &str, Syntax) -> ElementId,
	) -> DslResult<ElementId> {
		let root = tree.root();
		let holder = match &self.holder {
			Holder::Path(path) => ensure_block(tree, root, path)?,
			Holder::Element(holder) if tree.is_attached(*holder) => *holder,
			Holder::Element(_) => {
				return Err(DslError::UnwritableEdit(format!(
					"the holder of `{}` was removed",
					self.name
				)));
			}
		};

		let syntax = match &tree.get(holder).kind {
			ElementKind::Block => Syntax::Assignment,
			ElementKind::Map { .. } | ElementKind::Infix => Syntax::Entry,
			_ => {
				return Err(DslError::UnwritableEdit(format!(
					"`{}` cannot hold the property `{}`",
					tree.get(holder).name,
					self.name
				)));
			}
		};

		let child = create(tree, &self.name, syntax);
		tree.add_child(holder, child)
	}

	/// The property path from the file root, used for inherited lookups.
	fn full_path(&self, tree: &DslTree) -> Vec<String> {
		let mut path = match &self.holder {
			Holder::Path(path) => path.clone(),
			Holder::Element(holder) => {
				let mut names: Vec<String> = std::iter::once(*holder)
					.chain(tree.ancestors(*holder))
					.filter(|id| *id != tree.root())
					.flat_map(|id| tree.get(id).segments().into_iter().rev())
					.collect();
				names.reverse();
				names
			}
		};
		path.extend(split_path(&self.name));
		path
	}
}
