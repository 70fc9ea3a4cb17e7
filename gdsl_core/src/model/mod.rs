//! Typed façades over the element tree of one file.
//!
//! Every model is a small handle (a [`FileId`] plus a path or element) and
//! holds no state of its own. Reads take `&Project`, edits take
//! `&mut Project` and go through [`Project::edit`], so a failed edit never
//! leaves a half-changed tree behind.
//!
//! Handles that point at an element are only valid until the file is
//! re-parsed.
//!
//! [`FileId`]: crate::FileId
//! [`Project::edit`]: crate::Project::edit

pub use build::*;
pub use dependencies::*;
pub use ext::*;
pub use plugins::*;
pub use property::*;
pub use repositories::*;
pub use settings::*;

mod build;
mod dependencies;
mod ext;
mod plugins;
mod property;
mod repositories;
mod settings;

use crate::DslResult;
use crate::DslTree;
use crate::Value;
use crate::element::Element;
use crate::element::ElementId;
use crate::element::ElementKind;
use crate::element::Syntax;

/// Blocks reached by following `path` from `parent`, in declaration order.
/// Same-named blocks merge, and a dotted block such as
/// `android.defaultConfig { }` counts as nested.
pub(crate) fn find_blocks(tree: &DslTree, parent: ElementId, path: &[String]) -> Vec<ElementId> {
	if path.is_empty() {
		return vec![parent];
	}

	let mut found = Vec::new();
	for child in tree.children(parent) {
		let element = tree.get(*child);
		if !element.kind.is_block() {
			continue;
		}
		let segments = element.segments();
		if !segments.is_empty() && path.starts_with(&segments) {
			found.extend(find_blocks(tree, *child, &path[segments.len()..]));
		}
	}
	found
}

/// The effective declaration of `path` below `parent`: the last one, looking
/// through nested blocks and dotted statement names.
pub(crate) fn find_property(tree: &DslTree, parent: ElementId, path: &[String]) -> Option<ElementId> {
	for child in tree.children(parent).iter().rev() {
		let element = tree.get(*child);
		let segments = element.segments();
		if segments.is_empty() || !path.starts_with(&segments) {
			continue;
		}
		if segments.len() == path.len() {
			return Some(*child);
		}
		if element.kind.is_block() {
			if let Some(found) = find_property(tree, *child, &path[segments.len()..]) {
				return Some(found);
			}
		}
	}
	None
}

/// The last block for every segment of `path`, creating missing ones at the
/// end of their parent.
pub(crate) fn ensure_block(
	tree: &mut DslTree,
	parent: ElementId,
	path: &[String],
) -> DslResult<ElementId> {
	let mut current = parent;
	for segment in path {
		current = match find_blocks(tree, current, std::slice::from_ref(segment)).last() {
			Some(block) => *block,
			None => {
				let block = new_block(tree, segment);
				tree.add_child(current, block)?
			}
		};
	}
	Ok(current)
}

pub(crate) fn new_block(tree: &mut DslTree, name: &str) -> ElementId {
	tree.alloc(Element::new(name, ElementKind::Block, Syntax::Block))
}

/// `name value` with a single argument.
pub(crate) fn new_application(
	tree: &mut DslTree,
	name: &str,
	value: &Value,
) -> DslResult<ElementId> {
	let call = tree.alloc(Element::new(
		name,
		ElementKind::MethodCall {
			method: name.to_string(),
			parens: false,
		},
		Syntax::Application,
	));
	let argument = tree.alloc_value("", Syntax::Argument, value);
	tree.add_child(call, argument)?;
	Ok(call)
}

/// `name()` with no arguments.
pub(crate) fn new_call(tree: &mut DslTree, name: &str) -> ElementId {
	tree.alloc(Element::new(
		name,
		ElementKind::MethodCall {
			method: name.to_string(),
			parens: true,
		},
		Syntax::Call,
	))
}

/// The element holding the value of a property statement: the only argument
/// of `name value` or `name(value)`, otherwise the statement itself.
pub(crate) fn value_element(tree: &DslTree, id: ElementId) -> ElementId {
	let element = tree.get(id);
	match (&element.kind, element.children.as_slice()) {
		(ElementKind::MethodCall { method, .. }, [argument]) if *method == element.name => *argument,
		_ => id,
	}
}

/// Remove `id` from its parent.
pub(crate) fn detach(tree: &mut DslTree, id: ElementId) -> DslResult<()> {
	let Some(parent) = tree.parent(id) else {
		return Err(crate::DslError::UnwritableEdit(format!(
			"`{}` is not part of the file",
			tree.get(id).name
		)));
	};
	tree.remove_child(parent, id)
}

/// Names in first-seen order without duplicates.
pub(crate) fn unique(names: impl IntoIterator<Item = String>) -> Vec<String> {
	let mut seen = Vec::new();
	for name in names {
		if !name.is_empty() && !seen.contains(&name) {
			seen.push(name);
		}
	}
	seen
}
