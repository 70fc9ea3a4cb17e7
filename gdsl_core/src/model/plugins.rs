use crate::DslError;
use crate::DslResult;
use crate::DslTree;
use crate::FileId;
use crate::Project;
use crate::Value;
use crate::element::Element;
use crate::element::ElementId;
use crate::element::ElementKind;
use crate::element::Syntax;

use super::detach;
use super::ensure_block;
use super::find_blocks;
use super::new_application;
use super::new_block;

/// Blocks that must stay ahead of a `plugins { }` block in a build script.
const LEADING_BLOCKS: [&str; 2] = ["buildscript", "pluginManagement"];

/// The plugins of a file: `plugins { id 'x' }` blocks and, in build
/// scripts, `apply plugin: 'x'` statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginsModel {
	file: FileId,
	/// Path of the `plugins` block.
	path: Vec<String>,
	/// Whether `apply plugin:` statements at the top level count.
	statements: bool,
}

impl PluginsModel {
	pub(crate) fn build(file: FileId) -> Self {
		Self {
			file,
			path: vec!["plugins".to_string()],
			statements: true,
		}
	}

	pub(crate) fn nested(file: FileId, scope: &[&str]) -> Self {
		let mut path: Vec<String> = scope.iter().map(ToString::to_string).collect();
		path.push("plugins".to_string());
		Self {
			file,
			path,
			statements: false,
		}
	}

	/// Every declared plugin, `plugins { }` entries first.
	pub fn plugins(&self, project: &Project) -> Vec<PluginModel> {
		let tree = project.file(self.file).tree();
		let mut plugins: Vec<PluginModel> = find_blocks(tree, tree.root(), &self.path)
			.into_iter()
			.flat_map(|block| tree.children(block).to_vec())
			.filter(|child| is_plugin_entry(tree, *child))
			.map(|element| PluginModel::new(self.file, element))
			.collect();

		if self.statements {
			plugins.extend(
				tree.children(tree.root())
					.iter()
					.copied()
					.filter(|child| apply_statement_plugin(tree, *child).is_some())
					.map(|element| PluginModel::new(self.file, element)),
			);
		}

		plugins
	}

	/// Plugins that are applied to this project, leaving out
	/// `id 'x' apply false`.
	pub fn applied_plugins(&self, project: &Project) -> Vec<PluginModel> {
		self.plugins(project)
			.into_iter()
			.filter(|plugin| plugin.apply(project) != Some(false))
			.collect()
	}

	/// The plugin with this id, if declared.
	pub fn plugin(&self, project: &Project, id: &str) -> Option<PluginModel> {
		self.plugins(project)
			.into_iter()
			.find(|plugin| plugin.name(project).as_deref() == Some(id))
	}

	/// Declare a plugin. An already declared plugin is updated with the
	/// given version and apply flag instead of being declared twice.
	pub fn apply_plugin(
		&self,
		project: &mut Project,
		id: &str,
		version: Option<&str>,
		apply: Option<bool>,
	) -> DslResult<PluginModel> {
		if let Some(existing) = self.plugin(project, id) {
			if let Some(version) = version {
				existing.set_version(project, version)?;
			}
			if let Some(apply) = apply {
				existing.set_apply(project, apply)?;
			}
			return Ok(existing);
		}

		let element = project.edit(self.file, |tree| {
			let block = self.plugins_block(tree)?;
			let entry = new_plugin_entry(tree, id, version, apply)?;
			tree.add_child(block, entry)
		})?;

		Ok(PluginModel::new(self.file, element))
	}

	/// Remove every declaration of the plugin. Returns whether anything was
	/// removed.
	pub fn remove_plugin(&self, project: &mut Project, id: &str) -> DslResult<bool> {
		let elements: Vec<ElementId> = self
			.plugins(project)
			.into_iter()
			.filter(|plugin| plugin.name(project).as_deref() == Some(id))
			.map(|plugin| plugin.element)
			.collect();

		if elements.is_empty() {
			return Ok(false);
		}

		project.edit(self.file, |tree| {
			for element in elements {
				detach(tree, element)?;
			}
			Ok(true)
		})
	}

	/// The last `plugins` block, creating it when missing. A new top-level
	/// block goes after any leading `buildscript` and `pluginManagement`
	/// blocks, since Gradle requires it to come first otherwise.
	fn plugins_block(&self, tree: &mut DslTree) -> DslResult<ElementId> {
		let root = tree.root();
		if let Some(block) = find_blocks(tree, root, &self.path).last() {
			return Ok(*block);
		}

		let [name] = self.path.as_slice() else {
			return ensure_block(tree, root, &self.path);
		};

		let index = tree
			.children(root)
			.iter()
			.take_while(|child| LEADING_BLOCKS.contains(&tree.get(**child).name.as_str()))
			.count();
		let block = new_block(tree, name);
		tree.insert_child(root, index, block)?;
		Ok(block)
	}
}

/// One plugin declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginModel {
	file: FileId,
	element: ElementId,
}

impl PluginModel {
	fn new(file: FileId, element: ElementId) -> Self {
		Self { file, element }
	}

	pub fn element(&self) -> ElementId {
		self.element
	}

	/// The plugin id. For `alias(libs.plugins.x)` this is the id from the
	/// version catalog.
	pub fn name(&self, project: &Project) -> Option<String> {
		let tree = project.file(self.file).tree();
		let id = self.id_element(tree)?;
		let name = project.resolver().value_of(self.file, id)?.to::<String>()?;

		if self.is_alias(tree) {
			return Some(name.split_once(':').map_or(name.clone(), |(id, _)| id.to_string()));
		}
		Some(name)
	}

	pub fn version(&self, project: &Project) -> Option<String> {
		let tree = project.file(self.file).tree();
		if self.is_alias(tree) {
			let id = self.id_element(tree)?;
			let notation = project.resolver().value_of(self.file, id)?.to::<String>()?;
			return notation.split_once(':').map(|(_, version)| version.to_string());
		}

		let element = tree.get(self.element);
		if !matches!(element.kind, ElementKind::Infix) {
			return None;
		}
		let version = tree.child_named(self.element, "version")?;
		project.resolver().value_of(self.file, version)?.to()
	}

	/// The `apply` flag when one is written.
	pub fn apply(&self, project: &Project) -> Option<bool> {
		let tree = project.file(self.file).tree();
		if !matches!(tree.get(self.element).kind, ElementKind::Infix) {
			return None;
		}
		let apply = tree.child_named(self.element, "apply")?;
		project.resolver().value_of(self.file, apply)?.to()
	}

	/// Set the version, turning `id 'x'` into `id 'x' version 'v'`.
	pub fn set_version(&self, project: &mut Project, version: &str) -> DslResult<()> {
		self.set_pair(project, "version", Value::string(version))
	}

	pub fn set_apply(&self, project: &mut Project, apply: bool) -> DslResult<()> {
		self.set_pair(project, "apply", Value::Boolean(apply))
	}

	pub fn remove(&self, project: &mut Project) -> DslResult<()> {
		project.edit(self.file, |tree| detach(tree, self.element))
	}

	fn set_pair(&self, project: &mut Project, key: &str, value: Value) -> DslResult<()> {
		let tree = project.file(self.file).tree();
		if self.is_alias(tree) || tree.get(self.element).name == "apply" {
			return Err(DslError::UnwritableEdit(format!(
				"`{key}` cannot be set on `{}`",
				tree.get(self.element).name
			)));
		}

		project.edit(self.file, |tree| {
			tree.convert_call_to_infix(self.element)?;
			match tree.child_named(self.element, key) {
				Some(child) => tree.set_value(child, &value),
				None => {
					let child = tree.alloc_value(key, Syntax::Entry, &value);
					tree.add_child(self.element, child).map(|_| ())
				}
			}
		})
	}

	fn is_alias(&self, tree: &DslTree) -> bool {
		tree.get(self.element).name == "alias"
	}

	/// The element carrying the plugin id.
	fn id_element(&self, tree: &DslTree) -> Option<ElementId> {
		let element = tree.get(self.element);
		match &element.kind {
			ElementKind::MethodCall { .. } if element.name == "apply" => {
				apply_statement_plugin(tree, self.element)
			}
			ElementKind::MethodCall { .. } | ElementKind::Infix => {
				element.children.first().copied()
			}
			_ => None,
		}
	}
}

/// `id 'x'`, `id('x')`, `id 'x' version 'v'` or `alias(libs.plugins.x)`.
fn is_plugin_entry(tree: &DslTree, id: ElementId) -> bool {
	let element = tree.get(id);
	(element.name == "id" || element.name == "alias")
		&& matches!(element.kind, ElementKind::MethodCall { .. } | ElementKind::Infix)
		&& !element.children.is_empty()
}

/// The `plugin` entry of `apply plugin: 'x'`.
fn apply_statement_plugin(tree: &DslTree, id: ElementId) -> Option<ElementId> {
	let element = tree.get(id);
	if element.name != "apply" || !matches!(element.kind, ElementKind::MethodCall { .. }) {
		return None;
	}
	element
		.children
		.iter()
		.filter(|child| matches!(tree.get(**child).kind, ElementKind::Map { .. }))
		.find_map(|map| tree.child_named(*map, "plugin"))
}

fn new_plugin_entry(
	tree: &mut DslTree,
	id: &str,
	version: Option<&str>,
	apply: Option<bool>,
) -> DslResult<ElementId> {
	if version.is_none() && apply.is_none() {
		return new_application(tree, "id", &Value::string(id));
	}

	let entry = tree.alloc(Element::new("id", ElementKind::Infix, Syntax::Infix));
	let mut pairs = vec![("id", Value::string(id))];
	if let Some(version) = version {
		pairs.push(("version", Value::string(version)));
	}
	if let Some(apply) = apply {
		pairs.push(("apply", Value::Boolean(apply)));
	}
	for (key, value) in pairs {
		let pair = tree.alloc_value(key, Syntax::Entry, &value);
		tree.add_child(entry, pair)?;
	}
	Ok(entry)
}
