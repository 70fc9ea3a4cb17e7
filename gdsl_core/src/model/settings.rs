use std::path::Path;
use std::path::PathBuf;

use crate::DslResult;
use crate::DslTree;
use crate::FileId;
use crate::Project;
use crate::SettingsDeclarations;
use crate::TextPatch;
use crate::Value;
use crate::catalog::catalog_source_element;
use crate::catalog::declared_catalogs;
use crate::element::Element;
use crate::element::ElementId;
use crate::element::ElementKind;
use crate::element::Syntax;
use crate::element::call_segment;
use crate::element::split_path;
use crate::hierarchy::normalize_project_path;

use super::PluginsModel;
use super::RepositoriesModel;
use super::detach;
use super::ensure_block;
use super::new_application;
use super::new_block;

/// The model of the settings script.
///
/// Module paths are read from the tree, so they reflect pending edits.
/// Directories and build files come from the project graph, which follows
/// the settings file once its edits are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradleSettingsModel {
	file: FileId,
}

impl GradleSettingsModel {
	pub fn new(file: FileId) -> Self {
		Self { file }
	}

	pub fn file(&self) -> FileId {
		self.file
	}

	/// `:` followed by every included path in declaration order.
	pub fn module_paths(&self, project: &Project) -> Vec<String> {
		let declarations = SettingsDeclarations::from_tree(project.file(self.file).tree());
		std::iter::once(":".to_string())
			.chain(declarations.includes)
			.collect()
	}

	/// Add `include ':path'` after the last `include` statement.
	pub fn add_module_path(&self, project: &mut Project, path: &str) -> DslResult<()> {
		let path = normalize_project_path(path);
		if self.module_paths(project).contains(&path) {
			return Ok(());
		}

		project.edit(self.file, |tree| {
			let root = tree.root();
			let index = tree
				.children(root)
				.iter()
				.rposition(|child| tree.get(*child).name == "include")
				.map_or(tree.children(root).len(), |index| index + 1);
			let include = new_application(tree, "include", &Value::string(path.as_str()))?;
			tree.insert_child(root, index, include)
		})
	}

	/// Remove `path` from every `include` statement, together with any
	/// `project(':path')` overrides. Returns whether anything was removed.
	pub fn remove_module_path(&self, project: &mut Project, path: &str) -> DslResult<bool> {
		let path = normalize_project_path(path);
		if path == ":" {
			return Ok(false);
		}

		let tree = project.file(self.file).tree();
		let targets = include_targets(tree, &path);
		if targets.is_empty() {
			return Ok(false);
		}

		project.edit(self.file, |tree| {
			for (parent, element) in targets {
				if parent == tree.root() {
					detach(tree, element)?;
				} else {
					tree.remove_child(parent, element)?;
				}
			}
			Ok(true)
		})
	}

	pub fn module_directory(&self, project: &Project, path: &str) -> Option<PathBuf> {
		let node = project.graph().find(&normalize_project_path(path))?;
		Some(project.graph().node(node).dir.clone())
	}

	/// The path of the project whose directory is `dir`.
	pub fn module_with_directory(&self, project: &Project, dir: &Path) -> Option<String> {
		let node = project.graph().node_with_directory(dir)?;
		Some(project.graph().node(node).path.clone())
	}

	pub fn parent_module(&self, project: &Project, path: &str) -> Option<String> {
		let graph = project.graph();
		let node = graph.find(&normalize_project_path(path))?;
		let parent = graph.parent(node)?;
		Some(graph.node(parent).path.clone())
	}

	pub fn build_file(&self, project: &Project, path: &str) -> Option<PathBuf> {
		let node = project.graph().find(&normalize_project_path(path))?;
		Some(project.graph().node(node).build_file.clone())
	}

	/// `rootProject.name`, falling back to the root directory name.
	pub fn root_project_name(&self, project: &Project) -> String {
		let graph = project.graph();
		SettingsDeclarations::from_tree(project.file(self.file).tree())
			.root_name
			.unwrap_or_else(|| graph.node(graph.root()).name.clone())
	}

	pub fn plugin_management(&self) -> PluginManagementModel {
		PluginManagementModel { file: self.file }
	}

	pub fn plugins(&self) -> PluginsModel {
		PluginsModel::nested(self.file, &[])
	}

	pub fn dependency_resolution_management(&self) -> DependencyResolutionManagementModel {
		DependencyResolutionManagementModel { file: self.file }
	}

	pub fn is_modified(&self, project: &Project) -> bool {
		project.file(self.file).is_modified()
	}

	/// Write the pending edits and rebuild the hierarchy.
	pub fn apply_changes(&self, project: &mut Project) -> DslResult<TextPatch> {
		project.apply_file_changes(self.file)
	}
}

/// Every `(parent, element)` that names `path`: whole include statements
/// with a single path, arguments and list items otherwise, and
/// `project(':path').x = ...` overrides.
fn include_targets(tree: &DslTree, path: &str) -> Vec<(ElementId, ElementId)> {
	let root = tree.root();
	let names_path = |id: ElementId| {
		Value::from_element(tree, id)
			.and_then(|value| value.to::<String>())
			.is_some_and(|value| normalize_project_path(&value) == path)
	};

	let mut targets = Vec::new();
	for statement in tree.children(root) {
		let element = tree.get(*statement);

		if element.name == "include" {
			let items: Vec<(ElementId, ElementId)> = element
				.children
				.iter()
				.flat_map(|argument| {
					match tree.get(*argument).kind {
						ElementKind::List => {
							tree.children(*argument)
								.iter()
								.map(|item| (*argument, *item))
								.collect()
						}
						_ => vec![(*statement, *argument)],
					}
				})
				.collect();
			let matching: Vec<_> = items.iter().copied().filter(|(_, item)| names_path(*item)).collect();

			if !matching.is_empty() && matching.len() == items.len() {
				targets.push((root, *statement));
			} else {
				targets.extend(matching);
			}
			continue;
		}

		let overrides = split_path(&element.name)
			.first()
			.and_then(|head| call_segment(head).map(|(method, argument)| (method == "project", argument)))
			.is_some_and(|(is_project, argument)| is_project && normalize_project_path(&argument) == path);
		if overrides {
			targets.push((root, *statement));
		}
	}

	targets
}

/// `pluginManagement { }`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginManagementModel {
	file: FileId,
}

impl PluginManagementModel {
	pub fn plugins(&self) -> PluginsModel {
		PluginsModel::nested(self.file, &["pluginManagement"])
	}

	pub fn repositories(&self) -> RepositoriesModel {
		RepositoriesModel::new(self.file, &["pluginManagement"])
	}
}

/// `dependencyResolutionManagement { }`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyResolutionManagementModel {
	file: FileId,
}

const MANAGEMENT: &str = "dependencyResolutionManagement";
const CATALOGS: &str = "versionCatalogs";

impl DependencyResolutionManagementModel {
	pub fn repositories(&self) -> RepositoriesModel {
		RepositoriesModel::new(self.file, &[MANAGEMENT])
	}

	/// Declared catalogs in declaration order.
	pub fn version_catalogs(&self, project: &Project) -> Vec<VersionCatalogModel> {
		let tree = project.file(self.file).tree();
		declared_catalogs(tree)
			.into_iter()
			.map(|element| {
				VersionCatalogModel {
					file: self.file,
					name: tree.get(element).name.clone(),
				}
			})
			.collect()
	}

	pub fn version_catalog(&self, project: &Project, name: &str) -> Option<VersionCatalogModel> {
		self.version_catalogs(project)
			.into_iter()
			.find(|catalog| catalog.name == name)
	}

	/// Declare an empty catalog block `name { }`.
	pub fn add_version_catalog(&self, project: &mut Project, name: &str) -> DslResult<VersionCatalogModel> {
		let catalog = VersionCatalogModel {
			file: self.file,
			name: name.to_string(),
		};
		if self.version_catalog(project, name).is_some() {
			return Ok(catalog);
		}

		project.edit(self.file, |tree| {
			let root = tree.root();
			let catalogs = ensure_block(tree, root, &[MANAGEMENT.to_string(), CATALOGS.to_string()])?;
			let block = new_block(tree, name);
			tree.add_child(catalogs, block).map(|_| ())
		})?;
		Ok(catalog)
	}

	pub fn remove_version_catalog(&self, project: &mut Project, name: &str) -> DslResult<bool> {
		let Some(catalog) = self.version_catalog(project, name) else {
			return Ok(false);
		};
		let elements = catalog.elements(project);
		project.edit(self.file, |tree| {
			for element in elements {
				detach(tree, element)?;
			}
			Ok(true)
		})
	}
}

/// One `name { from(files('...')) }` catalog declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCatalogModel {
	file: FileId,
	name: String,
}

impl VersionCatalogModel {
	pub fn name(&self) -> &str {
		&self.name
	}

	/// The catalog file, relative to the root.
	pub fn from(&self, project: &Project) -> Option<String> {
		let tree = project.file(self.file).tree();
		let element = self.elements(project).last().copied()?;
		let source = catalog_source_element(tree, element)?;
		project.resolver().value_of(self.file, source)?.to()
	}

	/// Set the catalog file, writing `from(files('path'))` when the
	/// catalog has no source yet.
	pub fn set_from(&self, project: &mut Project, path: &str) -> DslResult<()> {
		let tree = project.file(self.file).tree();
		let Some(element) = self.elements(project).last().copied() else {
			return Err(crate::DslError::UnwritableEdit(format!(
				"version catalog `{}` is not declared",
				self.name
			)));
		};
		let source = catalog_source_element(tree, element);
		let value = Value::string(path);

		project.edit(self.file, |tree| {
			if let Some(source) = source {
				return tree.set_value(source, &value);
			}

			let from = tree.alloc(Element::new(
				"from",
				ElementKind::MethodCall {
					method: "from".to_string(),
					parens: true,
				},
				Syntax::Call,
			));
			let files = tree.alloc(Element::new(
				"",
				ElementKind::MethodCall {
					method: "files".to_string(),
					parens: true,
				},
				Syntax::Argument,
			));
			let argument = tree.alloc_value("", Syntax::Argument, &value);
			tree.add_child(files, argument)?;
			tree.add_child(from, files)?;
			tree.add_child(element, from).map(|_| ())
		})
	}

	fn elements(&self, project: &Project) -> Vec<ElementId> {
		let tree = project.file(self.file).tree();
		declared_catalogs(tree)
			.into_iter()
			.filter(|element| tree.get(*element).name == self.name)
			.collect()
	}
}
