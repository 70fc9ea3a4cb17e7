use std::path::Path;

use crate::DslResult;
use crate::FileId;
use crate::Project;
use crate::TextPatch;
use crate::element::ElementId;
use crate::element::split_path;

use super::DependenciesModel;
use super::ExtModel;
use super::Holder;
use super::PluginModel;
use super::PluginsModel;
use super::PropertyModel;
use super::RepositoriesModel;
use super::detach;
use super::find_blocks;
use super::unique;

/// The model of one build script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradleBuildModel {
	file: FileId,
}

impl GradleBuildModel {
	pub fn new(file: FileId) -> Self {
		Self { file }
	}

	pub fn file(&self) -> FileId {
		self.file
	}

	pub fn path<'a>(&self, project: &'a Project) -> &'a Path {
		project.file(self.file).path()
	}

	/// The project path of this build script, e.g. `:lib`.
	pub fn project_path<'a>(&self, project: &'a Project) -> Option<&'a str> {
		let node = project.file(self.file).node()?;
		Some(project.graph().node(node).path.as_str())
	}

	pub fn ext(&self) -> ExtModel {
		ExtModel::new(self.file, &[])
	}

	pub fn buildscript(&self) -> BuildScriptModel {
		BuildScriptModel { file: self.file }
	}

	pub fn android(&self) -> BlockModel {
		self.block("android")
	}

	/// A block by dotted path, e.g. `android.defaultConfig`.
	pub fn block(&self, path: &str) -> BlockModel {
		BlockModel::new(self.file, split_path(path))
	}

	/// A property by dotted path, e.g. `android.compileSdkVersion`.
	pub fn property(&self, path: &str) -> PropertyModel {
		let mut segments = split_path(path);
		let name = segments.pop().unwrap_or_default();
		PropertyModel::new(self.file, Holder::Path(segments), name)
	}

	pub fn repositories(&self) -> RepositoriesModel {
		RepositoriesModel::new(self.file, &[])
	}

	pub fn dependencies(&self) -> DependenciesModel {
		DependenciesModel::new(self.file, &[])
	}

	pub fn plugins(&self) -> PluginsModel {
		PluginsModel::build(self.file)
	}

	pub fn applied_plugins(&self, project: &Project) -> Vec<PluginModel> {
		self.plugins().applied_plugins(project)
	}

	/// Add `id 'x'` to the `plugins` block.
	pub fn apply_plugin(&self, project: &mut Project, id: &str) -> DslResult<PluginModel> {
		self.plugins().apply_plugin(project, id, None, None)
	}

	pub fn java(&self) -> JavaModel {
		JavaModel { file: self.file }
	}

	pub fn subprojects(&self) -> BlockModel {
		self.block("subprojects")
	}

	pub fn allprojects(&self) -> BlockModel {
		self.block("allprojects")
	}

	pub fn is_modified(&self, project: &Project) -> bool {
		project.file(self.file).is_modified()
	}

	/// Write the pending edits of this file.
	pub fn apply_changes(&self, project: &mut Project) -> DslResult<TextPatch> {
		project.apply_file_changes(self.file)
	}

	/// Discard pending edits by re-reading the file.
	pub fn reparse(&self, project: &mut Project) -> DslResult<()> {
		project.reparse_file(self.file)
	}
}

/// `buildscript { }`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildScriptModel {
	file: FileId,
}

impl BuildScriptModel {
	pub fn ext(&self) -> ExtModel {
		ExtModel::new(self.file, &["buildscript"])
	}

	pub fn repositories(&self) -> RepositoriesModel {
		RepositoriesModel::new(self.file, &["buildscript"])
	}

	pub fn dependencies(&self) -> DependenciesModel {
		DependenciesModel::new(self.file, &["buildscript"])
	}
}

/// Java compatibility settings, read from a `java { }` block when the
/// build script has one and from the top level otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JavaModel {
	file: FileId,
}

impl JavaModel {
	pub fn source_compatibility(&self, project: &Project) -> PropertyModel {
		self.property(project, "sourceCompatibility")
	}

	pub fn target_compatibility(&self, project: &Project) -> PropertyModel {
		self.property(project, "targetCompatibility")
	}

	fn property(&self, project: &Project, name: &str) -> PropertyModel {
		let in_block = PropertyModel::new(self.file, Holder::Path(vec!["java".to_string()]), name);
		if in_block.exists(project) {
			in_block
		} else {
			PropertyModel::new(self.file, Holder::Path(Vec::new()), name)
		}
	}
}

/// A named block such as `android` or `android.defaultConfig`. All blocks
/// with the same path merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockModel {
	file: FileId,
	path: Vec<String>,
}

impl BlockModel {
	pub fn new(file: FileId, path: Vec<String>) -> Self {
		Self { file, path }
	}

	pub fn path(&self) -> &[String] {
		&self.path
	}

	pub fn elements(&self, project: &Project) -> Vec<ElementId> {
		let tree = project.file(self.file).tree();
		find_blocks(tree, tree.root(), &self.path)
	}

	pub fn exists(&self, project: &Project) -> bool {
		!self.elements(project).is_empty()
	}

	pub fn block(&self, name: &str) -> Self {
		let mut path = self.path.clone();
		path.extend(split_path(name));
		Self::new(self.file, path)
	}

	pub fn property(&self, name: &str) -> PropertyModel {
		PropertyModel::new(self.file, Holder::Path(self.path.clone()), name)
	}

	/// Names of the properties and nested blocks declared directly in the
	/// merged blocks, in declaration order.
	pub fn properties(&self, project: &Project) -> Vec<String> {
		let tree = project.file(self.file).tree();
		unique(
			self.elements(project)
				.into_iter()
				.flat_map(|block| tree.children(block).to_vec())
				.map(|child| tree.get(child).name.clone()),
		)
	}

	/// Remove every block with this path. Returns whether anything was
	/// removed.
	pub fn delete(&self, project: &mut Project) -> DslResult<bool> {
		let elements = self.elements(project);
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
}
