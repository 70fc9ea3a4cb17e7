use serde::Serialize;

use crate::DslResult;
use crate::DslTree;
use crate::FileId;
use crate::Project;
use crate::Value;
use crate::element::ElementId;
use crate::element::ElementKind;

use super::detach;
use super::ensure_block;
use super::find_blocks;
use super::find_property;
use super::new_application;
use super::new_block;
use super::new_call;

/// The kinds of repository the model understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryKind {
	/// `google()`
	Google,
	/// `jcenter()`
	JCenter,
	/// `mavenCentral()`
	MavenCentral,
	/// `mavenLocal()`
	MavenLocal,
	/// `gradlePluginPortal()`
	GradlePluginPortal,
	/// `maven { url '...' }`
	Maven,
}

impl RepositoryKind {
	/// The kind created by a shorthand method such as `google()`.
	pub fn from_method(method: &str) -> Option<Self> {
		match method {
			"google" => Some(Self::Google),
			"jcenter" => Some(Self::JCenter),
			"mavenCentral" => Some(Self::MavenCentral),
			"mavenLocal" => Some(Self::MavenLocal),
			"gradlePluginPortal" => Some(Self::GradlePluginPortal),
			_ => None,
		}
	}

	/// The name Gradle gives a repository of this kind when none is set.
	pub fn default_name(self) -> &'static str {
		match self {
			Self::Google => "Google",
			Self::JCenter => "BintrayJCenter2",
			Self::MavenCentral => "MavenRepo",
			Self::MavenLocal => "MavenLocal",
			Self::GradlePluginPortal => "Gradle Central Plugin Repository",
			Self::Maven => "maven",
		}
	}

	pub fn default_url(self) -> Option<&'static str> {
		match self {
			Self::Google => Some("https://dl.google.com/dl/android/maven2/"),
			Self::JCenter => Some("https://jcenter.bintray.com/"),
			Self::MavenCentral => Some("https://repo.maven.apache.org/maven2/"),
			Self::GradlePluginPortal => Some("https://plugins.gradle.org/m2/"),
			Self::MavenLocal | Self::Maven => None,
		}
	}
}

/// A `repositories { }` block, wherever it appears.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoriesModel {
	file: FileId,
	path: Vec<String>,
}

impl RepositoriesModel {
	pub(crate) fn new(file: FileId, scope: &[&str]) -> Self {
		let mut path: Vec<String> = scope.iter().map(ToString::to_string).collect();
		path.push("repositories".to_string());
		Self { file, path }
	}

	/// Repositories in declaration order, across every merged block.
	pub fn repositories(&self, project: &Project) -> Vec<RepositoryModel> {
		let tree = project.file(self.file).tree();
		find_blocks(tree, tree.root(), &self.path)
			.into_iter()
			.flat_map(|block| tree.children(block).to_vec())
			.filter_map(|child| {
				repository_kind(tree, child).map(|kind| {
					RepositoryModel {
						file: self.file,
						element: child,
						kind,
					}
				})
			})
			.collect()
	}

	/// Whether a repository is declared through the shorthand `method()`.
	pub fn contains_method_call(&self, project: &Project, method: &str) -> bool {
		let tree = project.file(self.file).tree();
		find_blocks(tree, tree.root(), &self.path)
			.into_iter()
			.flat_map(|block| tree.children(block).to_vec())
			.any(|child| {
				matches!(
					&tree.get(child).kind,
					ElementKind::MethodCall { method: name, .. } if name == method
				)
			})
	}

	/// Add `method()` unless it is already declared.
	pub fn add_repository_by_method_name(&self, project: &mut Project, method: &str) -> DslResult<()> {
		if self.contains_method_call(project, method) {
			return Ok(());
		}

		project.edit(self.file, |tree| {
			let root = tree.root();
			let block = ensure_block(tree, root, &self.path)?;
			let call = new_call(tree, method);
			tree.add_child(block, call).map(|_| ())
		})
	}

	pub fn add_google_maven_repository(&self, project: &mut Project) -> DslResult<()> {
		self.add_repository_by_method_name(project, "google")
	}

	/// Add `maven { url 'url' }`, with `name 'name'` when given.
	pub fn add_maven_repository(
		&self,
		project: &mut Project,
		url: &str,
		name: Option<&str>,
	) -> DslResult<()> {
		project.edit(self.file, |tree| {
			let root = tree.root();
			let block = ensure_block(tree, root, &self.path)?;
			let maven = new_block(tree, "maven");
			if let Some(name) = name {
				let name = new_application(tree, "name", &Value::string(name))?;
				tree.add_child(maven, name)?;
			}
			let url = new_application(tree, "url", &Value::string(url))?;
			tree.add_child(maven, url)?;
			tree.add_child(block, maven).map(|_| ())
		})
	}

	pub fn remove_repository(&self, project: &mut Project, repository: &RepositoryModel) -> DslResult<()> {
		repository.remove(project)
	}
}

/// One declared repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryModel {
	file: FileId,
	element: ElementId,
	kind: RepositoryKind,
}

impl RepositoryModel {
	pub fn kind(&self) -> RepositoryKind {
		self.kind
	}

	pub fn element(&self) -> ElementId {
		self.element
	}

	/// The `name` set inside a `maven { }` block, otherwise the default name
	/// of the kind.
	pub fn name(&self, project: &Project) -> String {
		self.block_value(project, "name")
			.unwrap_or_else(|| self.kind.default_name().to_string())
	}

	pub fn url(&self, project: &Project) -> Option<String> {
		match self.kind {
			RepositoryKind::Maven => self.block_value(project, "url"),
			kind => kind.default_url().map(ToString::to_string),
		}
	}

	pub fn remove(&self, project: &mut Project) -> DslResult<()> {
		project.edit(self.file, |tree| detach(tree, self.element))
	}

	fn block_value(&self, project: &Project, name: &str) -> Option<String> {
		let tree = project.file(self.file).tree();
		if !tree.get(self.element).kind.is_block() {
			return None;
		}
		let property = find_property(tree, self.element, &[name.to_string()])?;
		project.resolver().value_of(self.file, property)?.to()
	}
}

fn repository_kind(tree: &DslTree, id: ElementId) -> Option<RepositoryKind> {
	let element = tree.get(id);
	match &element.kind {
		ElementKind::Block if element.name == "maven" => Some(RepositoryKind::Maven),
		ElementKind::MethodCall { method, .. } => RepositoryKind::from_method(method),
		_ => None,
	}
}
