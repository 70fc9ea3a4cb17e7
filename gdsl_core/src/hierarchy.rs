use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::DslError;
use crate::DslResult;
use crate::DslTree;
use crate::FileId;
use crate::TextSource;
use crate::Value;
use crate::element::ElementId;
use crate::element::ElementKind;
use crate::element::Literal;
use crate::element::call_segment;
use crate::element::split_path;
use crate::parser::parse_with_diagnostics;

/// Index of a project inside a [`ProjectGraph`].
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
	pub fn index(self) -> usize {
		self.0
	}
}

/// One project of a multi-project build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectNode {
	/// Gradle path, `:` for the root and `:a:b` for nested projects.
	pub path: String,
	pub name: String,
	pub dir: PathBuf,
	pub build_file: PathBuf,
	pub parent: Option<NodeId>,
	pub children: Vec<NodeId>,
	#[serde(skip)]
	pub(crate) file: Option<FileId>,
}

impl ProjectNode {
	/// The parsed build script of this project, once the project is open.
	pub fn file(&self) -> Option<FileId> {
		self.file
	}

	pub fn is_root(&self) -> bool {
		self.parent.is_none()
	}
}

/// Everything the settings script declares about the project hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsDeclarations {
	/// Included project paths in declaration order, normalized to a leading
	/// `:`. Duplicates are dropped.
	pub includes: Vec<String>,
	/// `project(':x').projectDir` overrides, relative to the root.
	pub project_dirs: BTreeMap<String, PathBuf>,
	/// `project(':x').buildFileName` overrides.
	pub build_file_names: BTreeMap<String, String>,
	/// `rootProject.name`
	pub root_name: Option<String>,
}

impl SettingsDeclarations {
	pub fn from_text(text: &str) -> Self {
		let (tree, _) = parse_with_diagnostics(text);
		Self::from_tree(&tree)
	}

	/// Read the declarations from the top level statements of a settings
	/// tree. Later assignments override earlier ones.
	pub fn from_tree(tree: &DslTree) -> Self {
		let mut declarations = Self::default();

		for child in tree.children(tree.root()) {
			let element = tree.get(*child);

			if element.name == "include" {
				for path in include_arguments(tree, *child) {
					let path = normalize_project_path(&path);
					if path != ":" && !declarations.includes.contains(&path) {
						declarations.includes.push(path);
					}
				}
				continue;
			}

			let segments = split_path(&element.name);
			match segments.as_slice() {
				[root, name] if root == "rootProject" && name == "name" => {
					if let Some(text) = string_value(tree, *child) {
						declarations.root_name = Some(text);
					}
				}
				[head, property] => {
					let Some(("project", path)) = call_segment(head) else {
						continue;
					};
					let path = normalize_project_path(&path);
					match property.as_str() {
						"projectDir" => {
							if let Some(dir) = directory_value(tree, *child) {
								declarations.project_dirs.insert(path, dir);
							}
						}
						"buildFileName" => {
							if let Some(name) = string_value(tree, *child) {
								declarations.build_file_names.insert(path, name);
							}
						}
						_ => {}
					}
				}
				_ => {}
			}
		}

		declarations
	}
}

/// Enumerate the project paths named by `include` statements, in declaration
/// order.
pub fn list_declared_subprojects(settings_text: &str) -> Vec<String> {
	SettingsDeclarations::from_text(settings_text).includes
}

/// Build the hierarchy strictly: the first declared project without a
/// directory fails with [`DslError::MalformedHierarchy`].
pub fn build_graph(
	settings_text: &str,
	root: &Path,
	source: &dyn TextSource,
) -> DslResult<ProjectGraph> {
	let declarations = SettingsDeclarations::from_text(settings_text);
	let build_files = crate::FilesConfig::default().build;
	let (graph, problems) = ProjectGraph::build(&declarations, root, source, &build_files);

	match problems.into_iter().next() {
		Some(problem) => Err(problem),
		None => Ok(graph),
	}
}

/// The root, parent and child relationships of a multi-project build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectGraph {
	root_dir: PathBuf,
	nodes: Vec<ProjectNode>,
	#[serde(skip)]
	by_path: BTreeMap<String, NodeId>,
}

impl ProjectGraph {
	/// Build the hierarchy leniently. Projects whose directory is missing are
	/// left out and reported as problems.
	pub fn build(
		declarations: &SettingsDeclarations,
		root: &Path,
		source: &dyn TextSource,
		build_files: &[String],
	) -> (Self, Vec<DslError>) {
		let root_name = declarations.root_name.clone().unwrap_or_else(|| {
			root.file_name()
				.map_or_else(String::new, |name| name.to_string_lossy().into_owned())
		});

		let mut graph = Self {
			root_dir: root.to_path_buf(),
			nodes: Vec::new(),
			by_path: BTreeMap::new(),
		};
		let mut problems = Vec::new();

		let root_build = build_file_for(declarations, ":", root, source, build_files);
		graph.push(ProjectNode {
			path: ":".to_string(),
			name: root_name,
			dir: root.to_path_buf(),
			build_file: root_build,
			parent: None,
			children: Vec::new(),
			file: None,
		});

		// Parents are created before their children.
		let mut includes: Vec<&String> = declarations.includes.iter().collect();
		includes.sort_by_key(|path| path.matches(':').count());

		for path in includes {
			let dir = project_dir(declarations, path, root);
			if !source.exists(&dir) {
				warn!(path = %path, dir = %dir.display(), "declared project has no directory");
				problems.push(DslError::MalformedHierarchy {
					path: path.clone(),
					reason: format!("directory `{}` does not exist", dir.display()),
				});
				continue;
			}

			let parent = path_ancestors(path)
				.find_map(|ancestor| graph.find(ancestor))
				.unwrap_or(graph.root());
			let name = path.rsplit(':').next().unwrap_or_default().to_string();
			let build_file = build_file_for(declarations, path, &dir, source, build_files);

			let id = graph.push(ProjectNode {
				path: path.clone(),
				name,
				dir,
				build_file,
				parent: Some(parent),
				children: Vec::new(),
				file: None,
			});
			graph.nodes[parent.0].children.push(id);
		}

		debug!(projects = graph.nodes.len(), problems = problems.len(), "built project graph");
		(graph, problems)
	}

	fn push(&mut self, node: ProjectNode) -> NodeId {
		let id = NodeId(self.nodes.len());
		self.by_path.insert(node.path.clone(), id);
		self.nodes.push(node);
		id
	}

	pub fn root(&self) -> NodeId {
		NodeId(0)
	}

	pub fn root_dir(&self) -> &Path {
		&self.root_dir
	}

	pub fn node(&self, id: NodeId) -> &ProjectNode {
		&self.nodes[id.0]
	}

	pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut ProjectNode {
		&mut self.nodes[id.0]
	}

	pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &ProjectNode)> {
		self.nodes
			.iter()
			.enumerate()
			.map(|(index, node)| (NodeId(index), node))
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Look up a project by its absolute path. `lib` and `:lib` are the same.
	pub fn find(&self, path: &str) -> Option<NodeId> {
		self.by_path.get(&normalize_project_path(path)).copied()
	}

	/// Resolve `path` as seen from `from`. Paths starting with `:` are
	/// absolute and always looked up from the root; other paths are relative
	/// to `from`.
	pub fn resolve_path(&self, from: NodeId, path: &str) -> Option<NodeId> {
		let path = path.trim();
		if path.starts_with(':') {
			return self.find(path);
		}

		let base = &self.node(from).path;
		if base == ":" {
			self.find(&format!(":{path}"))
		} else {
			self.find(&format!("{base}:{path}"))
		}
	}

	pub fn parent(&self, id: NodeId) -> Option<NodeId> {
		self.node(id).parent
	}

	/// Ancestor projects, nearest first. Does not include `id`.
	pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
		std::iter::successors(self.parent(id), |current| self.parent(*current))
	}

	/// The project whose directory is `dir`.
	pub fn node_with_directory(&self, dir: &Path) -> Option<NodeId> {
		self.nodes().find(|(_, node)| node.dir == dir).map(|(id, _)| id)
	}
}

/// Normalize a project path so it starts with `:`.
pub fn normalize_project_path(project_path: &str) -> String {
	let project_path = project_path.trim();
	if project_path.is_empty() || project_path == ":" {
		return ":".to_string();
	}
	if project_path.starts_with(':') {
		project_path.to_string()
	} else {
		format!(":{project_path}")
	}
}

/// `:a:b:c` yields `:a:b` then `:a`.
fn path_ancestors(path: &str) -> impl Iterator<Item = &str> {
	std::iter::successors(parent_path(path), |current| parent_path(current))
}

fn parent_path(path: &str) -> Option<&str> {
	let index = path.rfind(':')?;
	(index > 0).then(|| &path[..index])
}

/// The directory of a declared project: its override, otherwise the
/// directory of its parent path joined with its last segment.
fn project_dir(declarations: &SettingsDeclarations, path: &str, root: &Path) -> PathBuf {
	if let Some(dir) = declarations.project_dirs.get(path) {
		return root.join(dir);
	}

	let name = path.rsplit(':').next().unwrap_or_default();
	match parent_path(path) {
		Some(parent) => project_dir(declarations, parent, root).join(name),
		None => root.join(name),
	}
}

fn build_file_for(
	declarations: &SettingsDeclarations,
	path: &str,
	dir: &Path,
	source: &dyn TextSource,
	build_files: &[String],
) -> PathBuf {
	if let Some(name) = declarations.build_file_names.get(path) {
		return dir.join(name);
	}

	build_files
		.iter()
		.map(|name| dir.join(name))
		.find(|candidate| source.exists(candidate))
		.or_else(|| build_files.first().map(|name| dir.join(name)))
		.unwrap_or_else(|| dir.join("build.gradle"))
}

fn include_arguments(tree: &DslTree, id: ElementId) -> Vec<String> {
	let mut paths = Vec::new();
	for argument in tree.children(id) {
		match Value::from_element(tree, *argument) {
			Some(Value::String(path)) => paths.push(path),
			Some(Value::List(items)) => {
				paths.extend(items.into_iter().filter_map(|item| item.to::<String>()));
			}
			_ => {}
		}
	}
	paths
}

fn string_value(tree: &DslTree, id: ElementId) -> Option<String> {
	let element = tree.get(id);
	match &element.kind {
		ElementKind::Literal(Literal::String { value, .. }) => Some(value.clone()),
		ElementKind::MethodCall { parens: false, .. } => {
			let [argument] = element.children.as_slice() else {
				return None;
			};
			string_value(tree, *argument)
		}
		_ => None,
	}
}

/// `file('dir')`, `new File(settingsDir, 'dir')`, `new File(rootDir, 'dir')`
/// or `'dir'`, relative to the root.
fn directory_value(tree: &DslTree, id: ElementId) -> Option<PathBuf> {
	let element = tree.get(id);
	let relative = match &element.kind {
		ElementKind::Literal(Literal::String { value, .. }) => value.clone(),
		ElementKind::MethodCall { method, .. } => {
			let arguments = &element.children;
			match (method.as_str(), arguments.as_slice()) {
				("file", [path]) => string_value(tree, *path)?,
				("new File" | "new java.io.File", [base, path]) => {
					let ElementKind::Reference(base) = &tree.get(*base).kind else {
						return None;
					};
					if base != "settingsDir" && base != "rootDir" {
						return None;
					}
					string_value(tree, *path)?
				}
				_ => return None,
			}
		}
		_ => return None,
	};

	normalize_dir(&relative)
}

fn normalize_dir(dir: &str) -> Option<PathBuf> {
	let mut dir = dir.trim().replace('\\', "/");
	while let Some(stripped) = dir.strip_prefix("./") {
		dir = stripped.to_string();
	}
	while dir.ends_with('/') {
		dir.pop();
	}

	if dir.starts_with('/') {
		return None;
	}
	if dir.is_empty() {
		return Some(PathBuf::from("."));
	}

	Some(PathBuf::from(dir))
}
