use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use parking_lot::RwLock;
use tracing::debug;
use tracing::trace;

use crate::DslTree;
use crate::FileId;
use crate::FileModel;
use crate::ProjectGraph;
use crate::Value;
use crate::VersionCatalog;
use crate::element::ElementId;
use crate::element::ElementKind;
use crate::element::Literal;
use crate::element::call_segment;
use crate::element::split_path;
use crate::hierarchy::NodeId;

/// Identifies one resolution query: a name looked up from an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
	pub file: FileId,
	pub element: ElementId,
	pub name: String,
}

/// Memoized resolution results for one session. `None` entries record names
/// that did not resolve.
#[derive(Debug, Default)]
pub struct ResolutionCache {
	entries: RwLock<HashMap<CacheKey, Option<Value>>>,
}

impl ResolutionCache {
	pub fn get(&self, key: &CacheKey) -> Option<Option<Value>> {
		self.entries.read().get(key).cloned()
	}

	pub fn insert(&self, key: CacheKey, value: Option<Value>) {
		self.entries.write().insert(key, value);
	}

	pub fn clear(&self) {
		self.entries.write().clear();
	}

	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}

/// The project graph together with the resolution cache computed against
/// it. Any edit or reparse invalidates the cache.
#[derive(Debug)]
pub struct Session {
	graph: ProjectGraph,
	cache: ResolutionCache,
}

impl Session {
	pub fn new(graph: ProjectGraph) -> Self {
		Self {
			graph,
			cache: ResolutionCache::default(),
		}
	}

	pub fn graph(&self) -> &ProjectGraph {
		&self.graph
	}

	pub(crate) fn graph_mut(&mut self) -> &mut ProjectGraph {
		&mut self.graph
	}

	pub fn cache(&self) -> &ResolutionCache {
		&self.cache
	}

	/// Drop every memoized result.
	pub fn invalidate(&self) {
		if !self.cache.is_empty() {
			trace!(entries = self.cache.len(), "invalidating resolution cache");
		}
		self.cache.clear();
	}

	/// Replace the graph after the settings file changed.
	pub(crate) fn replace_graph(&mut self, graph: ProjectGraph) {
		self.graph = graph;
		self.invalidate();
	}
}

/// Resolves symbolic names across the files of a project.
///
/// Lookups run in this order, first match wins:
///
/// 1. the enclosing blocks of the element, nearest first
/// 2. project properties (`rootDir`, `projectDir`, `name`, ...), project
///    switches (`rootProject`, `parent`, `project(':x')`) and version catalogs
/// 3. `ext` properties of the enclosing blocks, then of ancestor projects
/// 4. `subprojects` blocks of ancestor projects, then `allprojects` blocks
///
/// A name that is already being resolved higher up the same query resolves
/// to `None`, so reference cycles terminate.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
	files: &'a [FileModel],
	session: &'a Session,
	catalogs: &'a [VersionCatalog],
}

type Stack = Vec<CacheKey>;

impl<'a> Resolver<'a> {
	pub fn new(files: &'a [FileModel], session: &'a Session, catalogs: &'a [VersionCatalog]) -> Self {
		Self {
			files,
			session,
			catalogs,
		}
	}

	/// The value of an element, following references transitively.
	pub fn value_of(&self, file: FileId, id: ElementId) -> Option<Value> {
		let mut stack = Stack::new();
		self.eval(file, id, &mut stack)
	}

	/// Resolve `name` as seen from the element `from`.
	pub fn resolve(&self, file: FileId, from: ElementId, name: &str) -> Option<Value> {
		let mut stack = Stack::new();
		self.resolve_name(file, from, name, &mut stack)
	}

	/// A property a project inherits from `subprojects` and `allprojects`
	/// blocks without declaring it itself.
	pub fn inherited_value(&self, node: NodeId, path: &[String]) -> Option<Value> {
		let mut stack = Stack::new();
		self.inherited(node, path, &mut stack)
	}

	/// Resolve `name` against the build script of a project, the way
	/// `project(':x').name` would.
	pub fn project_value(&self, node: NodeId, name: &str) -> Option<Value> {
		let segments = split_path(name);
		if segments.is_empty() {
			return None;
		}
		let mut stack = Stack::new();
		self.project_property(node, &segments, &mut stack)
	}

	fn tree(&self, file: FileId) -> &'a DslTree {
		self.files[file.index()].tree()
	}

	/// The project a file belongs to. The settings file belongs to the root.
	fn context(&self, file: FileId) -> NodeId {
		self.files[file.index()]
			.node()
			.unwrap_or_else(|| self.session.graph().root())
	}

	fn resolve_name(
		&self,
		file: FileId,
		from: ElementId,
		name: &str,
		stack: &mut Stack,
	) -> Option<Value> {
		let key = CacheKey {
			file,
			element: from,
			name: name.to_string(),
		};

		if let Some(cached) = self.session.cache().get(&key) {
			return cached;
		}

		if stack.contains(&key) {
			debug!(name, file = file.index(), "reference cycle detected, leaving unresolved");
			return None;
		}

		stack.push(key.clone());
		let value = self.lookup(file, from, name, stack);
		stack.pop();

		self.session.cache().insert(key, value.clone());
		value
	}

	fn lookup(&self, file: FileId, from: ElementId, name: &str, stack: &mut Stack) -> Option<Value> {
		let segments = split_path(name);
		if segments.is_empty() {
			return None;
		}

		let tree = self.tree(file);
		let scopes = block_scopes(tree, from);
		let excluded = statement_chain(tree, from);
		let node = self.context(file);

		for scope in &scopes {
			if let Some(declared) = self.declaration_in_block(file, *scope, &segments, &excluded, stack) {
				return declared;
			}
		}

		self.special(node, &segments, stack)
			.or_else(|| self.ext_lookup(file, &scopes, &segments, &excluded, stack))
			.or_else(|| self.ancestor_ext(node, &segments, stack))
			.or_else(|| self.inherited(node, &segments, stack))
	}

	/// Search the children of `block` for `segments`. Later declarations win;
	/// same-named blocks are searched from last to first, so together they
	/// behave as one merged block.
	fn lookup_in_block(
		&self,
		file: FileId,
		block: ElementId,
		segments: &[String],
		excluded: &[ElementId],
		stack: &mut Stack,
	) -> Option<Value> {
		self.declaration_in_block(file, block, segments, excluded, stack)
			.flatten()
	}

	/// `Some` once a declaration of `segments` is found, with the value of
	/// that declaration. The last declaration shadows earlier ones even when
	/// it does not resolve.
	fn declaration_in_block(
		&self,
		file: FileId,
		block: ElementId,
		segments: &[String],
		excluded: &[ElementId],
		stack: &mut Stack,
	) -> Option<Option<Value>> {
		let tree = self.tree(file);

		for child in tree.children(block).iter().rev() {
			if excluded.contains(child) {
				continue;
			}

			let element = tree.get(*child);
			if matches!(element.kind, ElementKind::Raw(_)) {
				continue;
			}

			let names = split_path(&element.name);
			if names.is_empty() || names.len() > segments.len() || names[..] != segments[..names.len()] {
				continue;
			}

			let rest = &segments[names.len()..];
			if element.kind.is_block() {
				if rest.is_empty() {
					continue;
				}
				if let Some(declared) = self.declaration_in_block(file, *child, rest, excluded, stack) {
					return Some(declared);
				}
				continue;
			}

			return Some(
				self.eval(file, *child, stack)
					.and_then(|value| descend(value, rest)),
			);
		}

		None
	}

	fn special(&self, node: NodeId, segments: &[String], stack: &mut Stack) -> Option<Value> {
		let graph = self.session.graph();
		let project = graph.node(node);
		let [first, rest @ ..] = segments else {
			return None;
		};

		if rest.is_empty() {
			match first.as_str() {
				"rootDir" | "settingsDir" => return Some(path_value(graph.root_dir())),
				"projectDir" => return Some(path_value(&project.dir)),
				"buildDir" => return Some(path_value(&project.dir.join("build"))),
				"buildFile" => return Some(path_value(&project.build_file)),
				"name" => return Some(Value::String(project.name.clone())),
				"path" => return Some(Value::String(project.path.clone())),
				_ => {}
			}
		}

		if let Some(target) = self.project_switch(node, first) {
			let target = target?;
			if rest.is_empty() {
				return None;
			}
			return self.project_property(target, rest, stack);
		}

		self.catalogs
			.iter()
			.find(|catalog| &catalog.name == first)
			.and_then(|catalog| catalog.lookup(rest))
	}

	/// `Some(target)` when `segment` switches to another project. The target
	/// is `None` for a project that does not exist.
	fn project_switch(&self, node: NodeId, segment: &str) -> Option<Option<NodeId>> {
		let graph = self.session.graph();
		match segment {
			"rootProject" => Some(Some(graph.root())),
			"parent" => Some(graph.parent(node)),
			"project" => Some(Some(node)),
			_ => {
				match call_segment(segment) {
					Some(("project", path)) => Some(graph.resolve_path(node, &path)),
					_ => None,
				}
			}
		}
	}

	fn project_property(&self, target: NodeId, segments: &[String], stack: &mut Stack) -> Option<Value> {
		if let Some(file) = self.session.graph().node(target).file() {
			let root = self.tree(file).root();
			if let Some(value) = self.lookup_in_block(file, root, segments, &[], stack) {
				return Some(value);
			}
			if let Some(value) = self.ext_lookup(file, &[root], segments, &[], stack) {
				return Some(value);
			}
		}

		self.special(target, segments, stack)
			.or_else(|| self.ancestor_ext(target, segments, stack))
			.or_else(|| self.inherited(target, segments, stack))
	}

	fn ext_lookup(
		&self,
		file: FileId,
		scopes: &[ElementId],
		segments: &[String],
		excluded: &[ElementId],
		stack: &mut Stack,
	) -> Option<Value> {
		let ext_path = prefixed(&["ext"], segments);
		for scope in scopes {
			if let Some(declared) = self.declaration_in_block(file, *scope, &ext_path, excluded, stack) {
				return declared;
			}
		}

		let root = self.tree(file).root();
		let buildscript_path = prefixed(&["buildscript", "ext"], segments);
		self.lookup_in_block(file, root, &buildscript_path, excluded, stack)
	}

	/// Extra properties are visible to every project below the one declaring
	/// them.
	fn ancestor_ext(&self, node: NodeId, segments: &[String], stack: &mut Stack) -> Option<Value> {
		let graph = self.session.graph();
		graph.ancestors(node).find_map(|ancestor| {
			let file = graph.node(ancestor).file()?;
			let root = self.tree(file).root();
			self.ext_lookup(file, &[root], segments, &[], stack)
		})
	}

	fn inherited(&self, node: NodeId, segments: &[String], stack: &mut Stack) -> Option<Value> {
		let graph = self.session.graph();

		let from_subprojects = graph.ancestors(node).find_map(|ancestor| {
			let file = graph.node(ancestor).file()?;
			self.configuration_block(file, "subprojects", segments, stack)
		});
		if from_subprojects.is_some() {
			return from_subprojects;
		}

		std::iter::once(node)
			.chain(graph.ancestors(node))
			.find_map(|project| {
				let file = graph.node(project).file()?;
				self.configuration_block(file, "allprojects", segments, stack)
			})
	}

	fn configuration_block(
		&self,
		file: FileId,
		block: &str,
		segments: &[String],
		stack: &mut Stack,
	) -> Option<Value> {
		let root = self.tree(file).root();
		self.lookup_in_block(file, root, &prefixed(&[block], segments), &[], stack)
			.or_else(|| {
				self.lookup_in_block(file, root, &prefixed(&[block, "ext"], segments), &[], stack)
			})
	}

	fn eval(&self, file: FileId, id: ElementId, stack: &mut Stack) -> Option<Value> {
		let tree = self.tree(file);
		let element = tree.get(id);

		match &element.kind {
			ElementKind::Literal(literal @ Literal::String { value, .. }) => {
				if literal.is_interpolated() {
					Some(Value::String(self.interpolate(file, id, value, stack)))
				} else {
					Some(Value::from(literal))
				}
			}
			ElementKind::Literal(literal) => Some(Value::from(literal)),
			ElementKind::Reference(name) => self.resolve_name(file, id, name, stack),
			ElementKind::List => {
				Some(Value::List(
					element
						.children
						.iter()
						.filter_map(|child| self.eval(file, *child, stack))
						.collect(),
				))
			}
			ElementKind::Map { .. } | ElementKind::Infix => {
				Some(Value::Map(
					element
						.children
						.iter()
						.filter_map(|child| {
							self.eval(file, *child, stack)
								.map(|value| (tree.get(*child).name.clone(), value))
						})
						.collect(),
				))
			}
			ElementKind::MethodCall { method, .. } => self.call_value(file, id, method, stack),
			ElementKind::Block | ElementKind::Raw(_) => None,
		}
	}

	fn call_value(&self, file: FileId, id: ElementId, method: &str, stack: &mut Stack) -> Option<Value> {
		let arguments = &self.tree(file).get(id).children;
		let (qualifier, name) = match method.strip_prefix("new ") {
			Some(type_name) => (None, type_name.rsplit('.').next().unwrap_or(type_name)),
			None => {
				match method.rsplit_once('.') {
					Some((qualifier, name)) => (Some(qualifier), name),
					None => (None, method),
				}
			}
		};

		match name {
			// `file('x')` is relative to the project directory.
			"file" if method.starts_with("new ") => None,
			"file" => {
				let [argument] = arguments.as_slice() else {
					return None;
				};
				let relative = self.eval(file, *argument, stack)?.to::<String>()?;
				let mut node = self.context(file);
				for segment in qualifier.map(split_path).unwrap_or_default() {
					node = self.project_switch(node, &segment)??;
				}
				let base = &self.session.graph().node(node).dir;
				Some(path_value(&base.join(relative)))
			}
			"File" if method.starts_with("new ") => {
				let parts = arguments
					.iter()
					.map(|argument| self.eval(file, *argument, stack)?.to::<String>())
					.collect::<Option<Vec<_>>>()?;
				let path = parts
					.iter()
					.fold(PathBuf::new(), |path, part| path.join(part));
				Some(path_value(&path))
			}
			"uri" => {
				let argument = arguments.first()?;
				self.eval(file, *argument, stack)
			}
			"project" => None,
			_ => {
				match arguments.as_slice() {
					[] => None,
					[argument] => self.eval(file, *argument, stack),
					_ => {
						Some(Value::List(
							arguments
								.iter()
								.filter_map(|argument| self.eval(file, *argument, stack))
								.collect(),
						))
					}
				}
			}
		}
	}

	/// Expand `$name` and `${expr}` injections. Injections that do not
	/// resolve are kept as written.
	fn interpolate(&self, file: FileId, id: ElementId, text: &str, stack: &mut Stack) -> String {
		let mut result = String::with_capacity(text.len());
		let mut rest = text;

		while let Some(index) = rest.find('$') {
			result.push_str(&rest[..index]);
			let after = &rest[index + 1..];

			let (expression, consumed) = match after.strip_prefix('{') {
				Some(inner) => {
					match inner.find('}') {
						Some(end) => (inner[..end].trim(), end + 2),
						None => ("", 0),
					}
				}
				None => {
					let chain = identifier_chain(after);
					(chain, chain.len())
				}
			};

			if expression.is_empty() {
				result.push('$');
				rest = after;
				continue;
			}

			let raw = &rest[index..=index + consumed];
			match self.resolve_name(file, id, expression, stack) {
				Some(value) => result.push_str(&value.to_string()),
				None => result.push_str(raw),
			}
			rest = &rest[index + 1 + consumed..];
		}

		result.push_str(rest);
		result
	}
}

/// The blocks enclosing `from`, nearest first, ending with the file root.
fn block_scopes(tree: &DslTree, from: ElementId) -> Vec<ElementId> {
	std::iter::once(from)
		.chain(tree.ancestors(from))
		.filter(|id| tree.get(*id).kind.is_block())
		.collect()
}

/// `from` and the elements containing it up to its statement. These are never
/// lookup candidates, so `version = version` does not find itself.
fn statement_chain(tree: &DslTree, from: ElementId) -> Vec<ElementId> {
	std::iter::once(from)
		.chain(tree.ancestors(from))
		.take_while(|id| !tree.get(*id).kind.is_block() || *id == from)
		.collect()
}

fn prefixed(prefix: &[&str], segments: &[String]) -> Vec<String> {
	prefix
		.iter()
		.map(ToString::to_string)
		.chain(segments.iter().cloned())
		.collect()
}

/// Walk into map entries, e.g. `versions.kotlin` after `ext.versions = [...]`.
fn descend(value: Value, path: &[String]) -> Option<Value> {
	path.iter()
		.try_fold(value, |current, key| current.get(key).cloned())
}

fn path_value(path: &Path) -> Value {
	Value::String(path.display().to_string())
}

/// `name` or `a.b.c` at the start of `text`.
fn identifier_chain(text: &str) -> &str {
	let bytes = text.as_bytes();
	let is_start = |byte: u8| byte.is_ascii_alphabetic() || byte == b'_';
	let is_part = |byte: u8| byte.is_ascii_alphanumeric() || byte == b'_';

	if !bytes.first().copied().is_some_and(is_start) {
		return "";
	}

	let mut end = 0;
	while end < bytes.len() {
		if is_part(bytes[end]) {
			end += 1;
		} else if bytes[end] == b'.' && bytes.get(end + 1).copied().is_some_and(is_start) {
			end += 1;
		} else {
			break;
		}
	}

	&text[..end]
}
