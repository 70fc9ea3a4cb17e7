use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::DslTree;
use crate::ParseDiagnostic;
use crate::hierarchy::NodeId;
use crate::parser::parse_with_diagnostics;

/// Index of a file inside a [`Project`](crate::Project). Ids are never
/// reused while the project is alive.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FileId(pub(crate) usize);

impl FileId {
	pub fn index(self) -> usize {
		self.0
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
	/// A project build script such as `build.gradle`.
	Build,
	/// The settings script declaring the project hierarchy.
	Settings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
	/// The tree matches the persisted text.
	#[default]
	Clean,
	/// The tree has edits that are not yet written back.
	Dirty,
}

/// One parsed build or settings script.
#[derive(Debug, Clone)]
pub struct FileModel {
	pub(crate) path: PathBuf,
	pub(crate) kind: FileKind,
	/// The last text read from or written to the text source.
	pub(crate) text: String,
	pub(crate) tree: DslTree,
	pub(crate) diagnostics: Vec<ParseDiagnostic>,
	pub(crate) state: FileState,
	pub(crate) node: Option<NodeId>,
}

impl FileModel {
	pub fn parse(path: impl Into<PathBuf>, kind: FileKind, text: impl Into<String>) -> Self {
		let text = text.into();
		let (tree, diagnostics) = parse_with_diagnostics(&text);

		Self {
			path: path.into(),
			kind,
			text,
			tree,
			diagnostics,
			state: FileState::Clean,
			node: None,
		}
	}

	/// Replace the text and rebuild the tree. Pending edits are discarded.
	pub fn reload(&mut self, text: impl Into<String>) {
		self.text = text.into();
		let (tree, diagnostics) = parse_with_diagnostics(&self.text);
		self.tree = tree;
		self.diagnostics = diagnostics;
		self.state = FileState::Clean;
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn kind(&self) -> FileKind {
		self.kind
	}

	pub fn text(&self) -> &str {
		&self.text
	}

	pub fn tree(&self) -> &DslTree {
		&self.tree
	}

	/// Mutable access to the tree. The file is considered dirty from here on.
	pub(crate) fn tree_mut(&mut self) -> &mut DslTree {
		self.state = FileState::Dirty;
		&mut self.tree
	}

	pub fn diagnostics(&self) -> &[ParseDiagnostic] {
		&self.diagnostics
	}

	pub fn state(&self) -> FileState {
		self.state
	}

	pub fn is_modified(&self) -> bool {
		self.state == FileState::Dirty
	}

	/// The project this file is the build script of. `None` for the
	/// settings file.
	pub fn node(&self) -> Option<NodeId> {
		self.node
	}
}
