use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::DslError;
use crate::DslResult;
use crate::DslTree;
use crate::FileId;
use crate::FileKind;
use crate::FileModel;
use crate::FileState;
use crate::FsTextSource;
use crate::GdslConfig;
use crate::ParseDiagnostic;
use crate::ProjectGraph;
use crate::Resolver;
use crate::Session;
use crate::SettingsDeclarations;
use crate::TextPatch;
use crate::TextSource;
use crate::Value;
use crate::VersionCatalog;
use crate::catalog::catalog_source;
use crate::catalog::declared_catalogs;
use crate::element::ElementId;
use crate::hierarchy::NodeId;
use crate::model::GradleBuildModel;
use crate::model::GradleSettingsModel;
use crate::writer::compute_patch;
use crate::writer::has_pending_changes;

/// The kind of diagnostic produced while opening a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DiagnosticKind {
	/// A block was opened but never closed.
	UnclosedBlock { name: String },
	/// A `}` without a matching `{`.
	UnexpectedClosingBrace,
	/// A statement kept verbatim because the model does not understand it.
	UnsupportedStatement { text: String },
	/// The settings file declares a project that cannot be found.
	MalformedHierarchy { path: String, reason: String },
	/// A version catalog could not be read.
	CatalogParse { reason: String },
}

/// A diagnostic produced while opening or reparsing a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDiagnostic {
	/// The file where the diagnostic was found.
	pub file: PathBuf,
	/// The kind of diagnostic.
	pub kind: DiagnosticKind,
	/// 1-indexed line number.
	pub line: usize,
	/// 1-indexed column number.
	pub column: usize,
}

impl ProjectDiagnostic {
	fn from_parse(file: &Path, diagnostic: &ParseDiagnostic) -> Self {
		let kind = match diagnostic {
			ParseDiagnostic::UnclosedBlock { name, .. } => {
				DiagnosticKind::UnclosedBlock { name: name.clone() }
			}
			ParseDiagnostic::UnexpectedClosingBrace { .. } => DiagnosticKind::UnexpectedClosingBrace,
			ParseDiagnostic::UnsupportedStatement { text, .. } => {
				DiagnosticKind::UnsupportedStatement { text: text.clone() }
			}
		};

		Self {
			file: file.to_path_buf(),
			kind,
			line: diagnostic.line(),
			column: diagnostic.column(),
		}
	}

	/// Errors make part of the project unusable. Everything else is kept
	/// verbatim and only reported.
	pub fn is_error(&self) -> bool {
		!matches!(self.kind, DiagnosticKind::UnsupportedStatement { .. })
	}

	/// Human-readable message for this diagnostic.
	pub fn message(&self) -> String {
		match &self.kind {
			DiagnosticKind::UnclosedBlock { name } => format!("block `{name}` is never closed"),
			DiagnosticKind::UnexpectedClosingBrace => "unexpected `}`".to_string(),
			DiagnosticKind::UnsupportedStatement { text } => {
				let first_line = text.lines().next().unwrap_or_default();
				format!("statement is kept verbatim: `{first_line}`")
			}
			DiagnosticKind::MalformedHierarchy { path, reason } => {
				format!("project `{path}`: {reason}")
			}
			DiagnosticKind::CatalogParse { reason } => {
				format!("version catalog could not be read: {reason}")
			}
		}
	}
}

/// An open multi-project build: every build script, the settings script, the
/// project graph and the resolution session.
///
/// Reads take `&Project`, edits take `&mut Project`. Edits stay in memory
/// until [`Project::apply_changes`] writes them through the [`TextSource`].
pub struct Project {
	root: PathBuf,
	source: Box<dyn TextSource>,
	config: GdslConfig,
	/// Append-only so that [`FileId`]s stay valid.
	files: Vec<FileModel>,
	settings: FileId,
	session: Session,
	catalogs: Vec<VersionCatalog>,
	diagnostics: Vec<ProjectDiagnostic>,
}

impl std::fmt::Debug for Project {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Project")
			.field("root", &self.root)
			.field("config", &self.config)
			.field("files", &self.files.len())
			.field("projects", &self.session.graph().len())
			.finish_non_exhaustive()
	}
}

impl Project {
	/// Open the project at `root` on the file system.
	pub fn open(root: impl AsRef<Path>) -> DslResult<Self> {
		Self::open_with(root, FsTextSource)
	}

	/// Open the project at `root`, reading text through `source`. A
	/// `gdsl.toml` found through the source configures the project.
	pub fn open_with(root: impl AsRef<Path>, source: impl TextSource + 'static) -> DslResult<Self> {
		let root = root.as_ref();
		let config = GdslConfig::load(root, &source)?.unwrap_or_default();
		Self::open_with_config(root, source, config)
	}

	pub fn open_with_config(
		root: impl AsRef<Path>,
		source: impl TextSource + 'static,
		config: GdslConfig,
	) -> DslResult<Self> {
		let root = root.as_ref().to_path_buf();
		let settings_path = config
			.files
			.settings
			.iter()
			.map(|name| root.join(name))
			.find(|path| source.exists(path))
			.or_else(|| config.files.settings.first().map(|name| root.join(name)))
			.unwrap_or_else(|| root.join("settings.gradle"));

		let settings_text = source.read_text(&settings_path)?;
		let settings = FileModel::parse(settings_path, FileKind::Settings, settings_text);
		let declarations = SettingsDeclarations::from_tree(settings.tree());
		let (graph, problems) = ProjectGraph::build(&declarations, &root, &source, &config.files.build);

		let mut project = Self {
			root,
			source: Box::new(source),
			config,
			files: vec![settings],
			settings: FileId(0),
			session: Session::new(graph),
			catalogs: Vec::new(),
			diagnostics: Vec::new(),
		};

		project.attach_build_files(false, &problems)?;
		info!(
			root = %project.root.display(),
			projects = project.graph().len(),
			"opened project"
		);

		Ok(project)
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn config(&self) -> &GdslConfig {
		&self.config
	}

	pub fn graph(&self) -> &ProjectGraph {
		self.session.graph()
	}

	pub fn session(&self) -> &Session {
		&self.session
	}

	pub fn catalogs(&self) -> &[VersionCatalog] {
		&self.catalogs
	}

	/// Problems found while opening or reparsing the project.
	pub fn diagnostics(&self) -> &[ProjectDiagnostic] {
		&self.diagnostics
	}

	pub fn file(&self, id: FileId) -> &FileModel {
		&self.files[id.0]
	}

	/// Files currently part of the project: the settings file and the build
	/// script of every project in the graph.
	pub fn files(&self) -> impl Iterator<Item = (FileId, &FileModel)> {
		self.files
			.iter()
			.enumerate()
			.map(|(index, file)| (FileId(index), file))
			.filter(|(id, file)| *id == self.settings || file.node().is_some())
	}

	pub fn settings_file(&self) -> FileId {
		self.settings
	}

	/// Find a project by its path.
	pub fn node(&self, path: &str) -> DslResult<NodeId> {
		self.graph()
			.find(path)
			.ok_or_else(|| DslError::UnknownProject(path.to_string()))
	}

	/// The build script model of the project at `path`.
	pub fn build_model(&self, path: &str) -> DslResult<GradleBuildModel> {
		let node = self.node(path)?;
		let file = self
			.graph()
			.node(node)
			.file()
			.ok_or_else(|| DslError::UnknownProject(path.to_string()))?;
		Ok(GradleBuildModel::new(file))
	}

	pub fn root_build_model(&self) -> DslResult<GradleBuildModel> {
		self.build_model(":")
	}

	pub fn settings_model(&self) -> GradleSettingsModel {
		GradleSettingsModel::new(self.settings)
	}

	pub fn resolver(&self) -> Resolver<'_> {
		Resolver::new(&self.files, &self.session, &self.catalogs)
	}

	/// Resolve `name` as seen from an element.
	pub fn resolve(&self, file: FileId, from: ElementId, name: &str) -> Option<Value> {
		self.resolver().resolve(file, from, name)
	}

	/// Whether any file has edits that are not yet written.
	pub fn is_modified(&self) -> bool {
		self.files().any(|(_, file)| file.is_modified())
	}

	/// Run `edit` against the tree of `file`. On success the file becomes
	/// dirty and all cached resolutions are dropped; on failure the tree is
	/// restored to what it was before.
	pub fn edit<R>(
		&mut self,
		file: FileId,
		edit: impl FnOnce(&mut DslTree) -> DslResult<R>,
	) -> DslResult<R> {
		let model = &mut self.files[file.0];
		let snapshot = model.tree.clone();
		let state = model.state;

		match edit(model.tree_mut()) {
			Ok(result) => {
				self.session.invalidate();
				Ok(result)
			}
			Err(error) => {
				model.tree = snapshot;
				model.state = state;
				Err(error)
			}
		}
	}

	/// The patch that [`Project::apply_file_changes`] would write.
	pub fn pending_patch(&self, file: FileId) -> DslResult<TextPatch> {
		compute_patch(self.file(file), &self.config.write.indent)
	}

	/// Write the edits of every dirty file. Files whose write fails stay
	/// dirty; the first error is returned after all other files were tried.
	/// Applying the settings file rebuilds the project graph.
	pub fn apply_changes(&mut self) -> DslResult<()> {
		let dirty: Vec<FileId> = self
			.files()
			.filter(|(_, file)| file.is_modified())
			.map(|(id, _)| id)
			.collect();

		let mut first_error = None;

		for id in dirty {
			if let Err(error) = self.apply_file_changes(id) {
				first_error.get_or_insert(error);
			}
		}

		first_error.map_or(Ok(()), Err)
	}

	/// Write the edits of one file and re-parse the persisted text.
	pub fn apply_file_changes(&mut self, file: FileId) -> DslResult<TextPatch> {
		if !self.files[file.0].is_modified() {
			return Ok(TextPatch::default());
		}

		let patch = self.pending_patch(file)?;
		let path = self.files[file.0].path.clone();

		if patch.is_empty() && !has_pending_changes(&self.files[file.0]) {
			let text = self.files[file.0].text.clone();
			self.files[file.0].reload(text);
			return Ok(patch);
		}

		if let Err(error) = self.source.write_text(&path, &patch) {
			warn!(path = %path.display(), %error, "write failed, file stays modified");
			return Err(error);
		}

		// The source applied the same patch to the same text.
		let text = patch.apply(&self.files[file.0].text);
		self.files[file.0].reload(text);
		self.session.invalidate();
		if file == self.settings {
			self.rebuild_graph(false)?;
		} else {
			self.refresh_diagnostics();
		}
		debug!(path = %path.display(), edits = patch.len(), "applied changes");

		Ok(patch)
	}

	/// Re-read every file from the text source, discarding all edits.
	pub fn reparse(&mut self) -> DslResult<()> {
		let settings_path = self.files[self.settings.0].path.clone();
		let text = self.source.read_text(&settings_path)?;
		self.files[self.settings.0].reload(text);
		self.rebuild_graph(true)
	}

	/// Re-read one file from the text source, discarding its edits.
	pub fn reparse_file(&mut self, file: FileId) -> DslResult<()> {
		if file == self.settings {
			return self.reparse();
		}

		let path = self.files[file.0].path.clone();
		let text = self.source.read_text(&path)?;
		self.files[file.0].reload(text);
		self.session.invalidate();
		self.refresh_diagnostics();
		Ok(())
	}

	/// Discard every pending edit by re-parsing the last persisted text.
	pub fn reset_state(&mut self) -> DslResult<()> {
		let mut settings_reset = false;

		for (index, file) in self.files.iter_mut().enumerate() {
			if file.state == FileState::Dirty {
				let text = std::mem::take(&mut file.text);
				file.reload(text);
				settings_reset |= FileId(index) == self.settings;
			}
		}

		self.session.invalidate();
		if settings_reset {
			self.rebuild_graph(false)?;
		}
		self.refresh_diagnostics();
		Ok(())
	}

	/// Rebuild the project graph from the settings tree. Build scripts of new
	/// projects are read; existing ones are only re-read when `reread`.
	fn rebuild_graph(&mut self, reread: bool) -> DslResult<()> {
		let declarations = SettingsDeclarations::from_tree(self.files[self.settings.0].tree());
		let (graph, problems) = ProjectGraph::build(
			&declarations,
			&self.root,
			self.source.as_ref(),
			&self.config.files.build,
		);

		self.session.replace_graph(graph);
		self.attach_build_files(reread, &problems)
	}

	/// Link every project of the current graph to its parsed build file,
	/// parsing build files that are not open yet.
	fn attach_build_files(&mut self, reread: bool, problems: &[DslError]) -> DslResult<()> {
		for file in &mut self.files {
			file.node = None;
		}

		let nodes: Vec<(NodeId, PathBuf)> = self
			.session
			.graph()
			.nodes()
			.map(|(id, node)| (id, node.build_file.clone()))
			.collect();

		for (node, build_file) in nodes {
			let existing = self
				.files
				.iter()
				.position(|file| file.kind == FileKind::Build && file.path == build_file);

			let id = match existing {
				Some(index) => {
					if reread {
						let text = self.source.read_text(&build_file)?;
						self.files[index].reload(text);
					}
					FileId(index)
				}
				None => {
					let text = self.source.read_text(&build_file)?;
					self.files
						.push(FileModel::parse(build_file, FileKind::Build, text));
					FileId(self.files.len() - 1)
				}
			};

			self.files[id.0].node = Some(node);
			self.session.graph_mut().node_mut(node).file = Some(id);
		}

		self.session.invalidate();
		self.load_catalogs(problems);
		Ok(())
	}

	fn load_catalogs(&mut self, problems: &[DslError]) {
		let mut catalogs = Vec::new();
		let mut failures = Vec::new();

		if self.config.catalogs.enabled {
			let settings = &self.files[self.settings.0];
			let tree = settings.tree();
			let mut declared: Vec<(String, PathBuf)> = declared_catalogs(tree)
				.into_iter()
				.filter_map(|catalog| {
					let path = catalog_source(tree, catalog)?;
					Some((tree.get(catalog).name.clone(), self.root.join(path)))
				})
				.collect();

			let default_name = &self.config.catalogs.default_name;
			if !declared.iter().any(|(name, _)| name == default_name) {
				let path = self.root.join(&self.config.catalogs.default_path);
				if self.source.exists(&path) {
					declared.push((default_name.clone(), path));
				}
			}

			for (name, path) in declared {
				let parsed = self
					.source
					.read_text(&path)
					.and_then(|text| VersionCatalog::parse(&name, &path, &text));
				match parsed {
					Ok(catalog) => catalogs.push(catalog),
					Err(error) => {
						warn!(catalog = %name, %error, "failed to load version catalog");
						failures.push((path, error.to_string()));
					}
				}
			}
		}

		self.catalogs = catalogs;
		self.diagnostics.clear();
		self.refresh_diagnostics();

		let settings_path = self.files[self.settings.0].path.clone();
		for problem in problems {
			if let DslError::MalformedHierarchy { path, reason } = problem {
				self.diagnostics.push(ProjectDiagnostic {
					file: settings_path.clone(),
					kind: DiagnosticKind::MalformedHierarchy {
						path: path.clone(),
						reason: reason.clone(),
					},
					line: 1,
					column: 1,
				});
			}
		}
		for (path, reason) in failures {
			self.diagnostics.push(ProjectDiagnostic {
				file: path,
				kind: DiagnosticKind::CatalogParse { reason },
				line: 1,
				column: 1,
			});
		}
	}

	/// Recompute parse diagnostics. Hierarchy and catalog problems are kept.
	fn refresh_diagnostics(&mut self) {
		let mut diagnostics: Vec<ProjectDiagnostic> = self
			.diagnostics
			.drain(..)
			.filter(|diagnostic| {
				matches!(
					diagnostic.kind,
					DiagnosticKind::MalformedHierarchy { .. } | DiagnosticKind::CatalogParse { .. }
				)
			})
			.collect();

		for (_, file) in self.files() {
			diagnostics.extend(
				file.diagnostics()
					.iter()
					.map(|diagnostic| ProjectDiagnostic::from_parse(file.path(), diagnostic)),
			);
		}

		self.diagnostics = diagnostics;
	}
}
