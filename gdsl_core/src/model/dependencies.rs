use std::fmt::Display;

use serde::Serialize;

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

use super::detach;
use super::ensure_block;
use super::find_blocks;
use super::new_application;

/// `group:name:version:classifier@extension`. Only `name` is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ArtifactCoordinate {
	pub group: Option<String>,
	pub name: String,
	pub version: Option<String>,
	pub classifier: Option<String>,
	pub extension: Option<String>,
}

impl ArtifactCoordinate {
	/// Parse compact notation. Returns `None` for an empty name.
	pub fn parse(notation: &str) -> Option<Self> {
		let (coordinate, extension) = match notation.trim().split_once('@') {
			Some((coordinate, extension)) => (coordinate, Some(extension.to_string())),
			None => (notation.trim(), None),
		};

		let parts: Vec<&str> = coordinate.split(':').collect();
		let part = |index: usize| {
			parts
				.get(index)
				.filter(|part| !part.is_empty())
				.map(ToString::to_string)
		};

		let coordinate = match parts.len() {
			1 => {
				Self {
					name: parts[0].to_string(),
					..Self::default()
				}
			}
			2..=4 => {
				Self {
					group: part(0),
					name: parts[1].to_string(),
					version: part(2),
					classifier: part(3),
					extension: None,
				}
			}
			_ => return None,
		};

		(!coordinate.name.is_empty()).then_some(Self {
			extension,
			..coordinate
		})
	}

	/// Read `group: 'g', name: 'n', version: 'v'` named arguments.
	pub fn from_map(value: &Value) -> Option<Self> {
		let text = |key: &str| value.get(key).and_then(|item| item.to::<String>());
		Some(Self {
			group: text("group"),
			name: text("name")?,
			version: text("version"),
			classifier: text("classifier"),
			extension: text("ext"),
		})
	}

	/// Whether `other` names the same module, ignoring versions.
	pub fn same_module(&self, other: &Self) -> bool {
		self.group == other.group && self.name == other.name
	}
}

impl Display for ArtifactCoordinate {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if let Some(group) = &self.group {
			write!(f, "{group}:")?;
		}
		write!(f, "{}", self.name)?;
		if let Some(version) = &self.version {
			write!(f, ":{version}")?;
		}
		if let Some(classifier) = &self.classifier {
			write!(f, ":{classifier}")?;
		}
		if let Some(extension) = &self.extension {
			write!(f, "@{extension}")?;
		}
		Ok(())
	}
}

/// A `dependencies { }` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependenciesModel {
	file: FileId,
	path: Vec<String>,
}

impl DependenciesModel {
	pub(crate) fn new(file: FileId, scope: &[&str]) -> Self {
		let mut path: Vec<String> = scope.iter().map(ToString::to_string).collect();
		path.push("dependencies".to_string());
		Self { file, path }
	}

	/// External dependencies in declaration order, one per argument.
	/// `implementation 'a:b:1', 'c:d:2'` yields two artifacts.
	pub fn artifacts(&self, project: &Project) -> Vec<ArtifactDependencyModel> {
		self.arguments(project)
			.into_iter()
			.filter(|(_, argument)| {
				!matches!(
					dependency_argument(project.file(self.file).tree(), *argument),
					Argument::Module(_) | Argument::Other
				)
			})
			.map(|(statement, argument)| {
				ArtifactDependencyModel {
					file: self.file,
					statement,
					argument,
				}
			})
			.collect()
	}

	/// `project(':path')` dependencies in declaration order.
	pub fn modules(&self, project: &Project) -> Vec<ModuleDependencyModel> {
		self.arguments(project)
			.into_iter()
			.filter_map(|(statement, argument)| {
				match dependency_argument(project.file(self.file).tree(), argument) {
					Argument::Module(call) => {
						Some(ModuleDependencyModel {
							file: self.file,
							statement,
							call,
						})
					}
					_ => None,
				}
			})
			.collect()
	}

	/// Add `configuration 'notation'`.
	pub fn add_artifact(&self, project: &mut Project, configuration: &str, notation: &str) -> DslResult<()> {
		if ArtifactCoordinate::parse(notation).is_none() {
			return Err(DslError::UnwritableEdit(format!(
				"`{notation}` is not a dependency notation"
			)));
		}

		project.edit(self.file, |tree| {
			let root = tree.root();
			let block = ensure_block(tree, root, &self.path)?;
			let statement = new_application(tree, configuration, &Value::string(notation))?;
			tree.add_child(block, statement).map(|_| ())
		})
	}

	/// Add `configuration project(':path')`.
	pub fn add_module(&self, project: &mut Project, configuration: &str, path: &str) -> DslResult<()> {
		let path = crate::hierarchy::normalize_project_path(path);

		project.edit(self.file, |tree| {
			let root = tree.root();
			let block = ensure_block(tree, root, &self.path)?;
			let statement = tree.alloc(Element::new(
				configuration,
				ElementKind::MethodCall {
					method: configuration.to_string(),
					parens: false,
				},
				Syntax::Application,
			));
			let call = tree.alloc(Element::new(
				"",
				ElementKind::MethodCall {
					method: "project".to_string(),
					parens: true,
				},
				Syntax::Argument,
			));
			let argument = tree.alloc_value("", Syntax::Argument, &Value::string(path.as_str()));
			tree.add_child(call, argument)?;
			tree.add_child(statement, call)?;
			tree.add_child(block, statement).map(|_| ())
		})
	}

	/// Remove every artifact of `configuration` naming the same module as
	/// `notation`. Returns whether anything was removed.
	pub fn remove(&self, project: &mut Project, configuration: &str, notation: &str) -> DslResult<bool> {
		let Some(target) = ArtifactCoordinate::parse(notation) else {
			return Ok(false);
		};

		let matching: Vec<ArtifactDependencyModel> = self
			.artifacts(project)
			.into_iter()
			.filter(|artifact| artifact.configuration(project) == configuration)
			.filter(|artifact| {
				artifact
					.coordinate(project)
					.is_some_and(|coordinate| coordinate.same_module(&target))
			})
			.collect();

		if matching.is_empty() {
			return Ok(false);
		}

		project.edit(self.file, |tree| {
			for artifact in matching {
				artifact.detach(tree)?;
			}
			Ok(true)
		})
	}

	/// Every `(statement, argument)` pair of the merged blocks.
	fn arguments(&self, project: &Project) -> Vec<(ElementId, ElementId)> {
		let tree = project.file(self.file).tree();
		find_blocks(tree, tree.root(), &self.path)
			.into_iter()
			.flat_map(|block| tree.children(block).to_vec())
			.filter(|statement| matches!(tree.get(*statement).kind, ElementKind::MethodCall { .. }))
			.flat_map(|statement| {
				tree.children(statement)
					.iter()
					.map(move |argument| (statement, *argument))
					.collect::<Vec<_>>()
			})
			.collect()
	}
}

enum Argument {
	/// `'g:n:v'` or `"g:n:$v"`
	Notation,
	/// `group: 'g', name: 'n'`
	Map,
	/// `libs.x` or `deps.x`
	Reference,
	/// The `project(':x')` call.
	Module(ElementId),
	Other,
}

fn dependency_argument(tree: &DslTree, argument: ElementId) -> Argument {
	let element = tree.get(argument);
	match &element.kind {
		ElementKind::Literal(Literal::String { .. }) => Argument::Notation,
		ElementKind::Map { .. } => Argument::Map,
		ElementKind::Reference(_) => Argument::Reference,
		ElementKind::MethodCall { method, .. } if method == "project" => Argument::Module(argument),
		// `platform('g:n:v')` wraps a notation.
		ElementKind::MethodCall { method, .. } if method == "platform" || method == "enforcedPlatform" => {
			match element.children.as_slice() {
				[inner] => dependency_argument(tree, *inner),
				_ => Argument::Other,
			}
		}
		_ => Argument::Other,
	}
}

/// One external dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactDependencyModel {
	file: FileId,
	statement: ElementId,
	argument: ElementId,
}

impl ArtifactDependencyModel {
	/// The configuration name, e.g. `implementation` or `classpath`.
	pub fn configuration(&self, project: &Project) -> String {
		project.file(self.file).tree().get(self.statement).name.clone()
	}

	/// The resolved coordinate. Catalog and `ext` references are followed.
	pub fn coordinate(&self, project: &Project) -> Option<ArtifactCoordinate> {
		match project.resolver().value_of(self.file, self.argument)? {
			Value::String(notation) => ArtifactCoordinate::parse(&notation),
			map @ Value::Map(_) => ArtifactCoordinate::from_map(&map),
			_ => None,
		}
	}

	/// The dependency in compact notation.
	pub fn notation(&self, project: &Project) -> Option<String> {
		self.coordinate(project).map(|coordinate| coordinate.to_string())
	}

	pub fn version(&self, project: &Project) -> Option<String> {
		self.coordinate(project)?.version
	}

	/// The text of the reference the dependency is declared through.
	pub fn reference_text(&self, project: &Project) -> Option<String> {
		match &project.file(self.file).tree().get(self.argument).kind {
			ElementKind::Reference(text) => Some(text.clone()),
			_ => None,
		}
	}

	/// Change the version in place. Dependencies declared through a
	/// reference or an interpolated string cannot be changed here.
	pub fn set_version(&self, project: &mut Project, version: &str) -> DslResult<()> {
		let tree = project.file(self.file).tree();
		let element = tree.get(self.argument);

		match &element.kind {
			ElementKind::Literal(literal @ Literal::String { value, .. }) if !literal.is_interpolated() => {
				let Some(mut coordinate) = ArtifactCoordinate::parse(value) else {
					return Err(DslError::UnwritableEdit(format!(
						"`{value}` is not a dependency notation"
					)));
				};
				coordinate.version = Some(version.to_string());
				let notation = Value::String(coordinate.to_string());
				project.edit(self.file, |tree| tree.set_value(self.argument, &notation))
			}
			ElementKind::Map { .. } => {
				let existing = tree.child_named(self.argument, "version");
				let version = Value::string(version);
				project.edit(self.file, |tree| {
					match existing {
						Some(child) => tree.set_value(child, &version),
						None => {
							let child = tree.alloc_value("version", Syntax::Entry, &version);
							tree.add_child(self.argument, child).map(|_| ())
						}
					}
				})
			}
			_ => {
				Err(DslError::UnwritableEdit(format!(
					"the version of `{}` is not written in this file",
					element.name
				)))
			}
		}
	}

	pub fn remove(&self, project: &mut Project) -> DslResult<()> {
		project.edit(self.file, |tree| self.detach(tree))
	}

	/// Remove the argument, or the whole statement when it is the only one.
	fn detach(&self, tree: &mut DslTree) -> DslResult<()> {
		if tree.children(self.statement).len() > 1 {
			tree.remove_child(self.statement, self.argument)
		} else {
			detach(tree, self.statement)
		}
	}
}

/// A `project(':path')` dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleDependencyModel {
	file: FileId,
	statement: ElementId,
	call: ElementId,
}

impl ModuleDependencyModel {
	pub fn configuration(&self, project: &Project) -> String {
		project.file(self.file).tree().get(self.statement).name.clone()
	}

	/// The project path, normalized to a leading `:`.
	pub fn path(&self, project: &Project) -> Option<String> {
		let tree = project.file(self.file).tree();
		let argument = *tree.children(self.call).first()?;
		let path = project.resolver().value_of(self.file, argument)?.to::<String>()?;
		Some(crate::hierarchy::normalize_project_path(&path))
	}

	pub fn remove(&self, project: &mut Project) -> DslResult<()> {
		project.edit(self.file, |tree| detach(tree, self.statement))
	}
}
