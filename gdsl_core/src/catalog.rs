use std::collections::BTreeMap;
use std::path::PathBuf;

use toml::Table;
use toml::Value as TomlValue;

use crate::DslError;
use crate::DslResult;
use crate::DslTree;
use crate::Value;
use crate::element::ElementId;
use crate::element::ElementKind;

/// A parsed `*.versions.toml` file, exposed to build scripts under `name`.
///
/// Aliases are normalized the way Gradle generates accessors: `core-ktx`,
/// `core_ktx` and `core.ktx` all become `core.ktx`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionCatalog {
	pub name: String,
	pub path: PathBuf,
	pub versions: BTreeMap<String, String>,
	/// `group:name[:version]` coordinates.
	pub libraries: BTreeMap<String, String>,
	/// Plugin id and optional version.
	pub plugins: BTreeMap<String, (String, Option<String>)>,
	/// Library aliases per bundle.
	pub bundles: BTreeMap<String, Vec<String>>,
}

impl VersionCatalog {
	pub fn parse(name: impl Into<String>, path: impl Into<PathBuf>, text: &str) -> DslResult<Self> {
		let path = path.into();
		let table: Table = toml::from_str(text).map_err(|e| {
			DslError::CatalogParse {
				path: path.clone(),
				reason: e.to_string(),
			}
		})?;

		let mut catalog = Self {
			name: name.into(),
			path,
			..Self::default()
		};

		if let Some(versions) = table.get("versions").and_then(TomlValue::as_table) {
			for (alias, value) in versions {
				if let Some(version) = plain_version(value) {
					catalog.versions.insert(normalize_alias(alias), version);
				}
			}
		}

		if let Some(libraries) = table.get("libraries").and_then(TomlValue::as_table) {
			for (alias, value) in libraries {
				if let Some(coordinate) = catalog.library_coordinate(value) {
					catalog.libraries.insert(normalize_alias(alias), coordinate);
				}
			}
		}

		if let Some(plugins) = table.get("plugins").and_then(TomlValue::as_table) {
			for (alias, value) in plugins {
				if let Some(plugin) = catalog.plugin(value) {
					catalog.plugins.insert(normalize_alias(alias), plugin);
				}
			}
		}

		if let Some(bundles) = table.get("bundles").and_then(TomlValue::as_table) {
			for (alias, value) in bundles {
				let members = value
					.as_array()
					.map(|items| {
						items
							.iter()
							.filter_map(TomlValue::as_str)
							.map(normalize_alias)
							.collect()
					})
					.unwrap_or_default();
				catalog.bundles.insert(normalize_alias(alias), members);
			}
		}

		Ok(catalog)
	}

	/// Resolve an accessor path below the catalog name, e.g. `versions.kotlin`
	/// or `androidx.core.ktx`.
	pub fn lookup(&self, segments: &[String]) -> Option<Value> {
		match segments {
			[] => None,
			[kind, rest @ ..] if kind == "versions" => {
				self.versions.get(&rest.join(".")).cloned().map(Value::String)
			}
			[kind, rest @ ..] if kind == "plugins" => {
				let (id, version) = self.plugins.get(&rest.join("."))?;
				Some(Value::String(match version {
					Some(version) => format!("{id}:{version}"),
					None => id.clone(),
				}))
			}
			[kind, rest @ ..] if kind == "bundles" => {
				let members = self.bundles.get(&rest.join("."))?;
				Some(Value::List(
					members
						.iter()
						.filter_map(|alias| self.libraries.get(alias).cloned())
						.map(Value::String)
						.collect(),
				))
			}
			_ => self.libraries.get(&segments.join(".")).cloned().map(Value::String),
		}
	}

	fn version(&self, value: &TomlValue) -> Option<String> {
		if let Some(reference) = value.get("ref").and_then(TomlValue::as_str) {
			return self.versions.get(&normalize_alias(reference)).cloned();
		}
		plain_version(value)
	}

	fn library_coordinate(&self, value: &TomlValue) -> Option<String> {
		if let Some(notation) = value.as_str() {
			return Some(notation.to_string());
		}

		let module = match value.get("module").and_then(TomlValue::as_str) {
			Some(module) => module.to_string(),
			None => {
				let group = value.get("group").and_then(TomlValue::as_str)?;
				let name = value.get("name").and_then(TomlValue::as_str)?;
				format!("{group}:{name}")
			}
		};

		match value.get("version").and_then(|version| self.version(version)) {
			Some(version) => Some(format!("{module}:{version}")),
			None => Some(module),
		}
	}

	fn plugin(&self, value: &TomlValue) -> Option<(String, Option<String>)> {
		if let Some(notation) = value.as_str() {
			return Some(match notation.split_once(':') {
				Some((id, version)) => (id.to_string(), Some(version.to_string())),
				None => (notation.to_string(), None),
			});
		}

		let id = value.get("id").and_then(TomlValue::as_str)?.to_string();
		let version = value.get("version").and_then(|version| self.version(version));
		Some((id, version))
	}
}

/// `"1.0"`, `{ strictly = "1.0" }`, `{ require = "1.0" }` or
/// `{ prefer = "1.0" }`.
fn plain_version(value: &TomlValue) -> Option<String> {
	if let Some(version) = value.as_str() {
		return Some(version.to_string());
	}

	["strictly", "require", "prefer"]
		.iter()
		.find_map(|key| value.get(*key).and_then(TomlValue::as_str))
		.map(ToString::to_string)
}

pub fn normalize_alias(alias: &str) -> String {
	alias.replace(['-', '_'], ".")
}

/// Catalog blocks declared in a settings tree under
/// `dependencyResolutionManagement { versionCatalogs { ... } }`, in
/// declaration order.
pub fn declared_catalogs(tree: &DslTree) -> Vec<ElementId> {
	let root = tree.root();
	tree.children_named(root, "dependencyResolutionManagement")
		.into_iter()
		.flat_map(|management| tree.children_named(management, "versionCatalogs"))
		.flat_map(|catalogs| tree.children(catalogs).to_vec())
		.filter(|catalog| tree.get(*catalog).kind.is_block())
		.collect()
}

/// The element holding the file a catalog is read from, `from(files('x'))`.
pub fn catalog_source_element(tree: &DslTree, catalog: ElementId) -> Option<ElementId> {
	let from = tree.child_named(catalog, "from")?;
	let argument = *tree.children(from).first()?;
	match &tree.get(argument).kind {
		ElementKind::MethodCall { method, .. } if method == "files" || method == "file" => {
			tree.children(argument).first().copied()
		}
		_ => Some(argument),
	}
}

/// The relative path a catalog is read from.
pub fn catalog_source(tree: &DslTree, catalog: ElementId) -> Option<String> {
	let element = catalog_source_element(tree, catalog)?;
	Value::from_element(tree, element)?.to::<String>()
}
