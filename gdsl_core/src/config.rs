use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::DslError;
use crate::DslResult;
use crate::TextSource;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["gdsl.toml", ".gdsl.toml", ".config/gdsl.toml"];

/// Configuration loaded from a `gdsl.toml` file.
///
/// ```toml
/// [files]
/// build = ["build.gradle"]
/// settings = ["settings.gradle"]
///
/// [catalogs]
/// enabled = true
/// default_name = "libs"
/// default_path = "gradle/libs.versions.toml"
///
/// [write]
/// indent = "    "
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GdslConfig {
	/// Names of the build and settings scripts to look for.
	#[serde(default)]
	pub files: FilesConfig,
	/// Version catalog discovery.
	#[serde(default)]
	pub catalogs: CatalogConfig,
	/// Formatting of text produced for new elements.
	#[serde(default)]
	pub write: WriteConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesConfig {
	/// Candidate build script names, first existing one wins. A
	/// `buildFileName` set in the settings file takes precedence.
	#[serde(default = "default_build_files")]
	pub build: Vec<String>,
	/// Candidate settings script names, first existing one wins.
	#[serde(default = "default_settings_files")]
	pub settings: Vec<String>,
}

impl Default for FilesConfig {
	fn default() -> Self {
		Self {
			build: default_build_files(),
			settings: default_settings_files(),
		}
	}
}

fn default_build_files() -> Vec<String> {
	vec!["build.gradle".to_string()]
}

fn default_settings_files() -> Vec<String> {
	vec!["settings.gradle".to_string()]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
	/// When false, `libs.*` references are never resolved.
	#[serde(default = "default_true")]
	pub enabled: bool,
	/// Name of the catalog Gradle creates implicitly.
	#[serde(default = "default_catalog_name")]
	pub default_name: String,
	/// Location of the implicit catalog, relative to the root.
	#[serde(default = "default_catalog_path")]
	pub default_path: PathBuf,
}

impl Default for CatalogConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			default_name: default_catalog_name(),
			default_path: default_catalog_path(),
		}
	}
}

fn default_true() -> bool {
	true
}

fn default_catalog_name() -> String {
	"libs".to_string()
}

fn default_catalog_path() -> PathBuf {
	PathBuf::from("gradle/libs.versions.toml")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteConfig {
	/// One level of indentation for new blocks.
	#[serde(default = "default_indent")]
	pub indent: String,
}

impl Default for WriteConfig {
	fn default() -> Self {
		Self {
			indent: default_indent(),
		}
	}
}

fn default_indent() -> String {
	"    ".to_string()
}

impl GdslConfig {
	/// Return the first config file that exists at `root`.
	pub fn resolve_path(root: &Path, source: &dyn TextSource) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| source.exists(path))
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if the file does not exist.
	pub fn load(root: &Path, source: &dyn TextSource) -> DslResult<Option<Self>> {
		let Some(config_path) = Self::resolve_path(root, source) else {
			return Ok(None);
		};

		let content = source.read_text(&config_path)?;
		let config: Self =
			toml::from_str(&content).map_err(|e| DslError::ConfigParse(e.to_string()))?;

		Ok(Some(config))
	}
}
