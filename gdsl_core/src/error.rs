use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum DslError {
	#[error(transparent)]
	#[diagnostic(code(gdsl::io_error))]
	Io(#[from] std::io::Error),

	#[error("failed to access `{path}`: {reason}")]
	#[diagnostic(code(gdsl::io_path))]
	IoPath { path: PathBuf, reason: String },

	#[error("syntax error at {line}:{column}: {message}")]
	#[diagnostic(
		code(gdsl::syntax),
		help("every block opened with a brace needs a matching closing brace")
	)]
	Syntax {
		line: usize,
		column: usize,
		message: String,
	},

	#[error("malformed project hierarchy at `{path}`: {reason}")]
	#[diagnostic(
		code(gdsl::malformed_hierarchy),
		help("make sure every `include` in the settings file points at an existing directory")
	)]
	MalformedHierarchy { path: String, reason: String },

	#[error("edit cannot be written as build script text: {0}")]
	#[diagnostic(code(gdsl::unwritable_edit))]
	UnwritableEdit(String),

	#[error("unknown project path: `{0}`")]
	#[diagnostic(
		code(gdsl::unknown_project),
		help("run `gdsl projects` to list the projects declared in the settings file")
	)]
	UnknownProject(String),

	#[error("write to `{path}` was rejected")]
	#[diagnostic(code(gdsl::write_rejected))]
	WriteRejected { path: PathBuf },

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(gdsl::config_parse),
		help("check that gdsl.toml is valid TOML with [files], [catalogs] and/or [write] sections")
	)]
	ConfigParse(String),

	#[error("failed to parse version catalog `{path}`: {reason}")]
	#[diagnostic(code(gdsl::catalog_parse))]
	CatalogParse { path: PathBuf, reason: String },
}

pub type DslResult<T> = Result<T, DslError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
