//! `gdsl_core` is the core library for [gdsl](https://github.com/ifiokjr/gdsl), a property model for Gradle build scripts. It parses Groovy build and settings scripts into element trees, resolves references such as `rootProject.ext.kotlinVersion`, `parent.android.compileSdkVersion` or `libs.versions.agp` across every file of a multi-project build, and writes edits back as minimal text patches that keep comments and formatting intact.
//!
//! ## Processing Pipeline
//!
//! ```text
//! settings.gradle / build.gradle
//!   → Lexer (tokens with byte spans)
//!   → Parser (element tree per file, unknown statements kept verbatim)
//!   → Project graph (include / projectDir / buildFileName from the settings tree)
//!   → Resolver (scopes → project properties → ext → subprojects / allprojects)
//!   → Models (typed property, plugin, repository and dependency access)
//!   → Writer (re-renders modified elements over their old spans)
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loaded from `gdsl.toml`: build and settings file names, version catalog discovery and indentation of new blocks.
//! - [`hierarchy`]: The project graph built from the settings script.
//! - [`catalog`]: Version catalogs read from `*.versions.toml` files.
//! - [`model`]: Typed façades over the element tree.
//!
//! ## Key Types
//!
//! - [`Project`]: An opened build: its files, graph, catalogs and resolution session.
//! - [`DslTree`]: The element arena of one file.
//! - [`Resolver`]: Cycle-aware, memoized reference resolution.
//! - [`GradleBuildModel`] and [`GradleSettingsModel`]: Entry points for reading and editing scripts.
//! - [`TextPatch`]: The edits that bring a file's text in line with its tree.
//! - [`TextSource`]: Where text is read from and written to.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gdsl_core::Project;
//!
//! let mut project = Project::open(".").unwrap();
//! let build = project.build_model(":app").unwrap();
//!
//! let sdk = build.property("android.compileSdkVersion");
//! println!("{:?}", sdk.value::<String>(&project));
//!
//! build
//! 	.dependencies()
//! 	.add_artifact(&mut project, "implementation", "com.squareup.okio:okio:3.9.0")
//! 	.unwrap();
//! project.apply_changes().unwrap();
//! ```

pub use catalog::*;
pub use config::*;
pub use element::*;
pub use error::*;
pub use file::*;
pub use hierarchy::*;
pub use model::*;
pub use parser::*;
pub use position::*;
pub use project::*;
pub use resolve::*;
pub use source::*;
pub use value::*;
pub use writer::*;

pub mod catalog;
pub mod config;
mod element;
#[allow(unused_assignments)]
mod error;
mod file;
pub mod hierarchy;
pub(crate) mod lexer;
pub mod model;
mod parser;
mod position;
mod project;
mod resolve;
mod source;
mod value;
mod writer;

#[cfg(test)]
mod __fixtures;
#[cfg(test)]
mod __tests;
