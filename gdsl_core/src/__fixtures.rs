use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use crate::DslError;
use crate::DslResult;
use crate::MemoryTextSource;
use crate::Project;
use crate::TextPatch;
use crate::TextSource;

/// Root of every in-memory project.
pub const ROOT: &str = "/repo";

pub fn repo_path(relative: &str) -> PathBuf {
	Path::new(ROOT).join(relative)
}

/// Open an in-memory project from `(path relative to the root, text)` pairs.
/// The source is returned as well so tests can inspect what was written.
pub fn memory_project(files: &[(&str, &str)]) -> DslResult<(Arc<MemoryTextSource>, Project)> {
	let source = Arc::new(MemoryTextSource::new());
	source.add_dir(ROOT);
	for (relative, text) in files {
		source.insert(repo_path(relative), *text);
	}

	let project = Project::open_with(ROOT, Arc::clone(&source))?;
	Ok((source, project))
}

/// A project with a single build script at the root.
pub fn single_build(build: &str) -> DslResult<(Arc<MemoryTextSource>, Project)> {
	memory_project(&[("settings.gradle", ""), ("build.gradle", build)])
}

/// `:` and `:lib`, where the root configures Android and extra properties
/// that the library reads back.
pub fn multi_project() -> DslResult<(Arc<MemoryTextSource>, Project)> {
	memory_project(&[
		(
			"settings.gradle",
			"rootProject.name = 'sample'\ninclude ':lib'\n",
		),
		(
			"build.gradle",
			"ext {\n    kotlinVersion = '1.9.0'\n}\nandroid {\n    compileSdkVersion \
			 'android-23'\n}\n",
		),
		(
			"lib/build.gradle",
			"android {\n    compileSdkVersion = parent.android.compileSdkVersion\n}\ndependencies \
			 {\n    implementation \"org.jetbrains.kotlin:kotlin-stdlib:$kotlinVersion\"\n}\n",
		),
	])
}

/// The current text of a file in the in-memory source.
pub fn text_of(source: &MemoryTextSource, relative: &str) -> String {
	source
		.text(repo_path(relative))
		.unwrap_or_else(|| panic!("missing file: {relative}"))
}

/// A source whose reads fail once anything has been written to it.
#[derive(Default)]
pub struct UnreadableAfterWrite {
	pub inner: MemoryTextSource,
	written: AtomicBool,
}

impl TextSource for UnreadableAfterWrite {
	fn read_text(&self, path: &Path) -> DslResult<String> {
		if self.written.load(Ordering::SeqCst) {
			return Err(DslError::IoPath {
				path: path.to_path_buf(),
				reason: "read after write".to_string(),
			});
		}
		self.inner.read_text(path)
	}

	fn write_text(&self, path: &Path, patch: &TextPatch) -> DslResult<()> {
		self.inner.write_text(path, patch)?;
		self.written.store(true, Ordering::SeqCst);
		Ok(())
	}

	fn exists(&self, path: &Path) -> bool {
		self.inner.exists(path)
	}
}

pub const CATALOG: &str = r#"[versions]
agp = "8.2.0"
okio = "3.9.0"

[libraries]
okio = { module = "com.squareup.okio:okio", version.ref = "okio" }
androidx-core-ktx = "androidx.core:core-ktx:1.12.0"

[plugins]
android-application = { id = "com.android.application", version.ref = "agp" }

[bundles]
io = ["okio"]
"#;
