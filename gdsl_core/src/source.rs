use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use parking_lot::RwLock;
use tracing::debug;

use crate::DslError;
use crate::DslResult;
use crate::TextPatch;

/// Where build script text comes from and where edits go.
///
/// The engine never touches the file system directly: the project reads every
/// file through this trait when it is opened or reparsed and hands computed
/// patches back to it when changes are applied.
pub trait TextSource: Send + Sync {
	/// Read the whole text of `path`. A file that does not exist reads as
	/// empty text.
	fn read_text(&self, path: &Path) -> DslResult<String>;

	/// Apply `patch` to the current text of `path` and persist the result.
	fn write_text(&self, path: &Path, patch: &TextPatch) -> DslResult<()>;

	/// Whether `path` is an existing file or directory.
	fn exists(&self, path: &Path) -> bool;
}

impl<T: TextSource + ?Sized> TextSource for Arc<T> {
	fn read_text(&self, path: &Path) -> DslResult<String> {
		(**self).read_text(path)
	}

	fn write_text(&self, path: &Path, patch: &TextPatch) -> DslResult<()> {
		(**self).write_text(path, patch)
	}

	fn exists(&self, path: &Path) -> bool {
		(**self).exists(path)
	}
}

/// Reads and writes files on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsTextSource;

impl TextSource for FsTextSource {
	fn read_text(&self, path: &Path) -> DslResult<String> {
		match std::fs::read_to_string(path) {
			Ok(text) => Ok(text),
			Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
				debug!(path = %path.display(), "file does not exist, reading as empty");
				Ok(String::new())
			}
			Err(error) => {
				Err(DslError::IoPath {
					path: path.to_path_buf(),
					reason: error.to_string(),
				})
			}
		}
	}

	fn write_text(&self, path: &Path, patch: &TextPatch) -> DslResult<()> {
		let current = self.read_text(path)?;
		let updated = patch.apply(&current);

		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}

		std::fs::write(path, updated).map_err(|error| {
			DslError::IoPath {
				path: path.to_path_buf(),
				reason: error.to_string(),
			}
		})?;

		debug!(path = %path.display(), edits = patch.len(), "wrote patch");
		Ok(())
	}

	fn exists(&self, path: &Path) -> bool {
		path.exists()
	}
}

/// An in-memory file tree. Useful for tests and for callers that keep the
/// text of open editors themselves.
#[derive(Debug, Default)]
pub struct MemoryTextSource {
	files: RwLock<BTreeMap<PathBuf, String>>,
	dirs: RwLock<BTreeSet<PathBuf>>,
	reject_writes: AtomicBool,
}

impl MemoryTextSource {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder form of [`MemoryTextSource::insert`].
	pub fn with_file(self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
		self.insert(path, text);
		self
	}

	/// Add or replace a file. Its ancestor directories start to exist too.
	pub fn insert(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
		let path = path.into();
		if let Some(parent) = path.parent() {
			self.add_dir(parent);
		}
		self.files.write().insert(path, text.into());
	}

	/// Register a directory (and its ancestors) without any files in it.
	pub fn add_dir(&self, path: impl AsRef<Path>) {
		let mut dirs = self.dirs.write();
		for ancestor in path.as_ref().ancestors() {
			if ancestor.as_os_str().is_empty() {
				break;
			}
			dirs.insert(ancestor.to_path_buf());
		}
	}

	/// Current text of a file.
	pub fn text(&self, path: impl AsRef<Path>) -> Option<String> {
		self.files.read().get(path.as_ref()).cloned()
	}

	/// Make every following write fail with [`DslError::WriteRejected`].
	pub fn reject_writes(&self, reject: bool) {
		self.reject_writes.store(reject, Ordering::SeqCst);
	}
}

impl TextSource for MemoryTextSource {
	fn read_text(&self, path: &Path) -> DslResult<String> {
		Ok(self.text(path).unwrap_or_default())
	}

	fn write_text(&self, path: &Path, patch: &TextPatch) -> DslResult<()> {
		if self.reject_writes.load(Ordering::SeqCst) {
			return Err(DslError::WriteRejected {
				path: path.to_path_buf(),
			});
		}

		let current = self.read_text(path)?;
		self.insert(path, patch.apply(&current));
		Ok(())
	}

	fn exists(&self, path: &Path) -> bool {
		self.files.read().contains_key(path) || self.dirs.read().contains(path)
	}
}
