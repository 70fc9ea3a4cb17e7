use std::path::Path;

use assert_cmd::Command;

pub fn gdsl_cmd() -> Command {
	let mut cmd = Command::cargo_bin("gdsl").unwrap_or_else(|e| panic!("gdsl binary: {e}"));
	cmd.env("NO_COLOR", "1").env_remove("GDSL_LOG");
	cmd
}

/// Write `(relative path, text)` pairs below `root`, creating directories.
pub fn write_files(root: &Path, files: &[(&str, &str)]) -> std::io::Result<()> {
	for (relative, text) in files {
		let path = root.join(relative);
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(path, text)?;
	}
	Ok(())
}

/// A root project and `:lib`, where the library reads the root's `ext`.
pub fn write_multi_project(root: &Path) -> std::io::Result<()> {
	write_files(
		root,
		&[
			("settings.gradle", "rootProject.name = 'sample'\ninclude ':lib'\n"),
			(
				"build.gradle",
				"ext {\n    minSdk = 21\n}\nandroid {\n    compileSdkVersion 'android-23'\n}\n",
			),
			(
				"lib/build.gradle",
				"android {\n    // keep\n    minSdkVersion rootProject.ext.minSdk\n}\n",
			),
		],
	)
}
