use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Read and edit Gradle build scripts without losing comments or formatting.",
	long_about = "gdsl opens a multi-project Gradle build, resolves properties across every build \
	              script (ext blocks, parent and rootProject references, version catalogs) and \
	              writes edits back as minimal text patches.\n\nQuick start:\n  gdsl projects    \
	              List the projects of the build\n  gdsl get         Print a resolved property\n  \
	              gdsl set         Change a property in place\n  gdsl check       Report parse and \
	              hierarchy diagnostics"
)]
pub struct GdslCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the root of the Gradle build.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output and debug logging.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// List every project of the build.
	///
	/// Projects are read from the `include` statements of the settings file,
	/// together with any `projectDir` and `buildFileName` overrides.
	Projects {
		/// Output format. Use `text` for a readable table or `json` for
		/// programmatic consumption.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
	/// Print the resolved value of a property.
	///
	/// The property is a dotted path into the build script of `--project`,
	/// e.g. `android.defaultConfig.minSdkVersion` or `ext.kotlinVersion`.
	/// References are followed across files and into version catalogs.
	Get {
		/// Dotted property path.
		property: String,

		/// Gradle path of the project whose build script is read.
		#[arg(long, default_value = ":")]
		project: String,

		/// Output format.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
	/// Set a property and write the change back to the build script.
	///
	/// The value is read as a Groovy literal: `'1.0'` is a string, `23` a
	/// number and `['a', 'b']` a list. Anything that is not a literal is
	/// written as a string. Missing blocks are created.
	Set {
		/// Dotted property path.
		property: String,

		/// New value, as a Groovy literal.
		value: String,

		/// Gradle path of the project whose build script is edited.
		#[arg(long, default_value = ":")]
		project: String,

		/// Print the diff instead of writing the file.
		#[arg(long, default_value_t = false)]
		dry_run: bool,
	},
	/// Report diagnostics for every script of the build.
	///
	/// Exits with a non-zero status code when any script has a syntax error
	/// or the settings file declares a project that cannot be found.
	Check {
		/// Output format.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	#[default]
	Text,
	Json,
}
