use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use gdsl_cli::Commands;
use gdsl_cli::GdslCli;
use gdsl_cli::OutputFormat;
use gdsl_core::DiagnosticKind;
use gdsl_core::DslError;
use gdsl_core::Project;
use gdsl_core::ProjectDiagnostic;
use gdsl_core::Value;
use gdsl_core::parse_value;
use owo_colors::OwoColorize;
use serde::Serialize;
use similar::ChangeTag;
use similar::TextDiff;
use tracing_subscriber::EnvFilter;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = GdslCli::parse();

	// Respect NO_COLOR, --no-color and terminals without color support.
	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(supports_color::Stream::Stderr).is_some();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	init_logging(args.verbose, use_color);

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let result = match &args.command {
		Some(Commands::Projects { format }) => run_projects(&args, *format),
		Some(Commands::Get {
			property,
			project,
			format,
		}) => run_get(&args, property, project, *format),
		Some(Commands::Set {
			property,
			value,
			project,
			dry_run,
		}) => run_set(&args, property, value, project, *dry_run),
		Some(Commands::Check { format }) => run_check(&args, *format),
		None => {
			eprintln!("No subcommand specified. Run `gdsl --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		match e.downcast::<DslError>() {
			Ok(dsl_err) => {
				let report: miette::Report = (*dsl_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Logs go to stderr so that command output on stdout stays parseable.
/// `GDSL_LOG` takes precedence over `--verbose`.
fn init_logging(verbose: bool, use_color: bool) {
	let filter = EnvFilter::try_from_env("GDSL_LOG").unwrap_or_else(|_| {
		EnvFilter::new(if verbose {
			"gdsl_core=debug"
		} else {
			"warn"
		})
	});

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.without_time()
		.try_init()
		.ok();
}

fn resolve_root(args: &GdslCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn open_project(args: &GdslCli) -> Result<Project, Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let project = Project::open(&root)?;

	if args.verbose {
		eprintln!(
			"Opened {} with {} project(s) and {} version catalog(s).",
			root.display(),
			project.graph().len(),
			project.catalogs().len()
		);
	}

	Ok(project)
}

#[derive(Serialize)]
struct ProjectSummary {
	path: String,
	name: String,
	dir: String,
	build_file: String,
	parent: Option<String>,
}

fn run_projects(args: &GdslCli, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
	let project = open_project(args)?;
	let root = project.root();
	let graph = project.graph();

	let summaries: Vec<ProjectSummary> = graph
		.nodes()
		.map(|(id, node)| {
			ProjectSummary {
				path: node.path.clone(),
				name: node.name.clone(),
				dir: display_dir(&node.dir, root),
				build_file: make_relative(&node.build_file, root),
				parent: graph.parent(id).map(|parent| graph.node(parent).path.clone()),
			}
		})
		.collect();

	match format {
		OutputFormat::Json => {
			println!("{}", serde_json::to_string_pretty(&summaries)?);
		}
		OutputFormat::Text => {
			println!("{}", colored!("Projects:", bold));
			for summary in &summaries {
				println!(
					"  {:<20} {:<16} {}",
					colored!(summary.path, green),
					summary.name,
					summary.build_file
				);
			}
			println!();
			println!("{} project(s)", summaries.len());
		}
	}

	Ok(())
}

fn run_get(
	args: &GdslCli,
	property: &str,
	project_path: &str,
	format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
	let project = open_project(args)?;
	let build = project.build_model(project_path)?;
	let model = build.property(property);

	if !model.exists(&project) {
		return Err(format!("property `{property}` is not declared in project `{project_path}`").into());
	}

	let value = model.resolved(&project);
	let reference = model.reference_text(&project);
	let value_type = model.value_type(&project);

	match format {
		OutputFormat::Json => {
			let output = serde_json::json!({
				"project": project_path,
				"property": property,
				"type": value_type,
				"value": value,
				"reference": reference,
			});
			println!("{}", serde_json::to_string_pretty(&output)?);
		}
		OutputFormat::Text => {
			match &value {
				Some(value) => println!("{value}"),
				None => {
					eprintln!(
						"{} `{property}` refers to `{}`, which does not resolve",
						colored!("warning:", yellow),
						reference.as_deref().unwrap_or("?")
					);
				}
			}

			if args.verbose {
				eprintln!("{:<12} {value_type:?}", "type:");
				if let Some(reference) = &reference {
					eprintln!("{:<12} {reference}", "reference:");
				}
			}
		}
	}

	if value.is_none() {
		process::exit(1);
	}

	Ok(())
}

fn run_set(
	args: &GdslCli,
	property: &str,
	raw_value: &str,
	project_path: &str,
	dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
	let mut project = open_project(args)?;
	let build = project.build_model(project_path)?;
	let value = parse_value(raw_value).unwrap_or_else(|_| Value::string(raw_value));

	build.property(property).set_value(&mut project, value)?;

	let root = project.root().to_path_buf();
	let file = project.file(build.file());
	let rel = make_relative(file.path(), &root);

	if dry_run {
		let patch = project.pending_patch(build.file())?;
		if patch.is_empty() {
			println!("`{property}` already has this value.");
			return Ok(());
		}

		let current = file.text().to_string();
		let updated = patch.apply(&current);
		println!("Dry run: would update {rel}");
		print_diff(&current, &updated);
		return Ok(());
	}

	if !project.is_modified() {
		println!("`{property}` already has this value.");
		return Ok(());
	}

	project.apply_changes()?;
	println!("Updated `{property}` in {}.", colored!(rel, green));
	Ok(())
}

fn run_check(args: &GdslCli, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
	let project = open_project(args)?;
	let root = project.root().to_path_buf();
	let diagnostics = project.diagnostics();
	let error_count = diagnostics.iter().filter(|diag| diag.is_error()).count();
	let warning_count = diagnostics.len() - error_count;

	match format {
		OutputFormat::Json => {
			let entries: Vec<serde_json::Value> = diagnostics
				.iter()
				.map(|diag| {
					serde_json::json!({
						"file": make_relative(&diag.file, &root),
						"line": diag.line,
						"column": diag.column,
						"severity": if diag.is_error() { "error" } else { "warning" },
						"message": diag.message(),
					})
				})
				.collect();
			let output = serde_json::json!({
				"ok": error_count == 0,
				"projects": project.graph().len(),
				"diagnostics": entries,
			});
			println!("{}", serde_json::to_string_pretty(&output)?);
		}
		OutputFormat::Text => {
			for diag in diagnostics {
				if !diag.is_error() && !args.verbose {
					continue;
				}
				let rel = make_relative(&diag.file, &root);
				let report = diagnostic_to_report(diag, &rel);
				eprintln!("{report:?}");
			}

			if error_count == 0 {
				println!(
					"Check passed: {} project(s), {warning_count} statement(s) kept verbatim.",
					project.graph().len()
				);
			} else {
				eprintln!(
					"{} {error_count} error(s) found.",
					colored!("Check failed:", red)
				);
			}
		}
	}

	if error_count > 0 {
		process::exit(1);
	}

	Ok(())
}

fn print_diff(current: &str, expected: &str) {
	let diff = TextDiff::from_lines(current, expected);
	for change in diff.iter_all_changes() {
		match change.tag() {
			ChangeTag::Delete => {
				print!("  {}", colored!(format!("-{change}"), red));
			}
			ChangeTag::Insert => {
				print!("  {}", colored!(format!("+{change}"), green));
			}
			ChangeTag::Equal => {
				print!("   {change}");
			}
		}
	}
}

/// Make a path relative to root for display purposes.
fn make_relative(path: &Path, root: &Path) -> String {
	path.strip_prefix(root)
		.unwrap_or(path)
		.display()
		.to_string()
}

fn display_dir(dir: &Path, root: &Path) -> String {
	let rel = make_relative(dir, root);
	if rel.is_empty() { ".".to_string() } else { rel }
}

/// Convert a `ProjectDiagnostic` into a `miette::Report` with a severity,
/// an error code and help text.
fn diagnostic_to_report(diag: &ProjectDiagnostic, rel_path: &str) -> miette::Report {
	let location = format!("{rel_path}:{}:{}", diag.line, diag.column);
	let severity = if diag.is_error() {
		miette::Severity::Error
	} else {
		miette::Severity::Warning
	};

	let message = format!("[{location}] {}", diag.message());
	let help = match &diag.kind {
		DiagnosticKind::UnclosedBlock { name } => format!("add a closing `}}` for `{name}`"),
		DiagnosticKind::UnexpectedClosingBrace => {
			"remove the `}` or open the block it belongs to".to_string()
		}
		DiagnosticKind::UnsupportedStatement { .. } => {
			"the statement is preserved as written but cannot be edited".to_string()
		}
		DiagnosticKind::MalformedHierarchy { .. } => {
			"create the directory or fix the `include` in the settings file".to_string()
		}
		DiagnosticKind::CatalogParse { .. } => {
			"check that the version catalog is valid TOML".to_string()
		}
		_ => diag.message(),
	};
	let code = match &diag.kind {
		DiagnosticKind::UnclosedBlock { .. } => "gdsl::unclosed_block",
		DiagnosticKind::UnexpectedClosingBrace => "gdsl::unexpected_closing_brace",
		DiagnosticKind::UnsupportedStatement { .. } => "gdsl::unsupported_statement",
		DiagnosticKind::MalformedHierarchy { .. } => "gdsl::malformed_hierarchy",
		DiagnosticKind::CatalogParse { .. } => "gdsl::catalog_parse",
		_ => "gdsl::diagnostic",
	};

	let diagnostic = miette::MietteDiagnostic::new(message)
		.with_code(code)
		.with_help(help)
		.with_severity(severity);
	miette::Report::new(diagnostic)
}
