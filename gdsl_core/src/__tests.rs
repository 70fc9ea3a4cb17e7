use std::path::PathBuf;
use std::sync::Arc;

use rstest::rstest;
use similar_asserts::assert_eq;
use tracing_test::traced_test;

use super::__fixtures::*;
use super::*;

// --- Parser tests ---

#[rstest]
#[case::assignment("version = '1.0'", "version", ValueType::String)]
#[case::application("compileSdkVersion 23", "compileSdkVersion", ValueType::Integer)]
#[case::decimal("sourceCompatibility = 1.50", "sourceCompatibility", ValueType::Decimal)]
#[case::boolean("minifyEnabled false", "minifyEnabled", ValueType::Boolean)]
#[case::reference("minSdk = rootProject.ext.minSdk", "minSdk", ValueType::Reference)]
#[case::interpolated(r#"archivesBaseName = "lib-$version""#, "archivesBaseName", ValueType::Interpolated)]
#[case::plain_double_quoted(r#"group = "com.example""#, "group", ValueType::String)]
#[case::list("flavors = ['free', 'paid']", "flavors", ValueType::List)]
#[case::map("versions = [kotlin: '1.9.0']", "versions", ValueType::Map)]
#[case::block("android {\n}", "android", ValueType::Block)]
#[case::dotted("android.defaultConfig.minSdkVersion 21", "android.defaultConfig.minSdkVersion", ValueType::Integer)]
fn parse_statement_value_types(
	#[case] input: &str,
	#[case] name: &str,
	#[case] expected: ValueType,
) -> DslResult<()> {
	let tree = parse(input)?;
	let [statement] = tree.children(tree.root()) else {
		panic!("expected a single statement in {input:?}");
	};

	assert_eq!(tree.get(*statement).name, name);
	assert_eq!(ValueType::of(&tree, *statement), expected);

	Ok(())
}

#[test]
fn parse_keeps_unsupported_statements_verbatim() {
	let (tree, diagnostics) =
		parse_with_diagnostics("version = major + '.1'\ngroup = 'com.example'\n");
	let children = tree.children(tree.root());

	assert_eq!(children.len(), 2);
	assert!(matches!(
		&tree.get(children[0]).kind,
		ElementKind::Raw(text) if text == "version = major + '.1'"
	));
	assert_eq!(tree.get(children[1]).name, "group");
	assert_eq!(diagnostics.len(), 1);
	assert!(matches!(
		&diagnostics[0],
		ParseDiagnostic::UnsupportedStatement { line: 1, .. }
	));
	assert!(!diagnostics[0].is_error());
}

#[test]
fn parse_unclosed_block_is_a_syntax_error() {
	let result = parse("buildscript {\n    repositories {\n        google()\n    }\n");

	assert!(matches!(
		result,
		Err(DslError::Syntax {
			line: 1,
			column: 1,
			..
		})
	));
}

#[test]
fn parse_unexpected_closing_brace_is_reported() {
	let (tree, diagnostics) = parse_with_diagnostics("}\nversion = '1.0'\n");

	assert_eq!(tree.children(tree.root()).len(), 2);
	assert!(matches!(
		diagnostics.as_slice(),
		[ParseDiagnostic::UnexpectedClosingBrace { line: 1, column: 1 }]
	));
}

#[test]
fn parse_plugin_declarations() -> DslResult<()> {
	let tree = parse(
		"plugins {\n    id 'java'\n    id 'org.jetbrains.kotlin.jvm' version '1.9.0' apply false\n    \
		 alias(libs.plugins.android.application)\n}\n",
	)?;
	let plugins = tree.children(tree.root())[0];
	let entries = tree.children(plugins);

	assert_eq!(entries.len(), 3);
	assert!(matches!(
		&tree.get(entries[0]).kind,
		ElementKind::MethodCall { parens: false, .. }
	));
	assert!(matches!(tree.get(entries[1]).kind, ElementKind::Infix));
	let pairs: Vec<&str> = tree
		.children(entries[1])
		.iter()
		.map(|pair| tree.get(*pair).name.as_str())
		.collect();
	assert_eq!(pairs, vec!["id", "version", "apply"]);
	assert!(matches!(
		&tree.get(entries[2]).kind,
		ElementKind::MethodCall { parens: true, .. }
	));

	Ok(())
}

#[test]
fn parse_settings_project_overrides_keep_call_heads() -> DslResult<()> {
	let tree = parse("project(':lib').projectDir = file('libs/core')\n")?;
	let statement = tree.children(tree.root())[0];

	assert_eq!(tree.get(statement).name, "project(':lib').projectDir");
	assert_eq!(
		split_path(&tree.get(statement).name),
		vec!["project(':lib')".to_string(), "projectDir".to_string()]
	);

	Ok(())
}

#[rstest]
#[case::decimal_text_is_kept("1.50", Value::number("1.50"))]
#[case::negative("-1", Value::number("-1"))]
#[case::single_quoted("'1.0'", Value::string("1.0"))]
#[case::escaped(r"'it\'s'", Value::string("it's"))]
#[case::list("['a', 'b']", Value::List(vec![Value::string("a"), Value::string("b")]))]
#[case::map("[min: 21, debug: true]", Value::Map(vec![
	("min".to_string(), Value::number("21")),
	("debug".to_string(), Value::Boolean(true)),
]))]
fn parse_literal_values(#[case] input: &str, #[case] expected: Value) -> DslResult<()> {
	assert_eq!(parse_value(input)?, expected);
	Ok(())
}

#[test]
fn numbers_are_never_coerced() -> DslResult<()> {
	assert!(parse_value("1.50")? != parse_value("1.5")?);
	assert_eq!(parse_value("1.50")?.to::<String>().as_deref(), Some("1.50"));
	Ok(())
}

// --- Tree and writer tests ---

#[test]
fn failed_edit_rolls_back_the_tree() -> DslResult<()> {
	let (_, mut project) = single_build("ext {\n    a = 1\n}\n")?;
	let file = project.root_build_model()?.file();

	let result = project.edit(file, |tree| {
		let root = tree.root();
		tree.add_value(root, "b", &Value::from(2_i64))?;
		let invalid = tree.alloc_value("1st", Syntax::Assignment, &Value::from(3_i64));
		tree.add_child(root, invalid)
	});

	assert!(matches!(result, Err(DslError::UnwritableEdit(_))));
	assert!(!project.file(file).is_modified());
	let tree = project.file(file).tree();
	assert_eq!(tree.children(tree.root()).len(), 1);

	Ok(())
}

#[test]
fn blocks_cannot_be_used_as_values() -> DslResult<()> {
	let mut tree = parse("dependencies {\n}\nflavors = ['free']\n")?;
	let root = tree.root();
	let block = tree.children(root)[0];
	let flavors = tree.children(root)[1];

	assert!(matches!(
		tree.set_value(block, &Value::string("x")),
		Err(DslError::UnwritableEdit(_))
	));

	let nested = tree.alloc(Element::new("debug", ElementKind::Block, Syntax::Block));
	assert!(matches!(
		tree.add_child(flavors, nested),
		Err(DslError::UnwritableEdit(_))
	));
	assert_eq!(tree.children(flavors).len(), 1);

	Ok(())
}

#[test]
fn unmodified_file_has_empty_patch() -> DslResult<()> {
	let text = "// comment\nplugins {\n    id 'java'\n}\n\nversion = '1.0'   // trailing\n";
	let (_, project) = single_build(text)?;
	let build = project.root_build_model()?;

	assert!(project.pending_patch(build.file())?.is_empty());
	assert_eq!(project.file(build.file()).text(), text);

	Ok(())
}

#[test]
fn set_value_replaces_only_the_value() -> DslResult<()> {
	let (source, mut project) = single_build(
		"// top comment\nandroid {\n    // sdk\n    compileSdkVersion 23 // inline\n}\n",
	)?;
	let build = project.root_build_model()?;

	build
		.property("android.compileSdkVersion")
		.set_value(&mut project, 34_i64)?;
	project.apply_changes()?;

	insta::assert_snapshot!(text_of(&source, "build.gradle"), @r"
	// top comment
	android {
	    // sdk
	    compileSdkVersion 34 // inline
	}
	");

	Ok(())
}

#[test]
fn set_value_keeps_the_quote_style() -> DslResult<()> {
	let (source, mut project) = single_build("version = \"1.0\"\n")?;
	let build = project.root_build_model()?;

	build.property("version").set_value(&mut project, "2.0")?;
	project.apply_changes()?;

	assert_eq!(text_of(&source, "build.gradle"), "version = \"2.0\"\n");

	Ok(())
}

#[rstest]
#[case::newline("description = 'x'\n", "line1\nline2", r"description = 'line1\nline2'")]
#[case::backslash("description = 'x'\n", r"C:\dir", r"description = 'C:\\dir'")]
#[case::quotes_and_tab(
	"description = \"x\"\n",
	"say \"hi\"\tnow",
	r#"description = "say \"hi\"\tnow""#
)]
#[case::dollar_in_double_quotes(
	"description = \"x\"\n",
	"cost $version",
	"description = 'cost $version'"
)]
#[case::dollar_in_triple_quotes(
	"description = \"\"\"x\"\"\"\n",
	"cost $version",
	"description = '''cost $version'''"
)]
fn string_values_survive_a_round_trip(
	#[case] build: &str,
	#[case] value: &str,
	#[case] expected_line: &str,
) -> DslResult<()> {
	let text = format!("version = '2'\n{build}");
	let (source, mut project) = single_build(&text)?;
	let description = project.root_build_model()?.property("description");

	description.set_value(&mut project, value)?;
	assert_eq!(description.value::<String>(&project).as_deref(), Some(value));
	project.apply_changes()?;

	assert_eq!(
		text_of(&source, "build.gradle"),
		format!("version = '2'\n{expected_line}\n")
	);
	assert!(project.diagnostics().is_empty());
	assert_eq!(description.value::<String>(&project).as_deref(), Some(value));

	Ok(())
}

#[test]
fn new_property_creates_missing_blocks() -> DslResult<()> {
	let (source, mut project) = single_build("android {\n    compileSdkVersion 23\n}\n")?;
	let build = project.root_build_model()?;

	build
		.property("android.defaultConfig.minSdkVersion")
		.set_value(&mut project, 21_i64)?;
	project.apply_changes()?;

	assert_eq!(
		text_of(&source, "build.gradle"),
		"android {\n    compileSdkVersion 23\n    defaultConfig {\n        minSdkVersion = 21\n    \
		 }\n}\n"
	);

	Ok(())
}

#[test]
fn new_property_in_empty_block() -> DslResult<()> {
	let (source, mut project) = single_build("android {}\n")?;
	let build = project.root_build_model()?;

	build
		.property("android.compileSdkVersion")
		.set_value(&mut project, 34_i64)?;
	project.apply_changes()?;

	assert_eq!(
		text_of(&source, "build.gradle"),
		"android {\n    compileSdkVersion = 34\n}\n"
	);

	Ok(())
}

#[test]
fn deleted_property_removes_its_line() -> DslResult<()> {
	let (source, mut project) =
		single_build("android {\n    compileSdkVersion 23\n    minSdkVersion 21\n}\n")?;
	let build = project.root_build_model()?;

	assert!(build.property("android.minSdkVersion").delete(&mut project)?);
	assert!(!build.property("android.targetSdkVersion").delete(&mut project)?);
	project.apply_changes()?;

	assert_eq!(
		text_of(&source, "build.gradle"),
		"android {\n    compileSdkVersion 23\n}\n"
	);

	Ok(())
}

#[test]
fn overlapping_edits_are_rejected() {
	let result = TextPatch::new(vec![TextEdit::new(0..5, "a"), TextEdit::new(3..8, "b")]);
	assert!(matches!(result, Err(DslError::UnwritableEdit(_))));
}

#[test]
fn touching_edits_form_a_patch() -> DslResult<()> {
	let patch = TextPatch::new(vec![
		TextEdit::new(4..6, "cd"),
		TextEdit::insert(4, "-"),
		TextEdit::new(0..4, "wxyz"),
	])?;
	assert_eq!(patch.apply("abcdef"), "wxyz-cdef");

	Ok(())
}

#[test]
fn deleting_a_block_after_its_property_removes_the_block() -> DslResult<()> {
	let (source, mut project) = single_build(
		"version = '1.0'\nandroid {\n    compileSdkVersion 23\n    minSdkVersion 21\n}\n",
	)?;
	let build = project.root_build_model()?;

	assert!(build.property("android.minSdkVersion").delete(&mut project)?);
	assert!(build.android().delete(&mut project)?);
	project.apply_changes()?;

	assert_eq!(text_of(&source, "build.gradle"), "version = '1.0'\n");

	Ok(())
}

#[test]
fn add_list_value_extends_the_list() -> DslResult<()> {
	let (source, mut project) = single_build("android {\n    flavors = ['free']\n}\n")?;
	let build = project.root_build_model()?;
	let flavors = build.property("android.flavors");

	flavors.add_list_value(&mut project, "paid")?;
	assert_eq!(
		flavors.value::<Vec<String>>(&project),
		Some(vec!["free".to_string(), "paid".to_string()])
	);
	project.apply_changes()?;

	assert_eq!(
		text_of(&source, "build.gradle"),
		"android {\n    flavors = ['free', 'paid']\n}\n"
	);
	assert!(matches!(
		build.property("android").add_list_value(&mut project, "x"),
		Err(DslError::UnwritableEdit(_))
	));

	Ok(())
}

#[test]
fn configured_indent_is_used_for_new_blocks() -> DslResult<()> {
	let (source, mut project) = memory_project(&[
		("gdsl.toml", "[write]\nindent = \"\\t\"\n"),
		("settings.gradle", ""),
		("build.gradle", ""),
	])?;
	let build = project.root_build_model()?;

	assert_eq!(project.config().write.indent, "\t");
	build
		.dependencies()
		.add_artifact(&mut project, "implementation", "com.squareup.okio:okio:3.9.0")?;
	project.apply_changes()?;

	assert_eq!(
		text_of(&source, "build.gradle"),
		"dependencies {\n\timplementation 'com.squareup.okio:okio:3.9.0'\n}\n"
	);

	Ok(())
}

// --- Resolution tests ---

#[test]
fn last_ext_declaration_wins() -> DslResult<()> {
	let (_, project) = single_build("ext {\n    a = 1\n}\next.a = 2\n")?;
	let ext = project.root_build_model()?.ext();

	assert_eq!(ext.property("a").value::<String>(&project).as_deref(), Some("2"));
	assert_eq!(ext.properties(&project), vec!["a".to_string()]);

	Ok(())
}

#[test]
fn unresolved_last_declaration_shadows_earlier_ones() -> DslResult<()> {
	let (_, project) = single_build("ext {\n    a = 1\n}\next {\n    a = missing\n}\nc = a\n")?;
	let build = project.root_build_model()?;
	let a = build.ext().property("a");
	let c = build.property("c");

	assert_eq!(a.resolved(&project), None);
	assert_eq!(c.resolved(&project), None);
	assert_eq!(a.resolved(&project), c.resolved(&project));
	assert_eq!(a.reference_text(&project).as_deref(), Some("missing"));

	Ok(())
}

#[test]
fn same_named_blocks_merge() -> DslResult<()> {
	let (_, project) = single_build(
		"dependencies {\n    implementation 'a:b:1'\n}\ndependencies {\n    testImplementation \
		 'c:d:2'\n}\n",
	)?;
	let dependencies = project.root_build_model()?.dependencies();
	let notations: Vec<String> = dependencies
		.artifacts(&project)
		.iter()
		.filter_map(|artifact| artifact.notation(&project))
		.collect();

	assert_eq!(notations, vec!["a:b:1".to_string(), "c:d:2".to_string()]);

	Ok(())
}

#[test]
fn parent_properties_resolve_across_files() -> DslResult<()> {
	let (_, project) = multi_project()?;
	let lib = project.build_model(":lib")?;

	assert_eq!(
		lib.property("android.compileSdkVersion")
			.value::<String>(&project)
			.as_deref(),
		Some("android-23")
	);
	assert_eq!(
		lib.property("android.compileSdkVersion").value_type(&project),
		ValueType::Reference
	);
	assert_eq!(
		lib.property("android.compileSdkVersion")
			.reference_text(&project)
			.as_deref(),
		Some("parent.android.compileSdkVersion")
	);

	Ok(())
}

#[test]
fn interpolation_reads_ancestor_ext() -> DslResult<()> {
	let (_, project) = multi_project()?;
	let artifacts = project.build_model(":lib")?.dependencies().artifacts(&project);

	assert_eq!(artifacts.len(), 1);
	assert_eq!(
		artifacts[0].notation(&project).as_deref(),
		Some("org.jetbrains.kotlin:kotlin-stdlib:1.9.0")
	);
	assert_eq!(artifacts[0].version(&project).as_deref(), Some("1.9.0"));

	Ok(())
}

#[test]
fn unresolved_injections_are_kept() -> DslResult<()> {
	let (_, project) = single_build("archivesBaseName = \"lib-${missing}-$version\"\nversion = '2.0'\n")?;
	let build = project.root_build_model()?;

	assert_eq!(
		build.property("archivesBaseName").value::<String>(&project).as_deref(),
		Some("lib-${missing}-2.0")
	);

	Ok(())
}

#[rstest]
#[case::root_dir("rootDir", "/repo")]
#[case::project_dir("projectDir", "/repo/lib")]
#[case::project_name("name", "lib")]
#[case::project_path("path", ":lib")]
#[case::switch_to_root("project(':').rootDir", "/repo")]
#[case::root_project_name("rootProject.name", "sample")]
#[case::root_project_ext("rootProject.ext.kotlinVersion", "1.9.0")]
#[case::ancestor_ext("kotlinVersion", "1.9.0")]
fn special_names_resolve(#[case] name: &str, #[case] expected: &str) -> DslResult<()> {
	let (_, project) = multi_project()?;
	let file = project.build_model(":lib")?.file();
	let root = project.file(file).tree().root();

	assert_eq!(
		project
			.resolve(file, root, name)
			.and_then(|value| value.to::<String>())
			.as_deref(),
		Some(expected)
	);

	Ok(())
}

#[test]
fn missing_project_does_not_resolve() -> DslResult<()> {
	let (_, project) = multi_project()?;
	let file = project.build_model(":lib")?.file();
	let root = project.file(file).tree().root();

	assert_eq!(project.resolve(file, root, "project(':nope').version"), None);
	assert_eq!(project.resolve(file, root, "undeclared"), None);

	Ok(())
}

#[test]
#[traced_test]
fn reference_cycles_stay_unresolved() -> DslResult<()> {
	let (_, project) = single_build("ext {\n    a = b\n    b = a\n}\nc = 1\n")?;
	let build = project.root_build_model()?;

	assert_eq!(build.ext().property("a").resolved(&project), None);
	assert_eq!(build.ext().property("b").resolved(&project), None);
	assert_eq!(build.property("c").value::<i64>(&project), Some(1));
	assert!(logs_contain("reference cycle detected"));

	Ok(())
}

#[test]
#[traced_test]
fn reference_cycles_across_ext_blocks_stay_unresolved() -> DslResult<()> {
	let (_, project) = single_build("ext {\n    a = b\n}\next {\n    b = a\n}\n")?;
	let ext = project.root_build_model()?.ext();

	assert_eq!(ext.property("a").resolved(&project), None);
	assert_eq!(ext.property("b").resolved(&project), None);
	assert!(logs_contain("reference cycle detected"));

	Ok(())
}

#[test]
fn subprojects_configuration_is_inherited() -> DslResult<()> {
	let (_, project) = memory_project(&[
		("settings.gradle", "include ':a', ':b'\n"),
		("build.gradle", "subprojects {\n    sourceCompatibility = 1.6\n}\n"),
		("a/build.gradle", "sourceCompatibility = 1.4\n"),
		("b/build.gradle", ""),
	])?;
	let a = project.build_model(":a")?.property("sourceCompatibility");
	let b = project.build_model(":b")?.property("sourceCompatibility");

	assert_eq!(a.value::<String>(&project).as_deref(), Some("1.4"));
	assert_eq!(b.value::<String>(&project).as_deref(), Some("1.6"));
	assert!(!b.exists(&project));
	assert_eq!(b.value_type(&project), ValueType::None);

	Ok(())
}

#[test]
fn allprojects_ext_is_visible_everywhere() -> DslResult<()> {
	let (_, project) = memory_project(&[
		("settings.gradle", "include ':a'\n"),
		("build.gradle", "allprojects {\n    ext.junit = '4.13.2'\n}\n"),
		("a/build.gradle", "ext.testLib = \"junit:junit:$junit\"\n"),
	])?;
	let a = project.build_model(":a")?;

	assert_eq!(
		a.ext().property("testLib").value::<String>(&project).as_deref(),
		Some("junit:junit:4.13.2")
	);

	Ok(())
}

#[test]
fn edits_drop_cached_resolutions() -> DslResult<()> {
	let (_, mut project) = multi_project()?;
	let lib = project.build_model(":lib")?;
	let root = project.root_build_model()?;

	assert_eq!(
		lib.property("android.compileSdkVersion").value::<String>(&project).as_deref(),
		Some("android-23")
	);
	assert!(!project.session().cache().is_empty());

	root.property("android.compileSdkVersion")
		.set_value(&mut project, "android-34")?;
	assert!(project.session().cache().is_empty());
	assert_eq!(
		lib.property("android.compileSdkVersion").value::<String>(&project).as_deref(),
		Some("android-34")
	);

	Ok(())
}

// --- Persistence tests ---

#[test]
fn apply_and_reparse_round_trip() -> DslResult<()> {
	let (source, mut project) = multi_project()?;
	let lib = project.build_model(":lib")?;

	lib.dependencies()
		.add_artifact(&mut project, "testImplementation", "junit:junit:4.13.2")?;
	assert!(lib.is_modified(&project));
	assert!(project.is_modified());

	project.apply_changes()?;
	assert!(!project.is_modified());
	assert_eq!(
		text_of(&source, "lib/build.gradle"),
		"android {\n    compileSdkVersion = parent.android.compileSdkVersion\n}\ndependencies \
		 {\n    implementation \"org.jetbrains.kotlin:kotlin-stdlib:$kotlinVersion\"\n    \
		 testImplementation 'junit:junit:4.13.2'\n}\n"
	);

	project.reparse()?;
	let lib = project.build_model(":lib")?;
	let configurations: Vec<String> = lib
		.dependencies()
		.artifacts(&project)
		.iter()
		.map(|artifact| artifact.configuration(&project))
		.collect();
	assert_eq!(
		configurations,
		vec!["implementation".to_string(), "testImplementation".to_string()]
	);

	Ok(())
}

#[test]
fn rejected_write_keeps_file_dirty() -> DslResult<()> {
	let (source, mut project) = single_build("version = '1.0'\n")?;
	let build = project.root_build_model()?;

	build.property("version").set_value(&mut project, "2.0")?;
	source.reject_writes(true);

	let result = project.apply_changes();
	assert!(matches!(result, Err(DslError::WriteRejected { .. })));
	assert!(build.is_modified(&project));
	assert_eq!(text_of(&source, "build.gradle"), "version = '1.0'\n");

	source.reject_writes(false);
	project.apply_changes()?;
	assert!(!build.is_modified(&project));
	assert_eq!(text_of(&source, "build.gradle"), "version = '2.0'\n");

	Ok(())
}

#[test]
fn applied_file_stays_clean_when_the_source_cannot_be_reread() -> DslResult<()> {
	let source = Arc::new(UnreadableAfterWrite::default());
	source.inner.add_dir(ROOT);
	source.inner.insert(repo_path("settings.gradle"), "");
	source.inner.insert(repo_path("build.gradle"), "version = '1.0'\n");
	let mut project = Project::open_with(ROOT, Arc::clone(&source))?;
	let build = project.root_build_model()?;

	build.property("group").set_value(&mut project, "com.example")?;
	project.apply_changes()?;
	assert!(!project.is_modified());

	project.apply_changes()?;
	assert_eq!(
		text_of(&source.inner, "build.gradle"),
		"version = '1.0'\ngroup = 'com.example'\n"
	);
	assert_eq!(
		build.property("group").value::<String>(&project).as_deref(),
		Some("com.example")
	);

	Ok(())
}

#[test]
fn reset_state_discards_edits() -> DslResult<()> {
	let (source, mut project) = single_build("version = '1.0'\n")?;
	let build = project.root_build_model()?;

	build.property("version").set_value(&mut project, "2.0")?;
	build.property("group").set_value(&mut project, "com.example")?;
	assert_eq!(build.property("version").value::<String>(&project).as_deref(), Some("2.0"));

	project.reset_state()?;
	assert!(!project.is_modified());
	assert_eq!(build.property("version").value::<String>(&project).as_deref(), Some("1.0"));
	assert!(!build.property("group").exists(&project));
	assert_eq!(text_of(&source, "build.gradle"), "version = '1.0'\n");

	Ok(())
}

#[test]
fn reparse_file_discards_edits_of_one_file() -> DslResult<()> {
	let (_, mut project) = multi_project()?;
	let root = project.root_build_model()?;
	let lib = project.build_model(":lib")?;

	root.ext().set(&mut project, "kotlinVersion", "2.0.0")?;
	lib.property("version").set_value(&mut project, "1.0")?;
	lib.reparse(&mut project)?;

	assert!(!lib.is_modified(&project));
	assert!(root.is_modified(&project));

	Ok(())
}

#[test]
fn file_system_source_round_trip() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("settings.gradle"), "include ':app'\n")?;
	std::fs::write(tmp.path().join("build.gradle"), "ext {\n    minSdk = 21\n}\n")?;
	std::fs::create_dir(tmp.path().join("app"))?;
	std::fs::write(
		tmp.path().join("app/build.gradle"),
		"android {\n    minSdkVersion rootProject.ext.minSdk\n}\n",
	)?;

	let mut project = Project::open(tmp.path())?;
	let root = project.root_build_model()?;
	let app = project.build_model(":app")?;

	assert_eq!(
		app.property("android.minSdkVersion").value::<u32>(&project),
		Some(21)
	);

	root.ext().set(&mut project, "minSdk", 24_i64)?;
	root.ext().set(&mut project, "targetSdk", 34_i64)?;
	project.apply_changes()?;

	assert_eq!(
		std::fs::read_to_string(tmp.path().join("build.gradle"))?,
		"ext {\n    minSdk = 24\n    targetSdk = 34\n}\n"
	);
	assert_eq!(
		app.property("android.minSdkVersion").value::<u32>(&project),
		Some(24)
	);

	Ok(())
}

#[test]
fn missing_build_file_reads_as_empty() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("settings.gradle"), "include ':empty'\n")?;
	std::fs::create_dir(tmp.path().join("empty"))?;

	let mut project = Project::open(tmp.path())?;
	let empty = project.build_model(":empty")?;
	assert_eq!(
		empty.path(&project).to_path_buf(),
		tmp.path().join("empty/build.gradle")
	);

	empty.property("version").set_value(&mut project, "1.0")?;
	project.apply_changes()?;

	assert_eq!(
		std::fs::read_to_string(tmp.path().join("empty/build.gradle"))?,
		"version = '1.0'\n"
	);

	Ok(())
}

// --- Hierarchy tests ---

#[test]
fn missing_project_directory_is_reported() -> DslResult<()> {
	let (source, project) = memory_project(&[
		("settings.gradle", "include ':lib', ':missing'\n"),
		("lib/build.gradle", ""),
	])?;

	assert_eq!(project.graph().len(), 2);
	assert!(project.graph().find(":missing").is_none());
	assert!(project.diagnostics().iter().any(|diagnostic| {
		matches!(
			&diagnostic.kind,
			DiagnosticKind::MalformedHierarchy { path, .. } if path == ":missing"
		)
	}));

	let strict = build_graph(
		"include ':lib', ':missing'\n",
		std::path::Path::new(ROOT),
		&*source,
	);
	assert!(matches!(
		strict,
		Err(DslError::MalformedHierarchy { path, .. }) if path == ":missing"
	));

	Ok(())
}

#[test]
fn unknown_project_path_is_an_error() -> DslResult<()> {
	let (_, project) = multi_project()?;

	assert!(matches!(
		project.build_model(":nope"),
		Err(DslError::UnknownProject(path)) if path == ":nope"
	));

	Ok(())
}

#[test]
fn nested_projects_have_nested_parents() -> DslResult<()> {
	let (_, project) = memory_project(&[
		("settings.gradle", "include ':libs', ':libs:core'\n"),
		("libs/build.gradle", ""),
		("libs/core/build.gradle", ""),
	])?;
	let settings = project.settings_model();

	assert_eq!(settings.parent_module(&project, ":libs:core").as_deref(), Some(":libs"));
	assert_eq!(settings.parent_module(&project, ":libs").as_deref(), Some(":"));
	assert_eq!(
		settings.module_directory(&project, "libs:core"),
		Some(repo_path("libs/core"))
	);
	assert_eq!(settings.root_project_name(&project), "repo");

	Ok(())
}

#[test]
fn every_project_is_linked_to_its_build_file() -> DslResult<()> {
	let (_, project) = multi_project()?;
	let graph = project.graph();

	assert_eq!(graph.len(), 2);
	for (_, node) in graph.nodes() {
		let file = node.file().unwrap_or_else(|| panic!("unlinked project: {}", node.path));
		assert_eq!(project.file(file).path(), node.build_file.as_path());
	}
	assert_eq!(project.files().count(), 3);

	Ok(())
}

#[test]
fn project_dir_and_build_file_overrides() -> DslResult<()> {
	let (_, project) = memory_project(&[
		(
			"settings.gradle",
			"include ':lib'\nproject(':lib').projectDir = file('libs/core')\nproject(':lib').buildFileName \
			 = 'core.gradle'\n",
		),
		("libs/core/core.gradle", "version = '2.0'\n"),
	])?;
	let settings = project.settings_model();

	assert_eq!(
		settings.module_directory(&project, ":lib"),
		Some(repo_path("libs/core"))
	);
	assert_eq!(
		settings.build_file(&project, ":lib"),
		Some(repo_path("libs/core/core.gradle"))
	);
	assert_eq!(
		settings
			.module_with_directory(&project, &repo_path("libs/core"))
			.as_deref(),
		Some(":lib")
	);
	assert_eq!(
		project
			.build_model(":lib")?
			.property("version")
			.value::<String>(&project)
			.as_deref(),
		Some("2.0")
	);

	Ok(())
}

#[test]
fn list_declared_subprojects_in_order() {
	let paths = list_declared_subprojects("include 'app'\ninclude(':lib', ':app')\ninclude ':a:b'\n");

	assert_eq!(
		paths,
		vec![":app".to_string(), ":lib".to_string(), ":a:b".to_string()]
	);
}

// --- Settings model tests ---

#[test]
fn settings_add_and_remove_module() -> DslResult<()> {
	let (source, mut project) = memory_project(&[
		("settings.gradle", "rootProject.name = 'sample'\ninclude ':app'\n"),
		("app/build.gradle", ""),
	])?;
	source.add_dir(repo_path("lib"));
	let settings = project.settings_model();

	settings.add_module_path(&mut project, "lib")?;
	assert_eq!(
		settings.module_paths(&project),
		vec![":".to_string(), ":app".to_string(), ":lib".to_string()]
	);
	assert!(project.graph().find(":lib").is_none());

	settings.apply_changes(&mut project)?;
	assert!(project.graph().find(":lib").is_some());
	assert_eq!(
		text_of(&source, "settings.gradle"),
		"rootProject.name = 'sample'\ninclude ':app'\ninclude ':lib'\n"
	);

	assert!(settings.remove_module_path(&mut project, ":app")?);
	assert!(!settings.remove_module_path(&mut project, ":app")?);
	settings.apply_changes(&mut project)?;
	assert_eq!(
		text_of(&source, "settings.gradle"),
		"rootProject.name = 'sample'\ninclude ':lib'\n"
	);
	assert!(project.build_model(":app").is_err());

	Ok(())
}

#[test]
fn settings_remove_one_of_many_includes() -> DslResult<()> {
	let (source, mut project) = memory_project(&[
		(
			"settings.gradle",
			"include ':app', ':lib'\nproject(':app').projectDir = file('application')\n",
		),
		("application/build.gradle", ""),
		("lib/build.gradle", ""),
	])?;
	let settings = project.settings_model();

	assert!(settings.remove_module_path(&mut project, ":app")?);
	settings.apply_changes(&mut project)?;

	assert_eq!(text_of(&source, "settings.gradle"), "include ':lib'\n");
	assert_eq!(
		settings.module_paths(&project),
		vec![":".to_string(), ":lib".to_string()]
	);

	Ok(())
}

// --- Plugin model tests ---

#[test]
fn apply_plugin_to_existing_block() -> DslResult<()> {
	let (source, mut project) = single_build("plugins {\n    id 'java'\n}\n")?;
	let plugins = project.root_build_model()?.plugins();

	plugins.apply_plugin(&mut project, "org.jetbrains.kotlin.jvm", Some("1.9.0"), None)?;
	let again = plugins.apply_plugin(&mut project, "java", None, None)?;
	assert_eq!(again.name(&project).as_deref(), Some("java"));
	project.apply_changes()?;

	assert_eq!(
		text_of(&source, "build.gradle"),
		"plugins {\n    id 'java'\n    id 'org.jetbrains.kotlin.jvm' version '1.9.0'\n}\n"
	);

	let kotlin = plugins
		.plugin(&project, "org.jetbrains.kotlin.jvm")
		.unwrap_or_else(|| panic!("kotlin plugin is declared"));
	assert_eq!(kotlin.version(&project).as_deref(), Some("1.9.0"));

	Ok(())
}

#[test]
fn set_apply_turns_call_into_infix() -> DslResult<()> {
	let (source, mut project) = single_build("plugins {\n    id 'java'\n    id 'maven-publish'\n}\n")?;
	let build = project.root_build_model()?;
	let java = build
		.plugins()
		.plugin(&project, "java")
		.unwrap_or_else(|| panic!("java plugin is declared"));

	java.set_apply(&mut project, false)?;
	let applied: Vec<String> = build
		.applied_plugins(&project)
		.iter()
		.filter_map(|plugin| plugin.name(&project))
		.collect();
	assert_eq!(applied, vec!["maven-publish".to_string()]);
	project.apply_changes()?;

	assert_eq!(
		text_of(&source, "build.gradle"),
		"plugins {\n    id 'java' apply false\n    id 'maven-publish'\n}\n"
	);

	Ok(())
}

#[test]
fn new_plugins_block_goes_after_buildscript() -> DslResult<()> {
	let (source, mut project) = single_build(
		"buildscript {\n    repositories {\n        google()\n    }\n}\n\nversion = '1.0'\n",
	)?;
	let build = project.root_build_model()?;

	build.apply_plugin(&mut project, "java")?;
	project.apply_changes()?;

	assert_eq!(
		text_of(&source, "build.gradle"),
		"buildscript {\n    repositories {\n        google()\n    }\n}\nplugins {\n    id \
		 'java'\n}\n\nversion = '1.0'\n"
	);

	Ok(())
}

#[test]
fn apply_plugin_statements_are_listed_and_removed() -> DslResult<()> {
	let (source, mut project) =
		single_build("apply plugin: 'java'\napply plugin: 'idea'\nversion = '1.0'\n")?;
	let plugins = project.root_build_model()?.plugins();

	let names: Vec<String> = plugins
		.plugins(&project)
		.iter()
		.filter_map(|plugin| plugin.name(&project))
		.collect();
	assert_eq!(names, vec!["java".to_string(), "idea".to_string()]);

	let idea = plugins
		.plugin(&project, "idea")
		.unwrap_or_else(|| panic!("idea plugin is declared"));
	assert!(matches!(
		idea.set_version(&mut project, "1.0"),
		Err(DslError::UnwritableEdit(_))
	));

	assert!(plugins.remove_plugin(&mut project, "idea")?);
	assert!(!plugins.remove_plugin(&mut project, "idea")?);
	project.apply_changes()?;

	assert_eq!(
		text_of(&source, "build.gradle"),
		"apply plugin: 'java'\nversion = '1.0'\n"
	);

	Ok(())
}

// --- Repository model tests ---

#[test]
fn add_maven_repository_with_name() -> DslResult<()> {
	let (source, mut project) = single_build("repositories {\n    google()\n}\n")?;
	let repositories = project.root_build_model()?.repositories();

	repositories.add_maven_repository(&mut project, "https://jitpack.io", Some("JitPack"))?;
	repositories.add_google_maven_repository(&mut project)?;

	let listed: Vec<(RepositoryKind, String, Option<String>)> = repositories
		.repositories(&project)
		.iter()
		.map(|repository| {
			(
				repository.kind(),
				repository.name(&project),
				repository.url(&project),
			)
		})
		.collect();
	assert_eq!(
		listed,
		vec![
			(
				RepositoryKind::Google,
				"Google".to_string(),
				Some("https://dl.google.com/dl/android/maven2/".to_string()),
			),
			(
				RepositoryKind::Maven,
				"JitPack".to_string(),
				Some("https://jitpack.io".to_string()),
			),
		]
	);
	project.apply_changes()?;

	assert_eq!(
		text_of(&source, "build.gradle"),
		"repositories {\n    google()\n    maven {\n        name 'JitPack'\n        url \
		 'https://jitpack.io'\n    }\n}\n"
	);

	Ok(())
}

#[test]
fn repositories_in_buildscript_and_settings() -> DslResult<()> {
	let (source, mut project) = memory_project(&[
		(
			"settings.gradle",
			"pluginManagement {\n    repositories {\n        gradlePluginPortal()\n    }\n}\n",
		),
		("build.gradle", "buildscript {\n    repositories {\n        jcenter()\n    }\n}\n"),
	])?;
	let build = project.root_build_model()?;
	let settings = project.settings_model();

	assert!(build.buildscript().repositories().contains_method_call(&project, "jcenter"));
	assert!(!build.repositories().contains_method_call(&project, "jcenter"));
	assert!(
		settings
			.plugin_management()
			.repositories()
			.contains_method_call(&project, "gradlePluginPortal")
	);

	let jcenter = build.buildscript().repositories().repositories(&project)[0];
	assert_eq!(jcenter.name(&project), "BintrayJCenter2");
	build
		.buildscript()
		.repositories()
		.remove_repository(&mut project, &jcenter)?;
	build
		.buildscript()
		.repositories()
		.add_repository_by_method_name(&mut project, "mavenCentral")?;
	project.apply_changes()?;

	assert_eq!(
		text_of(&source, "build.gradle"),
		"buildscript {\n    repositories {\n        mavenCentral()\n    }\n}\n"
	);

	Ok(())
}

// --- Dependency model tests ---

#[rstest]
#[case::full("g:n:1.0:sources@jar", Some("g"), "n", Some("1.0"), Some("sources"), Some("jar"))]
#[case::without_version("g:n", Some("g"), "n", None, None, None)]
#[case::name_only("n", None, "n", None, None, None)]
fn parse_artifact_coordinates(
	#[case] notation: &str,
	#[case] group: Option<&str>,
	#[case] name: &str,
	#[case] version: Option<&str>,
	#[case] classifier: Option<&str>,
	#[case] extension: Option<&str>,
) {
	let coordinate = ArtifactCoordinate::parse(notation)
		.unwrap_or_else(|| panic!("valid notation: {notation}"));

	assert_eq!(coordinate.group.as_deref(), group);
	assert_eq!(coordinate.name, name);
	assert_eq!(coordinate.version.as_deref(), version);
	assert_eq!(coordinate.classifier.as_deref(), classifier);
	assert_eq!(coordinate.extension.as_deref(), extension);
	assert_eq!(coordinate.to_string(), notation);
}

#[test]
fn dependencies_of_every_shape() -> DslResult<()> {
	let (_, project) = memory_project(&[
		("settings.gradle", "include ':core'\n"),
		(
			"build.gradle",
			"dependencies {\n    implementation 'a:b:1', 'c:d:2'\n    api group: 'e', name: 'f', \
			 version: '3'\n    implementation platform('g:h:4')\n    implementation project(':core')\n    \
			 implementation fileTree(dir: 'libs')\n}\n",
		),
		("core/build.gradle", ""),
	])?;
	let dependencies = project.root_build_model()?.dependencies();

	let notations: Vec<String> = dependencies
		.artifacts(&project)
		.iter()
		.filter_map(|artifact| artifact.notation(&project))
		.collect();
	assert_eq!(
		notations,
		vec![
			"a:b:1".to_string(),
			"c:d:2".to_string(),
			"e:f:3".to_string(),
			"g:h:4".to_string(),
		]
	);

	let modules = dependencies.modules(&project);
	assert_eq!(modules.len(), 1);
	assert_eq!(modules[0].path(&project).as_deref(), Some(":core"));
	assert_eq!(modules[0].configuration(&project), "implementation");

	Ok(())
}

#[test]
fn remove_dependency_deletes_its_line() -> DslResult<()> {
	let (source, mut project) = single_build(
		"dependencies {\n    implementation 'a:b:1'\n    testImplementation 'c:d:2'\n}\n",
	)?;
	let dependencies = project.root_build_model()?.dependencies();

	assert!(!dependencies.remove(&mut project, "implementation", "c:d")?);
	assert!(dependencies.remove(&mut project, "testImplementation", "c:d")?);
	project.apply_changes()?;

	assert_eq!(
		text_of(&source, "build.gradle"),
		"dependencies {\n    implementation 'a:b:1'\n}\n"
	);

	Ok(())
}

#[test]
fn set_dependency_version() -> DslResult<()> {
	let (source, mut project) = single_build(
		"dependencies {\n    implementation 'a:b:1'\n    api group: 'e', name: 'f', version: '3'\n    \
		 implementation deps.okio\n}\n",
	)?;
	let dependencies = project.root_build_model()?.dependencies();
	let artifacts = dependencies.artifacts(&project);

	artifacts[0].set_version(&mut project, "2")?;
	artifacts[1].set_version(&mut project, "4")?;
	assert!(matches!(
		artifacts[2].set_version(&mut project, "1"),
		Err(DslError::UnwritableEdit(_))
	));
	project.apply_changes()?;

	assert_eq!(
		text_of(&source, "build.gradle"),
		"dependencies {\n    implementation 'a:b:2'\n    api group: 'e', name: 'f', version: '4'\n    \
		 implementation deps.okio\n}\n"
	);

	Ok(())
}

#[test]
fn add_module_dependency_and_reject_bad_notation() -> DslResult<()> {
	let (source, mut project) = memory_project(&[
		("settings.gradle", "include ':core'\n"),
		("build.gradle", "dependencies {\n}\n"),
		("core/build.gradle", ""),
	])?;
	let dependencies = project.root_build_model()?.dependencies();

	dependencies.add_module(&mut project, "api", "core")?;
	assert!(matches!(
		dependencies.add_artifact(&mut project, "implementation", ""),
		Err(DslError::UnwritableEdit(_))
	));
	project.apply_changes()?;

	assert_eq!(
		text_of(&source, "build.gradle"),
		"dependencies {\n    api project(':core')\n}\n"
	);

	Ok(())
}

// --- Version catalog tests ---

#[test]
fn default_catalog_resolves_plugins_and_libraries() -> DslResult<()> {
	let (_, project) = memory_project(&[
		("settings.gradle", ""),
		("gradle/libs.versions.toml", CATALOG),
		(
			"build.gradle",
			"plugins {\n    alias(libs.plugins.android.application)\n}\ndependencies {\n    \
			 implementation libs.okio\n    implementation libs.androidx.core.ktx\n}\next.agp = \
			 libs.versions.agp\n",
		),
	])?;
	let build = project.root_build_model()?;

	assert_eq!(project.catalogs().len(), 1);
	assert_eq!(project.catalogs()[0].name, "libs");

	let plugin = build.plugins().plugins(&project)[0];
	assert_eq!(plugin.name(&project).as_deref(), Some("com.android.application"));
	assert_eq!(plugin.version(&project).as_deref(), Some("8.2.0"));

	let artifacts = build.dependencies().artifacts(&project);
	let notations: Vec<String> = artifacts
		.iter()
		.filter_map(|artifact| artifact.notation(&project))
		.collect();
	assert_eq!(
		notations,
		vec![
			"com.squareup.okio:okio:3.9.0".to_string(),
			"androidx.core:core-ktx:1.12.0".to_string(),
		]
	);
	assert_eq!(artifacts[0].reference_text(&project).as_deref(), Some("libs.okio"));
	assert_eq!(
		build.ext().property("agp").value::<String>(&project).as_deref(),
		Some("8.2.0")
	);

	Ok(())
}

#[test]
fn catalog_bundles_resolve_to_lists() -> DslResult<()> {
	let catalog = VersionCatalog::parse("libs", "gradle/libs.versions.toml", CATALOG)?;

	assert_eq!(
		catalog.lookup(&["bundles".to_string(), "io".to_string()]),
		Some(Value::List(vec![Value::string("com.squareup.okio:okio:3.9.0")]))
	);
	assert_eq!(normalize_alias("androidx-core_ktx"), "androidx.core.ktx");
	assert!(matches!(
		VersionCatalog::parse("libs", "broken.toml", "[versions"),
		Err(DslError::CatalogParse { .. })
	));

	Ok(())
}

#[test]
fn declared_catalogs_are_read_and_edited() -> DslResult<()> {
	let (source, mut project) = memory_project(&[
		(
			"settings.gradle",
			"dependencyResolutionManagement {\n    versionCatalogs {\n        deps {\n            \
			 from(files('gradle/deps.versions.toml'))\n        }\n    }\n}\n",
		),
		("gradle/deps.versions.toml", CATALOG),
		("build.gradle", "ext.okio = deps.versions.okio\n"),
	])?;
	let management = project.settings_model().dependency_resolution_management();

	let names: Vec<String> = project.catalogs().iter().map(|catalog| catalog.name.clone()).collect();
	assert_eq!(names, vec!["deps".to_string()]);
	assert_eq!(
		project
			.root_build_model()?
			.ext()
			.property("okio")
			.value::<String>(&project)
			.as_deref(),
		Some("3.9.0")
	);

	let deps = management
		.version_catalog(&project, "deps")
		.unwrap_or_else(|| panic!("deps catalog is declared"));
	assert_eq!(deps.from(&project).as_deref(), Some("gradle/deps.versions.toml"));

	let tools = management.add_version_catalog(&mut project, "tools")?;
	tools.set_from(&mut project, "gradle/tools.versions.toml")?;
	project.apply_changes()?;

	assert_eq!(
		text_of(&source, "settings.gradle"),
		"dependencyResolutionManagement {\n    versionCatalogs {\n        deps {\n            \
		 from(files('gradle/deps.versions.toml'))\n        }\n        tools {\n            \
		 from(files('gradle/tools.versions.toml'))\n        }\n    }\n}\n"
	);
	assert_eq!(project.catalogs().len(), 2);

	assert!(management.remove_version_catalog(&mut project, "tools")?);
	assert!(management.version_catalog(&project, "tools").is_none());

	Ok(())
}

#[test]
fn disabled_catalogs_do_not_resolve() -> DslResult<()> {
	let (_, project) = memory_project(&[
		("gdsl.toml", "[catalogs]\nenabled = false\n"),
		("settings.gradle", ""),
		("gradle/libs.versions.toml", CATALOG),
		("build.gradle", "ext.agp = libs.versions.agp\n"),
	])?;

	assert!(project.catalogs().is_empty());
	assert_eq!(
		project.root_build_model()?.ext().property("agp").resolved(&project),
		None
	);

	Ok(())
}

// --- Java model tests ---

#[test]
fn language_levels_keep_their_shape() -> DslResult<()> {
	let (source, mut project) = single_build(
		"sourceCompatibility = JavaVersion.VERSION_1_8\ntargetCompatibility = 1.8\njava {\n    \
		 toolchain {\n    }\n}\n",
	)?;
	let java = project.root_build_model()?.java();
	let source_level = java.source_compatibility(&project);
	let target_level = java.target_compatibility(&project);

	assert_eq!(source_level.language_level(&project), Some(LanguageLevel::JDK_1_8));
	assert_eq!(target_level.language_level(&project), Some(LanguageLevel::JDK_1_8));

	source_level.set_language_level(&mut project, LanguageLevel::JDK_17)?;
	target_level.set_language_level(&mut project, LanguageLevel::JDK_17)?;
	project.apply_changes()?;

	assert_eq!(
		text_of(&source, "build.gradle"),
		"sourceCompatibility = JavaVersion.VERSION_17\ntargetCompatibility = 17\njava {\n    \
		 toolchain {\n    }\n}\n"
	);

	Ok(())
}

#[rstest]
#[case::legacy("1.8", Some(8))]
#[case::feature("11", Some(11))]
#[case::constant("JavaVersion.VERSION_1_7", Some(7))]
#[case::short_constant("VERSION_17", Some(17))]
#[case::padded("1.80", None)]
fn parse_language_levels(#[case] text: &str, #[case] feature: Option<u8>) {
	assert_eq!(LanguageLevel::parse(text).map(LanguageLevel::feature), feature);
}

// --- Block model tests ---

#[test]
fn block_properties_and_deletion() -> DslResult<()> {
	let (source, mut project) = single_build(
		"android {\n    compileSdkVersion 34\n    defaultConfig {\n        minSdkVersion 21\n    \
		 }\n}\nandroid.defaultConfig {\n    targetSdkVersion 34\n}\nversion = '1.0'\n",
	)?;
	let build = project.root_build_model()?;
	let default_config = build.android().block("defaultConfig");

	assert_eq!(default_config.elements(&project).len(), 2);
	assert_eq!(
		default_config.properties(&project),
		vec!["minSdkVersion".to_string(), "targetSdkVersion".to_string()]
	);
	assert_eq!(
		default_config
			.property("targetSdkVersion")
			.value::<u32>(&project),
		Some(34)
	);

	assert!(build.block("android.defaultConfig").delete(&mut project)?);
	project.apply_changes()?;

	assert_eq!(
		text_of(&source, "build.gradle"),
		"android {\n    compileSdkVersion 34\n}\nversion = '1.0'\n"
	);

	Ok(())
}

// --- Config tests ---

#[test]
fn config_defaults_and_overrides() -> DslResult<()> {
	let source = MemoryTextSource::new().with_file(
		"/repo/.config/gdsl.toml",
		"[files]\nbuild = [\"build.groovy\", \"build.gradle\"]\n",
	);
	let root = std::path::Path::new(ROOT);

	assert_eq!(
		GdslConfig::resolve_path(root, &source),
		Some(PathBuf::from("/repo/.config/gdsl.toml"))
	);
	let config = GdslConfig::load(root, &source)?.unwrap_or_default();
	assert_eq!(config.files.build, vec!["build.groovy".to_string(), "build.gradle".to_string()]);
	assert_eq!(config.files.settings, vec!["settings.gradle".to_string()]);
	assert!(config.catalogs.enabled);
	assert_eq!(config.write.indent, "    ");

	assert_eq!(GdslConfig::load(std::path::Path::new("/elsewhere"), &source)?, None);

	Ok(())
}

#[test]
fn invalid_config_fails_to_open() {
	let result = memory_project(&[("gdsl.toml", "[files\n"), ("settings.gradle", "")]);

	assert!(matches!(result, Err(DslError::ConfigParse(_))));
}

#[test]
fn diagnostics_point_at_files() -> DslResult<()> {
	let (_, project) = memory_project(&[
		("settings.gradle", ""),
		("build.gradle", "version = major + '.1'\nandroid {\n"),
	])?;
	let build_path = repo_path("build.gradle");

	let kinds: Vec<&DiagnosticKind> = project
		.diagnostics()
		.iter()
		.filter(|diagnostic| diagnostic.file == build_path)
		.map(|diagnostic| &diagnostic.kind)
		.collect();
	assert_eq!(kinds.len(), 2);
	assert!(project.diagnostics().iter().any(ProjectDiagnostic::is_error));
	assert!(
		project
			.diagnostics()
			.iter()
			.any(|diagnostic| diagnostic.message() == "block `android` is never closed")
	);

	Ok(())
}
