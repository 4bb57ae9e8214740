mod common;

use clap::Parser;
use crowbar_cli::CrowbarCli;
use crowbar_core::AnyEmptyResult;
use predicates::prelude::PredicateBooleanExt;
use similar_asserts::assert_eq;

#[test]
fn process_rewrites_the_input_in_place() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let input = tmp.path().join("main.rs");
	std::fs::write(&input, common::GREETING_SOURCE)?;

	common::crowbar_cmd()
		.arg(&input)
		.assert()
		.success()
		.stdout(predicates::str::contains("Updated").and(predicates::str::contains("1 block")));

	assert_eq!(std::fs::read_to_string(&input)?, common::GREETING_RENDERED);

	Ok(())
}

#[test]
fn process_reports_up_to_date_files() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let input = tmp.path().join("main.rs");
	std::fs::write(&input, common::GREETING_RENDERED)?;

	common::crowbar_cmd()
		.arg(&input)
		.assert()
		.success()
		.stdout(predicates::str::contains("is up to date"));

	Ok(())
}

#[test]
fn process_writes_to_separate_output() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let input = tmp.path().join("main.rs.in");
	let output = tmp.path().join("main.rs");
	std::fs::write(&input, common::GREETING_SOURCE)?;

	common::crowbar_cmd()
		.arg(&input)
		.arg(&output)
		.assert()
		.success();

	assert_eq!(std::fs::read_to_string(&input)?, common::GREETING_SOURCE);
	assert_eq!(std::fs::read_to_string(&output)?, common::GREETING_RENDERED);

	Ok(())
}

#[test]
fn process_no_code_blocks_keeps_only_output() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let input = tmp.path().join("main.rs.in");
	let output = tmp.path().join("main.rs");
	std::fs::write(&input, common::GREETING_SOURCE)?;

	common::crowbar_cmd()
		.arg("--no-code-blocks")
		.arg(&input)
		.arg(&output)
		.assert()
		.success();

	assert_eq!(
		std::fs::read_to_string(&output)?,
		"fn main() {\n\tprintln!(\"hi ada\");\n\tprintln!(\"hi grace\");\n}\n"
	);

	Ok(())
}

#[test]
fn process_no_code_blocks_in_place_fails() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let input = tmp.path().join("main.rs");
	std::fs::write(&input, common::GREETING_SOURCE)?;

	common::crowbar_cmd()
		.arg("--no-code-blocks")
		.arg(&input)
		.assert()
		.code(2)
		.stderr(predicates::str::contains("removing code blocks"));

	assert_eq!(std::fs::read_to_string(&input)?, common::GREETING_SOURCE);

	Ok(())
}

#[test]
fn process_failure_leaves_file_untouched() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let input = tmp.path().join("script.py");
	let content = concat!(
		"# <<crowbar\n",
		"# {{ emit(\"ok\") }}\n",
		"# >>\n",
		"stale\n",
		"# <<end>>\n",
		"# <<crowbar\n",
		"# {{ missing_function() }}\n",
		"# >>\n",
		"# <<end>>\n",
	);
	std::fs::write(&input, content)?;

	common::crowbar_cmd()
		.arg(&input)
		.assert()
		.code(2)
		.stderr(
			predicates::str::contains("crowbar::code_evaluation")
				.and(predicates::str::contains("starting at line 6")),
		);

	assert_eq!(std::fs::read_to_string(&input)?, content);

	Ok(())
}

#[test]
fn process_reports_unterminated_block() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let input = tmp.path().join("script.py");
	std::fs::write(&input, "# <<crowbar\n# {{ emit(\"x\") }}\n")?;

	common::crowbar_cmd()
		.arg(&input)
		.assert()
		.code(2)
		.stderr(predicates::str::contains("end of its code section"));

	Ok(())
}

#[test]
fn process_missing_input_fails() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::crowbar_cmd()
		.arg(tmp.path().join("missing.rs"))
		.assert()
		.code(2);

	Ok(())
}

#[test]
fn process_indent_flags_override_config() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("crowbar.toml"), "indent_step = \"  \"\n")?;
	let input = tmp.path().join("gen.py");
	std::fs::write(
		&input,
		"# <<crowbar\n# {{ emit(\"a:\", indent, \"b\") }}\n# >>\n# <<end>>\n",
	)?;

	common::crowbar_cmd()
		.arg("--indent-step")
		.arg("    ")
		.arg("--base-indent")
		.arg("> ")
		.arg(&input)
		.assert()
		.success();

	assert_eq!(
		std::fs::read_to_string(&input)?,
		"# <<crowbar\n# {{ emit(\"a:\", indent, \"b\") }}\n# >>\n> a:\n>     b\n# <<end>>\n"
	);

	Ok(())
}

#[test]
fn process_uses_config_markers_and_data() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(
		tmp.path().join("crowbar.toml"),
		concat!(
			"[markers]\n",
			"start = \"[[gen\"\n",
			"code_end = \"]]\"\n",
			"end = \"[[/gen]]\"\n",
			"\n",
			"[data]\n",
			"pkg = \"package.json\"\n",
		),
	)?;
	std::fs::write(tmp.path().join("package.json"), r#"{"name": "widget"}"#)?;
	let input = tmp.path().join("version.js");
	std::fs::write(
		&input,
		"// [[gen {{ emit(\"const NAME = '\" ~ pkg.name ~ \"';\") }} ]]\n// [[/gen]]\n",
	)?;

	common::crowbar_cmd().arg(&input).assert().success();

	assert_eq!(
		std::fs::read_to_string(&input)?,
		"// [[gen {{ emit(\"const NAME = '\" ~ pkg.name ~ \"';\") }} ]]\nconst NAME = 'widget';\n// [[/gen]]\n"
	);

	Ok(())
}

#[test]
fn process_reads_config_from_flag() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let config_dir = tmp.path().join("config");
	std::fs::create_dir(&config_dir)?;
	std::fs::write(config_dir.join("crowbar.toml"), "unknown_key = true\n")?;
	let input = tmp.path().join("gen.py");
	std::fs::write(&input, common::GREETING_SOURCE)?;

	common::crowbar_cmd()
		.arg("--config")
		.arg(&config_dir)
		.arg(&input)
		.assert()
		.code(2)
		.stderr(predicates::str::contains("crowbar::config_parse"));

	Ok(())
}

#[test]
fn cli_parses_flags() -> AnyEmptyResult {
	let cli = CrowbarCli::try_parse_from([
		"crowbar",
		"--check",
		"--diff",
		"--indent-step",
		"\t",
		"in.rs",
		"out.rs",
	])?;

	assert!(cli.check);
	assert!(cli.diff);
	assert_eq!(cli.indent_step.as_deref(), Some("\t"));
	assert_eq!(cli.input, std::path::PathBuf::from("in.rs"));
	assert_eq!(cli.output, Some(std::path::PathBuf::from("out.rs")));

	Ok(())
}

#[test]
fn cli_diff_requires_check() {
	assert!(CrowbarCli::try_parse_from(["crowbar", "--diff", "in.rs"]).is_err());
}
