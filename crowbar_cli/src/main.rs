use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use crowbar_cli::CrowbarCli;
use crowbar_core::AnyEmptyResult;
use crowbar_core::AnyResult;
use crowbar_core::ProcessOptions;
use crowbar_core::check_file;
use crowbar_core::process_file;
use owo_colors::OwoColorize;
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
}

fn main() {
	let args = CrowbarCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let default_level = if args.verbose { "debug" } else { "warn" };
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.init();

	let result = if args.check {
		run_check(&args)
	} else {
		run_process(&args)
	};

	if let Err(e) = result {
		match e.downcast::<crowbar_core::CrowbarError>() {
			Ok(crowbar_err) => {
				let report: miette::Report = (*crowbar_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// The directory `crowbar.toml` is discovered from.
fn resolve_config_root(args: &CrowbarCli) -> PathBuf {
	if let Some(dir) = &args.config {
		return dir.clone();
	}

	args.input
		.parent()
		.filter(|parent| !parent.as_os_str().is_empty())
		.map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

fn load_options(args: &CrowbarCli) -> AnyResult<ProcessOptions> {
	let mut options = ProcessOptions::load(&resolve_config_root(args))?;
	options.omit_code_blocks = args.no_code_blocks;
	if let Some(step) = &args.indent_step {
		options.indent_step.clone_from(step);
	}
	if let Some(base) = &args.base_indent {
		options.base_indent.clone_from(base);
	}
	Ok(options)
}

fn run_process(args: &CrowbarCli) -> AnyEmptyResult {
	let options = load_options(args)?;
	let report = process_file(&args.input, args.output.as_deref(), &options)?;

	if report.changed {
		println!(
			"{} {} ({} block{})",
			colored!("Updated", green),
			report.destination.display(),
			report.blocks,
			plural(report.blocks)
		);
	} else {
		println!(
			"{} is up to date ({} block{}).",
			report.destination.display(),
			report.blocks,
			plural(report.blocks)
		);
	}

	Ok(())
}

fn run_check(args: &CrowbarCli) -> AnyEmptyResult {
	let options = load_options(args)?;
	let result = check_file(&args.input, args.output.as_deref(), &options)?;

	if !result.is_stale() {
		println!(
			"Check passed: {} is up to date.",
			result.destination.display()
		);
		return Ok(());
	}

	eprintln!(
		"{} {} is out of date.",
		colored!("stale:", yellow),
		result.destination.display()
	);
	if args.diff {
		print_diff(result.current.as_deref().unwrap_or(""), &result.rendered);
	}
	eprintln!("\nRun `crowbar` without `--check` to regenerate it.");
	process::exit(1);
}

fn print_diff(current: &str, expected: &str) {
	let diff = TextDiff::from_lines(current, expected);
	for change in diff.iter_all_changes() {
		match change.tag() {
			ChangeTag::Delete => {
				eprint!("  {}", colored!(format!("-{change}"), red));
			}
			ChangeTag::Insert => {
				eprint!("  {}", colored!(format!("+{change}"), green));
			}
			ChangeTag::Equal => {
				eprint!("   {change}");
			}
		}
	}
}

fn plural(count: usize) -> &'static str {
	if count == 1 { "" } else { "s" }
}
