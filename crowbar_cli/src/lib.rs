use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Expand generator blocks embedded in source file comments, in place.",
	long_about = "crowbar is an in-place code generator. Source files carry generator code \
	              inside comment blocks:\n\n  # <<crowbar\n  # {{ emit(\"x = 1\") }}\n  # >>\n  \
	              x = 1\n  # <<end>>\n\nRunning crowbar evaluates every block in order and \
	              replaces the text between `>>` and `<<end>>` with the block's output. The file \
	              is only written when every block succeeds.\n\nQuick start:\n  crowbar \
	              src/gen.rs           Regenerate in place\n  crowbar in.rs out.rs         \
	              Write the result elsewhere\n  crowbar --check src/gen.rs   Fail when the file \
	              is out of date"
)]
#[allow(clippy::struct_excessive_bools)]
pub struct CrowbarCli {
	/// File to process.
	pub input: PathBuf,

	/// Where to write the result. Defaults to rewriting the input in place.
	pub output: Option<PathBuf>,

	/// Drop markers and generator code from the output, keeping only the
	/// generated text. Requires an output different from the input.
	#[arg(long, default_value_t = false)]
	pub no_code_blocks: bool,

	/// String added per indentation level. Overrides `indent_step` from
	/// `crowbar.toml`.
	#[arg(long)]
	pub indent_step: Option<String>,

	/// Indentation prepended to every generated line. Overrides `base_indent`
	/// from `crowbar.toml`.
	#[arg(long)]
	pub base_indent: Option<String>,

	/// Directory containing `crowbar.toml`. Defaults to the directory of the
	/// input file.
	#[arg(long, short)]
	pub config: Option<PathBuf>,

	/// Render without writing and exit with status 1 when the output would
	/// change.
	#[arg(long, default_value_t = false)]
	pub check: bool,

	/// With `--check`, print a diff of the changes that would be written.
	#[arg(long, default_value_t = false, requires = "check")]
	pub diff: bool,

	/// Enable verbose output.
	#[arg(long, short, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, default_value_t = false)]
	pub no_color: bool,
}
