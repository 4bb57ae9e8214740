use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum CrowbarError {
	#[error(transparent)]
	#[diagnostic(code(crowbar::io_error))]
	Io(#[from] std::io::Error),

	#[error("failed to write rendered output")]
	#[diagnostic(code(crowbar::fmt_error))]
	Fmt(#[from] std::fmt::Error),

	#[error("reached end of input looking for {expected} of block starting at line {line}")]
	#[diagnostic(
		code(crowbar::unexpected_end_of_input),
		help("every `<<crowbar` needs a `>>` line followed by an `<<end>>` line")
	)]
	UnexpectedEndOfInput { line: usize, expected: &'static str },

	#[error(
		"code on line {code_line}, in block starting on line {line}, is indented inconsistently"
	)]
	#[diagnostic(
		code(crowbar::indentation_mismatch),
		help(
			"all code lines must start with the same prefix as the line holding the opening \
			 marker (`{prefix}`)"
		)
	)]
	IndentationMismatch {
		line: usize,
		code_line: usize,
		prefix: String,
	},

	#[error("code in block starting at line {line} raised an error: {message}")]
	#[diagnostic(
		code(crowbar::code_evaluation),
		help(
			"this may be caused by incorrectly indented code, every code line must follow the \
			 prefix of the opening marker. The extracted snippet was:\n{code}"
		)
	)]
	CodeEvaluation {
		/// 1-indexed line of the block's opening marker.
		line: usize,
		/// 1-indexed document line the engine blamed, when it could tell.
		error_line: Option<usize>,
		/// Engine error category, e.g. `SyntaxError` or `InvalidOperation`.
		kind: String,
		message: String,
		/// The prefix-stripped snippet that was evaluated.
		code: String,
	},

	#[error("invalid output path `{}`: exists on the file system but is not a file", .0.display())]
	#[diagnostic(code(crowbar::invalid_output_path))]
	InvalidOutputPath(PathBuf),

	#[error("{0}")]
	#[diagnostic(code(crowbar::configuration))]
	Configuration(String),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(crowbar::config_parse),
		help("check that crowbar.toml is valid TOML with optional [markers] and [data] sections")
	)]
	ConfigParse(String),

	#[error("failed to load data file `{path}`: {reason}")]
	#[diagnostic(code(crowbar::data_file))]
	DataFile { path: String, reason: String },

	#[error("emit() does not accept raw components, call `{0}` with its arguments first")]
	#[diagnostic(code(crowbar::component_not_invoked))]
	ComponentNotInvoked(String),

	#[error("component `{component}` is missing required argument `{param}`")]
	#[diagnostic(code(crowbar::missing_argument))]
	MissingArgument { component: String, param: String },

	#[error("component `{component}` takes {expected} argument(s) but {got} were given")]
	#[diagnostic(code(crowbar::too_many_arguments))]
	TooManyArguments {
		component: String,
		expected: usize,
		got: usize,
	},

	#[error("component `{component}` has no parameter named `{param}`")]
	#[diagnostic(code(crowbar::unknown_argument))]
	UnknownArgument { component: String, param: String },

	#[error("component `{component}` got multiple values for argument `{param}`")]
	#[diagnostic(code(crowbar::duplicate_argument))]
	DuplicateArgument { component: String, param: String },

	#[error("component `{component}` failed: {message}")]
	#[diagnostic(code(crowbar::component))]
	Component { component: String, message: String },
}

impl CrowbarError {
	/// Shorthand for a routine failure inside a host component.
	pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Component {
			component: component.into(),
			message: message.into(),
		}
	}
}

pub type CrowbarResult<T> = Result<T, CrowbarError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
