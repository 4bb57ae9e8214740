use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::CrowbarConfig;
use crate::CrowbarError;
use crate::CrowbarResult;
use crate::DEFAULT_INDENT_STEP;
use crate::ExecutionContext;
use crate::Markers;
use crate::Snippet;
use crate::parse_document;

/// Options for a single preprocessing pass.
///
/// Use [`ProcessOptions::default()`] for the stock markers and a two space
/// indent step, or [`ProcessOptions::load`] to read `crowbar.toml`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOptions {
	/// Drop marker and code lines from the output, keeping only rendered
	/// text. Requires a destination different from the source.
	pub omit_code_blocks: bool,
	/// String added per indentation level.
	pub indent_step: String,
	/// Indentation prepended to every block's own indentation.
	pub base_indent: String,
	pub markers: Markers,
	/// Values bound in the execution context before the first block runs.
	pub data: BTreeMap<String, serde_json::Value>,
	/// Directory `{% import %}` paths resolve against. Defaults to the
	/// directory of the processed file.
	pub template_dir: Option<PathBuf>,
}

impl Default for ProcessOptions {
	fn default() -> Self {
		Self {
			omit_code_blocks: false,
			indent_step: DEFAULT_INDENT_STEP.to_string(),
			base_indent: String::new(),
			markers: Markers::default(),
			data: BTreeMap::new(),
			template_dir: None,
		}
	}
}

impl ProcessOptions {
	/// Construct [`ProcessOptions`] from a [`CrowbarConfig`]. Data files are
	/// not read; see [`ProcessOptions::load`].
	pub fn from_config(config: Option<&CrowbarConfig>) -> Self {
		let defaults = Self::default();
		let Some(config) = config else {
			return defaults;
		};

		Self {
			indent_step: config.indent_step.clone().unwrap_or(defaults.indent_step),
			base_indent: config.base_indent.clone().unwrap_or(defaults.base_indent),
			markers: config.markers.clone(),
			..defaults
		}
	}

	/// Discover the config file in `root`, then load the data files it
	/// names.
	pub fn load(root: &Path) -> CrowbarResult<Self> {
		let config = CrowbarConfig::load(root)?;
		let mut options = Self::from_config(config.as_ref());
		if let Some(config) = &config {
			options.data = config.load_data(root)?;
		}
		Ok(options)
	}
}

/// The result of rendering a document in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
	pub content: String,
	/// Number of blocks that were evaluated.
	pub blocks: usize,
}

/// Render every block of `content` and reassemble the document.
pub fn process_str(content: &str, options: &ProcessOptions) -> CrowbarResult<Rendered> {
	options.markers.validate()?;
	let document = parse_document(content, &options.markers)?;
	let snippets: Vec<Snippet> = document
		.blocks()
		.map(|block| Snippet::from_block(block, &options.base_indent))
		.collect();

	let mut context = ExecutionContext::new(options.indent_step.clone());
	if let Some(dir) = &options.template_dir {
		context = context.with_template_dir(dir.clone());
	}
	for (name, value) in &options.data {
		context.bind(name.clone(), value);
	}

	let outputs = context.run(&snippets)?;

	Ok(Rendered {
		content: document.assemble(&outputs, options.omit_code_blocks),
		blocks: snippets.len(),
	})
}

/// Result of rendering a file without writing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
	/// Where the rendered document would be written.
	pub destination: PathBuf,
	/// Current content of the destination, `None` when it does not exist.
	pub current: Option<String>,
	pub rendered: String,
	pub blocks: usize,
}

impl CheckResult {
	/// Returns `true` when writing would change the destination.
	pub fn is_stale(&self) -> bool {
		self.current.as_deref() != Some(self.rendered.as_str())
	}
}

/// Summary of a completed [`process_file`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReport {
	pub destination: PathBuf,
	pub blocks: usize,
	/// Whether the destination was written. Unchanged content is not
	/// rewritten.
	pub changed: bool,
}

/// Render `source` and compare the result with the destination (`source`
/// itself when `destination` is `None`) without writing anything.
pub fn check_file(
	source: &Path,
	destination: Option<&Path>,
	options: &ProcessOptions,
) -> CrowbarResult<CheckResult> {
	let destination = destination.unwrap_or(source).to_path_buf();
	if destination.exists() && !destination.is_file() {
		return Err(CrowbarError::InvalidOutputPath(destination));
	}
	let in_place = same_file(source, &destination);
	if options.omit_code_blocks && in_place {
		return Err(CrowbarError::Configuration(
			"removing code blocks requires an output file different from the input file"
				.to_string(),
		));
	}

	debug!(source = %source.display(), destination = %destination.display(), "processing file");
	let original = fs::read_to_string(source)?;
	let rendered = if options.template_dir.is_some() {
		process_str(&original, options)?
	} else {
		let options = ProcessOptions {
			template_dir: Some(parent_dir(source).to_path_buf()),
			..options.clone()
		};
		process_str(&original, &options)?
	};

	let current = if in_place {
		Some(original)
	} else {
		match fs::read_to_string(&destination) {
			Ok(content) => Some(content),
			Err(e) if e.kind() == io::ErrorKind::NotFound => None,
			Err(e) => return Err(e.into()),
		}
	};

	Ok(CheckResult {
		destination,
		current,
		rendered: rendered.content,
		blocks: rendered.blocks,
	})
}

/// Render `source` and write the result to `destination`, or back to
/// `source` when `destination` is `None`.
///
/// Every block must evaluate successfully before anything is written, and
/// the write replaces the destination atomically, so a failure at any point
/// leaves the destination untouched.
pub fn process_file(
	source: &Path,
	destination: Option<&Path>,
	options: &ProcessOptions,
) -> CrowbarResult<ProcessReport> {
	let check = check_file(source, destination, options)?;
	let changed = check.is_stale();

	if changed {
		write_atomic(&check.destination, &check.rendered)?;
		debug!(destination = %check.destination.display(), blocks = check.blocks, "wrote file");
	} else {
		debug!(destination = %check.destination.display(), "content unchanged, skipping write");
	}

	Ok(ProcessReport {
		destination: check.destination,
		blocks: check.blocks,
		changed,
	})
}

/// Write `content` to a temporary file next to `destination` and rename it
/// over the destination, keeping the destination's permissions.
fn write_atomic(destination: &Path, content: &str) -> CrowbarResult<()> {
	let mut file = NamedTempFile::new_in(parent_dir(destination))?;
	file.write_all(content.as_bytes())?;
	file.as_file().sync_all()?;

	if let Ok(metadata) = fs::metadata(destination) {
		file.as_file().set_permissions(metadata.permissions())?;
	}

	file.persist(destination).map_err(|e| CrowbarError::Io(e.error))?;
	Ok(())
}

fn parent_dir(path: &Path) -> &Path {
	path.parent()
		.filter(|parent| !parent.as_os_str().is_empty())
		.unwrap_or_else(|| Path::new("."))
}

fn same_file(a: &Path, b: &Path) -> bool {
	match (fs::canonicalize(a), fs::canonicalize(b)) {
		(Ok(a), Ok(b)) => a == b,
		_ => a == b,
	}
}
