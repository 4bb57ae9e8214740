use derive_more::Deref;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::trace;

use crate::CrowbarError;
use crate::CrowbarResult;

pub const DEFAULT_START_MARKER: &str = "<<crowbar";
pub const DEFAULT_CODE_END_MARKER: &str = ">>";
pub const DEFAULT_END_MARKER: &str = "<<end>>";

/// The three literal delimiters of a block.
///
/// ```text
/// # <<crowbar        <- start
/// # {{ emit("x") }}
/// # >>               <- code_end
/// x
/// # <<end>>          <- end
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Markers {
	pub start: String,
	pub code_end: String,
	pub end: String,
}

impl Default for Markers {
	fn default() -> Self {
		Self {
			start: DEFAULT_START_MARKER.to_string(),
			code_end: DEFAULT_CODE_END_MARKER.to_string(),
			end: DEFAULT_END_MARKER.to_string(),
		}
	}
}

impl Markers {
	/// Markers must be non-empty and distinct from one another.
	pub fn validate(&self) -> CrowbarResult<()> {
		let markers = [
			("start", &self.start),
			("code_end", &self.code_end),
			("end", &self.end),
		];
		for (name, marker) in markers {
			if marker.trim().is_empty() {
				return Err(CrowbarError::Configuration(format!(
					"the `{name}` marker must not be empty"
				)));
			}
		}
		if self.start == self.code_end || self.start == self.end || self.code_end == self.end {
			return Err(CrowbarError::Configuration(
				"the `start`, `code_end` and `end` markers must be distinct".to_string(),
			));
		}
		Ok(())
	}
}

/// One `<<crowbar … >> … <<end>>` region of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
	/// 1-indexed line holding the start marker.
	pub start_line: usize,
	/// 1-indexed line holding the code end marker. Equal to `start_line` for
	/// inline blocks.
	pub out_line: usize,
	/// 1-indexed line holding the end marker.
	pub end_line: usize,
	/// Literal text preceding the start marker on its line.
	pub comment_prefix: String,
	/// Leading whitespace of the start marker line.
	pub base_indent: String,
	/// Code lines with their prefix and line terminator removed.
	pub code_lines: Vec<String>,
	/// Verbatim text from the start line through the out line.
	header: String,
	/// Verbatim end marker line.
	footer: String,
}

impl Block {
	/// The snippet to evaluate.
	pub fn code(&self) -> String {
		self.code_lines.join("\n")
	}

	pub fn is_inline(&self) -> bool {
		self.start_line == self.out_line
	}

	/// The line terminator the block's marker lines use, `"\r\n"` or `"\n"`.
	pub fn line_ending(&self) -> &'static str {
		if self.header.ends_with("\r\n") { "\r\n" } else { "\n" }
	}

	/// Document line of the first code line.
	pub fn first_code_line(&self) -> usize {
		if self.is_inline() {
			self.start_line
		} else {
			self.start_line + 1
		}
	}
}

/// A scanned piece of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
	/// Text outside any block, copied verbatim.
	Text(String),
	Block(Block),
}

/// A document split into passthrough text and blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct Document {
	segments: Vec<Segment>,
}

impl Document {
	pub fn blocks(&self) -> impl Iterator<Item = &Block> {
		self.segments.iter().filter_map(|segment| {
			match segment {
				Segment::Block(block) => Some(block),
				Segment::Text(_) => None,
			}
		})
	}

	/// Reassemble the document, replacing each block's output region with
	/// the matching entry of `outputs`. With `omit_code_blocks` only the
	/// rendered output of each block is kept.
	pub fn assemble(&self, outputs: &[String], omit_code_blocks: bool) -> String {
		let mut result = String::new();
		let mut outputs = outputs.iter();

		for segment in &self.segments {
			match segment {
				Segment::Text(text) => result.push_str(text),
				Segment::Block(block) => {
					let output = outputs.next().map_or("", String::as_str);
					if !omit_code_blocks {
						result.push_str(&block.header);
					}
					if !output.is_empty() {
						result.push_str(output);
						if !output.ends_with('\n') {
							result.push_str(block.line_ending());
						}
					}
					if !omit_code_blocks {
						result.push_str(&block.footer);
					}
				}
			}
		}

		result
	}
}

/// Scan `content` for blocks in a single top to bottom pass.
pub fn parse_document(content: &str, markers: &Markers) -> CrowbarResult<Document> {
	let mut lines = content
		.split_inclusive('\n')
		.enumerate()
		.map(|(index, line)| (index + 1, line));
	let mut segments = Vec::new();
	let mut passthrough = String::new();

	while let Some((line_number, line)) = lines.next() {
		let Some(start_column) = line.find(markers.start.as_str()) else {
			passthrough.push_str(line);
			continue;
		};

		if !passthrough.is_empty() {
			segments.push(Segment::Text(std::mem::take(&mut passthrough)));
		}

		let block = scan_block(&mut lines, line_number, line, start_column, markers)?;
		debug!(
			start = block.start_line,
			end = block.end_line,
			inline = block.is_inline(),
			"found block"
		);
		segments.push(Segment::Block(block));
	}

	if !passthrough.is_empty() {
		segments.push(Segment::Text(passthrough));
	}

	Ok(Document { segments })
}

fn scan_block<'a>(
	lines: &mut impl Iterator<Item = (usize, &'a str)>,
	start_line: usize,
	line: &'a str,
	start_column: usize,
	markers: &Markers,
) -> CrowbarResult<Block> {
	let comment_prefix = &line[..start_column];
	let after_marker = &line[start_column + markers.start.len()..];
	let mut header = line.to_string();

	let (code_lines, out_line) = if let Some(end) = after_marker.find(markers.code_end.as_str()) {
		let code = after_marker[..end].trim_start();
		(vec![code.to_string()], start_line)
	} else {
		let mut raw_lines = Vec::new();
		loop {
			let Some((line_number, line)) = lines.next() else {
				return Err(CrowbarError::UnexpectedEndOfInput {
					line: start_line,
					expected: "the end of its code section",
				});
			};
			header.push_str(line);
			if is_code_end(line, comment_prefix, &markers.code_end) {
				let code_lines = strip_code_prefix(&raw_lines, comment_prefix, start_line)?;
				break (code_lines, line_number);
			}
			raw_lines.push((line_number, trim_line_ending(line)));
		}
	};

	let (end_line, footer) = loop {
		let Some((line_number, line)) = lines.next() else {
			return Err(CrowbarError::UnexpectedEndOfInput {
				line: start_line,
				expected: "its end marker",
			});
		};
		if line.contains(markers.end.as_str()) {
			break (line_number, line.to_string());
		}
		trace!(line = line_number, "discarding stale output");
	};

	Ok(Block {
		start_line,
		out_line,
		end_line,
		comment_prefix: comment_prefix.to_string(),
		base_indent: leading_whitespace(line).to_string(),
		code_lines,
		header,
		footer,
	})
}

/// The code end marker may be preceded by whitespace and the block's comment
/// prefix, e.g. `# >>`, `   >> */` or ` * >>`.
fn is_code_end(line: &str, comment_prefix: &str, marker: &str) -> bool {
	let rest = line.trim_start();
	let rest = rest
		.strip_prefix(comment_prefix.trim())
		.unwrap_or(rest)
		.trim_start();
	rest.starts_with(marker)
}

/// Remove the shared prefix from every code line.
///
/// Lines normally start with `comment_prefix`. When they do not, each line's
/// prefix is read from its own shape: leading whitespace, the comment marker
/// and the spacing after it. A prefix shared by every line is stripped even
/// if it differs from `comment_prefix`, and a broken snippet is left for
/// evaluation to report. Lines made of the comment marker alone are blank
/// code lines.
fn strip_code_prefix(
	raw_lines: &[(usize, &str)],
	comment_prefix: &str,
	start_line: usize,
) -> CrowbarResult<Vec<String>> {
	let marker = comment_prefix.trim();
	let is_blank = |text: &str| text.trim() == marker;
	let prefixed = raw_lines
		.iter()
		.all(|&(_, text)| is_blank(text) || text.starts_with(comment_prefix));

	let common = if prefixed {
		comment_prefix
	} else {
		let mut common: Option<&str> = None;
		for &(line_number, text) in raw_lines {
			if is_blank(text) {
				continue;
			}
			let prefix = line_prefix(text, comment_prefix);
			match common {
				None => common = Some(prefix),
				Some(existing) if existing == prefix => {}
				Some(_) => {
					return Err(CrowbarError::IndentationMismatch {
						line: start_line,
						code_line: line_number,
						prefix: comment_prefix.to_string(),
					});
				}
			}
		}
		let common = common.unwrap_or(comment_prefix);
		debug!(
			line = start_line,
			expected = comment_prefix,
			found = common,
			"code lines share a prefix that differs from the block's comment prefix"
		);
		common
	};

	Ok(raw_lines
		.iter()
		.map(|&(_, text)| {
			if is_blank(text) {
				String::new()
			} else {
				text.strip_prefix(common).unwrap_or(text).to_string()
			}
		})
		.collect())
}

/// The prefix of a code line shaped like `comment_prefix`: its leading
/// whitespace, the comment marker when present, then at most as much spacing
/// as follows the marker in `comment_prefix`.
fn line_prefix<'a>(text: &'a str, comment_prefix: &str) -> &'a str {
	let marker = comment_prefix.trim();
	let indent = leading_whitespace(text).len();
	if marker.is_empty() {
		return head(&text[..indent], comment_prefix.len());
	}
	let Some(after_marker) = text[indent..].strip_prefix(marker) else {
		return &text[..indent];
	};

	let spacing = leading_whitespace(after_marker).len();
	let expected_spacing = comment_prefix.len() - comment_prefix.trim_end().len();
	head(text, indent + marker.len() + spacing.min(expected_spacing))
}

/// The first `width` bytes of `text`, shortened to a character boundary.
fn head(text: &str, width: usize) -> &str {
	if text.len() <= width {
		return text;
	}
	let mut end = width;
	while !text.is_char_boundary(end) {
		end -= 1;
	}
	&text[..end]
}

fn trim_line_ending(line: &str) -> &str {
	let line = line.strip_suffix('\n').unwrap_or(line);
	line.strip_suffix('\r').unwrap_or(line)
}

fn leading_whitespace(line: &str) -> &str {
	let trimmed = line.trim_start();
	&line[..line.len() - trimmed.len()]
}
