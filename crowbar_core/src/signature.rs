/// A `{% macro name(params) %}` header found in template source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroSignature {
	pub name: String,
	pub params: Vec<MacroParam>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroParam {
	pub name: String,
	pub has_default: bool,
}

impl MacroParam {
	fn parse(raw: &str) -> Option<Self> {
		let (name, has_default) = match split_top_level(raw, '=').as_slice() {
			[name] => (*name, false),
			[name, ..] => (*name, true),
			[] => return None,
		};
		let name = name.trim();
		(!name.is_empty()).then(|| {
			Self {
				name: name.to_string(),
				has_default,
			}
		})
	}
}

/// Find every macro header in `source`. Headers that cannot be read (for
/// example an unterminated parameter list) are skipped; the template engine
/// reports those as syntax errors.
pub fn scan_macro_signatures(source: &str) -> Vec<MacroSignature> {
	let mut signatures = Vec::new();
	let mut search_from = 0;

	while let Some(offset) = source[search_from..].find("{%") {
		let tag_start = search_from + offset + 2;
		search_from = tag_start;

		let rest = source[tag_start..].trim_start_matches(['-', '+']).trim_start();
		let Some(rest) = rest.strip_prefix("macro") else {
			continue;
		};
		if !rest.starts_with(char::is_whitespace) {
			continue;
		}
		let rest = rest.trim_start();
		let name_len = rest
			.find(|c: char| !(c.is_alphanumeric() || c == '_'))
			.unwrap_or(rest.len());
		if name_len == 0 {
			continue;
		}
		let name = &rest[..name_len];
		let Some(params) = rest[name_len..].trim_start().strip_prefix('(') else {
			continue;
		};
		let Some(close) = find_closing_paren(params) else {
			continue;
		};

		signatures.push(MacroSignature {
			name: name.to_string(),
			params: split_top_level(&params[..close], ',')
				.into_iter()
				.filter_map(MacroParam::parse)
				.collect(),
		});
	}

	signatures
}

/// Byte offset of the `)` closing a parameter list whose `(` has already
/// been consumed.
fn find_closing_paren(text: &str) -> Option<usize> {
	let mut depth = 0usize;
	let mut quote: Option<char> = None;
	let mut escaped = false;

	for (index, c) in text.char_indices() {
		if let Some(q) = quote {
			if escaped {
				escaped = false;
			} else if c == '\\' {
				escaped = true;
			} else if c == q {
				quote = None;
			}
			continue;
		}
		match c {
			'"' | '\'' => quote = Some(c),
			'(' | '[' | '{' => depth += 1,
			')' if depth == 0 => return Some(index),
			')' | ']' | '}' => depth = depth.saturating_sub(1),
			_ => {}
		}
	}

	None
}

/// Split `text` on `separator` where it is not nested inside brackets or a
/// string literal.
fn split_top_level(text: &str, separator: char) -> Vec<&str> {
	let mut parts = Vec::new();
	let mut depth = 0usize;
	let mut quote: Option<char> = None;
	let mut escaped = false;
	let mut start = 0;

	for (index, c) in text.char_indices() {
		if let Some(q) = quote {
			if escaped {
				escaped = false;
			} else if c == '\\' {
				escaped = true;
			} else if c == q {
				quote = None;
			}
			continue;
		}
		match c {
			'"' | '\'' => quote = Some(c),
			'(' | '[' | '{' => depth += 1,
			')' | ']' | '}' => depth = depth.saturating_sub(1),
			c if c == separator && depth == 0 => {
				parts.push(&text[start..index]);
				start = index + c.len_utf8();
			}
			_ => {}
		}
	}

	let tail = &text[start..];
	if !tail.trim().is_empty() || !parts.is_empty() {
		parts.push(tail);
	}
	parts
}
