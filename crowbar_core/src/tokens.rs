use std::fmt::Display;

/// Control tokens interpreted by the [`Emitter`](crate::Emitter). They are
/// never written out as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
	/// `indent`: one level deeper, effective from the next materialized line.
	Indent,
	/// `dedent`: one level shallower, clamped at zero.
	Dedent,
	/// `nl`: terminate the current line unconditionally.
	Newline,
	/// `fl`: terminate the current line only if it has content.
	FreshLine,
	/// `lc`: append the next text to the current line.
	LineContinue,
}

impl Token {
	/// Every token, in the order they are exposed to snippets.
	pub const ALL: [Token; 5] = [
		Token::Indent,
		Token::Dedent,
		Token::Newline,
		Token::FreshLine,
		Token::LineContinue,
	];

	/// The short name snippets use to refer to this token.
	pub const fn name(self) -> &'static str {
		match self {
			Token::Indent => "indent",
			Token::Dedent => "dedent",
			Token::Newline => "nl",
			Token::FreshLine => "fl",
			Token::LineContinue => "lc",
		}
	}
}

impl Display for Token {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let label = match self {
			Token::Indent => "indent",
			Token::Dedent => "dedent",
			Token::Newline => "newline",
			Token::FreshLine => "freshline",
			Token::LineContinue => "linecontinue",
		};
		write!(f, "<{label}>")
	}
}

pub const INDENT: Token = Token::Indent;
pub const DEDENT: Token = Token::Dedent;
pub const NL: Token = Token::Newline;
pub const FL: Token = Token::FreshLine;
pub const LC: Token = Token::LineContinue;
