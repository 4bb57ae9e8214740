use std::fmt;

use tracing::trace;

use crate::Component;
use crate::ComponentClosure;
use crate::CrowbarError;
use crate::CrowbarResult;
use crate::Token;

/// Indentation added per `indent` level when none is configured.
pub const DEFAULT_INDENT_STEP: &str = "  ";

/// A single thing that can be passed to `emit`.
#[derive(Debug, Clone, Default)]
pub enum Item {
	/// Emits nothing. Makes conditional emission (`Option`) convenient.
	#[default]
	Nothing,
	/// Literal text.
	Text(String),
	/// A control token.
	Token(Token),
	/// A nested sequence, rendered one indentation level deeper.
	Seq(Vec<Item>),
	/// A component with its arguments bound, ready to render.
	Closure(ComponentClosure),
	/// A component that was never called. Emitting it is an error.
	Component(Component),
}

impl Item {
	/// The text of a [`Item::Text`] item.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Text(text) => Some(text),
			_ => None,
		}
	}

	/// The elements of a [`Item::Seq`] item.
	pub fn as_seq(&self) -> Option<&[Item]> {
		match self {
			Self::Seq(items) => Some(items),
			_ => None,
		}
	}

	pub fn is_nothing(&self) -> bool {
		matches!(self, Self::Nothing)
	}
}

impl From<&str> for Item {
	fn from(value: &str) -> Self {
		Self::Text(value.to_string())
	}
}

impl From<String> for Item {
	fn from(value: String) -> Self {
		Self::Text(value)
	}
}

impl From<&String> for Item {
	fn from(value: &String) -> Self {
		Self::Text(value.clone())
	}
}

impl From<Token> for Item {
	fn from(value: Token) -> Self {
		Self::Token(value)
	}
}

impl From<Vec<Item>> for Item {
	fn from(value: Vec<Item>) -> Self {
		Self::Seq(value)
	}
}

impl From<ComponentClosure> for Item {
	fn from(value: ComponentClosure) -> Self {
		Self::Closure(value)
	}
}

impl From<Component> for Item {
	fn from(value: Component) -> Self {
		Self::Component(value)
	}
}

impl<T: Into<Item>> From<Option<T>> for Item {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Nothing, Into::into)
	}
}

impl From<()> for Item {
	fn from((): ()) -> Self {
		Self::Nothing
	}
}

macro_rules! item_from_display {
	($($ty:ty),* $(,)?) => {
		$(
			impl From<$ty> for Item {
				fn from(value: $ty) -> Self {
					Self::Text(value.to_string())
				}
			}
		)*
	};
}

item_from_display!(
	bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64
);

/// Build a `Vec<Item>` from heterogeneous values.
///
/// ```rust
/// use crowbar_core::INDENT;
/// use crowbar_core::items;
///
/// let items = items!["fn main() {", INDENT, "run();", crowbar_core::DEDENT, "}"];
/// assert_eq!(items.len(), 5);
/// ```
#[macro_export]
macro_rules! items {
	() => {
		::std::vec::Vec::<$crate::Item>::new()
	};
	($($item:expr),+ $(,)?) => {
		::std::vec![$($crate::Item::from($item)),+]
	};
}

/// The emit entry point handed to component routines. It is implemented by
/// [`Emitter`] and allows routines to be written without knowing the
/// emitter's writer type.
pub trait Emit {
	fn emit_item(&mut self, item: Item) -> CrowbarResult<()>;
}

impl dyn Emit + '_ {
	/// Emit a single item.
	pub fn emit(&mut self, item: impl Into<Item>) -> CrowbarResult<()> {
		self.emit_item(item.into())
	}

	/// Emit each item in order, without the extra indentation a nested
	/// sequence would get.
	pub fn emit_all<I: Into<Item>>(&mut self, items: impl IntoIterator<Item = I>) -> CrowbarResult<()> {
		for item in items {
			self.emit_item(item.into())?;
		}
		Ok(())
	}
}

/// Indentation- and line-aware text sink.
///
/// The indentation prefix of a line is only decided when its first
/// character is written, so `indent`/`dedent` and `nl`/`fl` commute.
///
/// ```rust
/// use crowbar_core::Emitter;
/// use crowbar_core::items;
/// use crowbar_core::{DEDENT, INDENT};
///
/// let mut emitter = Emitter::new(String::new()).with_indent_step("   ");
/// emitter.emit_all(items!["a", INDENT, "b", INDENT, "c", DEDENT, "b", DEDENT, "a"])?;
/// assert_eq!(emitter.into_inner(), "a\n   b\n      c\n   b\na");
/// # Ok::<(), crowbar_core::CrowbarError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Emitter<W = String> {
	writer: W,
	base_indent: String,
	indent_step: String,
	line_ending: String,
	indent_level: usize,
	line_has_content: bool,
	continue_line: bool,
}

impl Default for Emitter<String> {
	fn default() -> Self {
		Self::new(String::new())
	}
}

impl<W: fmt::Write> Emitter<W> {
	/// Create an emitter writing into `writer` with no base indentation and
	/// [`DEFAULT_INDENT_STEP`].
	pub fn new(writer: W) -> Self {
		Self {
			writer,
			base_indent: String::new(),
			indent_step: DEFAULT_INDENT_STEP.to_string(),
			line_ending: "\n".to_string(),
			indent_level: 0,
			line_has_content: false,
			continue_line: false,
		}
	}

	/// Prefix written before every line, independent of the indent level.
	#[must_use]
	pub fn with_base_indent(mut self, base_indent: impl Into<String>) -> Self {
		self.base_indent = base_indent.into();
		self
	}

	/// String added once per indentation level.
	#[must_use]
	pub fn with_indent_step(mut self, indent_step: impl Into<String>) -> Self {
		self.indent_step = indent_step.into();
		self
	}

	/// Terminator written for every line break, `"\n"` unless configured.
	#[must_use]
	pub fn with_line_ending(mut self, line_ending: impl Into<String>) -> Self {
		self.line_ending = line_ending.into();
		self
	}

	pub fn indent_level(&self) -> usize {
		self.indent_level
	}

	pub fn writer(&self) -> &W {
		&self.writer
	}

	pub fn into_inner(self) -> W {
		self.writer
	}

	/// Emit a single item.
	pub fn emit(&mut self, item: impl Into<Item>) -> CrowbarResult<()> {
		self.process(item.into())
	}

	/// Emit each item in order. Unlike passing a `Vec<Item>` to
	/// [`Emitter::emit`], the items are not indented.
	pub fn emit_all<I: Into<Item>>(&mut self, items: impl IntoIterator<Item = I>) -> CrowbarResult<()> {
		for item in items {
			self.process(item.into())?;
		}
		Ok(())
	}

	/// Apply a control token.
	pub fn apply_token(&mut self, token: Token) -> CrowbarResult<()> {
		match token {
			Token::Indent => self.indent_level += 1,
			Token::Dedent => {
				if self.indent_level == 0 {
					trace!("dedent at indentation level zero ignored");
				}
				self.indent_level = self.indent_level.saturating_sub(1);
			}
			Token::Newline => self.break_line()?,
			Token::FreshLine => {
				if self.line_has_content {
					self.break_line()?;
				}
			}
			Token::LineContinue => self.continue_line = true,
		}
		Ok(())
	}

	/// Write literal text. Unless line continuation is pending, the text
	/// starts on a fresh line. Embedded line breaks are honoured and every
	/// following line is indented.
	pub fn write_text(&mut self, text: &str) -> CrowbarResult<()> {
		if text.is_empty() {
			return Ok(());
		}

		if self.continue_line {
			self.continue_line = false;
		} else if self.line_has_content {
			self.break_line()?;
		}

		for (index, segment) in text.split('\n').enumerate() {
			if index > 0 {
				self.break_line()?;
			}
			self.write_segment(segment.strip_suffix('\r').unwrap_or(segment))?;
		}

		Ok(())
	}

	fn process(&mut self, item: Item) -> CrowbarResult<()> {
		match item {
			Item::Nothing => Ok(()),
			Item::Text(text) => self.write_text(&text),
			Item::Token(token) => self.apply_token(token),
			Item::Seq(items) => {
				self.apply_token(Token::Indent)?;
				for item in items {
					self.process(item)?;
				}
				self.apply_token(Token::Dedent)
			}
			Item::Closure(closure) => closure.render(self),
			Item::Component(component) => {
				Err(CrowbarError::ComponentNotInvoked(component.name().to_string()))
			}
		}
	}

	fn write_segment(&mut self, segment: &str) -> CrowbarResult<()> {
		if segment.is_empty() {
			return Ok(());
		}
		if !self.line_has_content {
			self.writer.write_str(&self.base_indent)?;
			for _ in 0..self.indent_level {
				self.writer.write_str(&self.indent_step)?;
			}
		}
		self.writer.write_str(segment)?;
		self.line_has_content = true;
		Ok(())
	}

	fn break_line(&mut self) -> CrowbarResult<()> {
		self.writer.write_str(&self.line_ending)?;
		self.line_has_content = false;
		Ok(())
	}
}

impl<W: fmt::Write> Emit for Emitter<W> {
	fn emit_item(&mut self, item: Item) -> CrowbarResult<()> {
		self.process(item)
	}
}

/// Render `items` into a new string using the default emitter settings.
pub fn render<I: Into<Item>>(items: impl IntoIterator<Item = I>) -> CrowbarResult<String> {
	let mut emitter = Emitter::default();
	emitter.emit_all(items)?;
	Ok(emitter.into_inner())
}
