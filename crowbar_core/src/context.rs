use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use minijinja::AutoEscape;
use minijinja::Environment;
use minijinja::Error;
use minijinja::ErrorKind;
use minijinja::State;
use minijinja::UndefinedBehavior;
use minijinja::Value;
use minijinja::context;
use minijinja::value::Kwargs;
use minijinja::value::Object;
use minijinja::value::ObjectRepr;
use minijinja::value::Rest;
use minijinja::value::ValueKind;
use minijinja::value::from_args;
use serde::Serialize;
use tracing::debug;
use tracing::trace;

use crate::Args;
use crate::Block;
use crate::CrowbarError;
use crate::CrowbarResult;
use crate::Emitter;
use crate::Param;
use crate::Token;
use crate::bind_arguments;
use crate::signature::MacroParam;
use crate::signature::MacroSignature;
use crate::signature::scan_macro_signatures;

const DOCUMENT_TEMPLATE: &str = "<document>";
const BLOCK_FUNCTION: &str = "__crowbar_block__";

/// One block's snippet, ready for evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
	/// Prefix-stripped code.
	pub code: String,
	/// Indentation every rendered line of this block starts with.
	pub base_indent: String,
	/// Line terminator of the rendered output, matching the block's own.
	pub line_ending: String,
	/// 1-indexed line of the block's start marker.
	pub start_line: usize,
	/// 1-indexed document line of the first code line.
	pub first_code_line: usize,
}

impl Snippet {
	/// Build the snippet for `block`, prepending `base_indent` to the block's
	/// own indentation.
	pub fn from_block(block: &Block, base_indent: &str) -> Self {
		Self {
			code: block.code(),
			base_indent: format!("{base_indent}{}", block.base_indent),
			line_ending: block.line_ending().to_string(),
			start_line: block.start_line,
			first_code_line: block.first_code_line(),
		}
	}
}

/// The binding environment shared by every block of one document pass.
///
/// Snippets are [`minijinja`] templates whose textual output is discarded;
/// they produce output through `emit(...)`. Top-level `{% set %}` bindings
/// and `{% macro %}` definitions made by a block are visible to every later
/// block and never to earlier ones. The following names are predefined:
///
/// - `emit`: renders its arguments into the current block's output.
/// - `indent`, `dedent`, `nl`, `fl`, `lc`: control tokens.
/// - `component`: turns a macro whose first parameter is `emit` into a
///   component; calling the component returns a closure for `emit`.
pub struct ExecutionContext {
	env: Environment<'static>,
	session: Arc<Session>,
}

impl fmt::Debug for ExecutionContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ExecutionContext")
			.field("session", &self.session)
			.finish_non_exhaustive()
	}
}

impl ExecutionContext {
	pub fn new(indent_step: impl Into<String>) -> Self {
		let session = Arc::new(Session::new(indent_step.into()));
		let mut env = Environment::new();
		env.set_undefined_behavior(UndefinedBehavior::Strict);
		env.set_auto_escape_callback(|_| AutoEscape::None);

		for token in Token::ALL {
			env.add_global(token.name(), Value::from_object(token));
		}
		env.add_global(
			"emit",
			Value::from_object(EmitFunction {
				session: Arc::clone(&session),
			}),
		);

		let component_session = Arc::clone(&session);
		env.add_function("component", move |routine: Value| {
			declare_component(&component_session, &routine)
		});

		let block_session = Arc::clone(&session);
		env.add_function(BLOCK_FUNCTION, move |index: usize| -> Result<String, Error> {
			block_session.enter(index)?;
			Ok(String::new())
		});

		Self { env, session }
	}

	/// Resolve `{% import %}` and `{% from … import %}` against `dir`.
	/// Macro headers of loaded files are registered so components declared
	/// from them check their required parameters.
	#[must_use]
	pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		let dir = dir.into();
		let session = Arc::clone(&self.session);
		self.env
			.set_loader(move |name| load_template(&dir, name, &session));
		self
	}

	/// Make `value` available to every snippet under `name`.
	pub fn bind<V: Serialize>(&mut self, name: impl Into<String>, value: V) {
		self.bind_value(name, Value::from_serialize(value));
	}

	pub fn bind_value(&mut self, name: impl Into<String>, value: Value) {
		self.env.add_global(name.into(), value);
	}

	/// Evaluate every snippet in order and return the rendered output of
	/// each. Evaluation stops at the first failing snippet.
	pub fn run(mut self, snippets: &[Snippet]) -> CrowbarResult<Vec<String>> {
		debug!(blocks = snippets.len(), "evaluating snippets");
		if snippets.is_empty() {
			return Ok(Vec::new());
		}

		// Compile each snippet on its own first so syntax errors are blamed on
		// the block that contains them.
		for (index, snippet) in snippets.iter().enumerate() {
			if let Err(err) = self
				.env
				.add_template_owned(format!("<block {}>", index + 1), snippet.code.clone())
			{
				let error_line = err
					.line()
					.map(|line| snippet.first_code_line + line.saturating_sub(1));
				return Err(evaluation_error(snippet, &err, error_line));
			}
		}

		let (source, offsets) = combine(snippets);
		self.session.lock().prepare(snippets);

		let rendered = self
			.env
			.add_template_owned(DOCUMENT_TEMPLATE, source)
			.and_then(|()| self.env.get_template(DOCUMENT_TEMPLATE))
			.and_then(|template| template.render(context! {}));

		match rendered {
			Ok(_) => Ok(self.session.lock().finish()),
			Err(err) => {
				let located = err
					.line()
					.filter(|_| err.name() == Some(DOCUMENT_TEMPLATE))
					.and_then(|line| locate(&offsets, snippets, line));
				let index = self
					.session
					.lock()
					.current_block()
					.or(located.map(|(index, _)| index))
					.unwrap_or_default();
				Err(evaluation_error(
					&snippets[index],
					&err,
					located.map(|(_, line)| line),
				))
			}
		}
	}
}

/// Join all snippets into one template, each preceded by a call that
/// switches `emit` to that block's output. Returns the source and the
/// template line of every block's switch call.
fn combine(snippets: &[Snippet]) -> (String, Vec<usize>) {
	let mut source = String::new();
	let mut offsets = Vec::with_capacity(snippets.len());
	let mut line = 1;

	for (index, snippet) in snippets.iter().enumerate() {
		offsets.push(line);
		let _ = writeln!(source, "{{{{ {BLOCK_FUNCTION}({index}) }}}}");
		source.push_str(&snippet.code);
		source.push('\n');
		line += 1 + snippet.code.split('\n').count();
	}

	(source, offsets)
}

/// Map a line of the combined template to a block index and document line.
fn locate(offsets: &[usize], snippets: &[Snippet], line: usize) -> Option<(usize, usize)> {
	let index = offsets.iter().rposition(|&offset| offset <= line)?;
	let within = line - offsets[index];
	Some((
		index,
		snippets[index].first_code_line + within.saturating_sub(1),
	))
}

fn evaluation_error(snippet: &Snippet, err: &Error, error_line: Option<usize>) -> CrowbarError {
	let mut message = match err.detail() {
		Some(detail) => format!("{}: {detail}", err.kind()),
		None => err.kind().to_string(),
	};
	let mut source = std::error::Error::source(err);
	while let Some(cause) = source {
		let _ = write!(message, ": {cause}");
		source = cause.source();
	}

	CrowbarError::CodeEvaluation {
		line: snippet.start_line,
		error_line,
		kind: format!("{:?}", err.kind()),
		message,
		code: snippet.code.clone(),
	}
}

fn engine_error(err: CrowbarError) -> Error {
	let kind = match &err {
		CrowbarError::MissingArgument { .. } => ErrorKind::MissingArgument,
		CrowbarError::TooManyArguments { .. } => ErrorKind::TooManyArguments,
		_ => ErrorKind::InvalidOperation,
	};
	Error::new(kind, err.to_string())
}

fn load_template(dir: &Path, name: &str, session: &Session) -> Result<Option<String>, Error> {
	let mut path = dir.to_path_buf();
	for segment in name.split('/') {
		match segment {
			"" | "." => {}
			".." => return Ok(None),
			_ if segment.contains('\\') => return Ok(None),
			_ => path.push(segment),
		}
	}

	match std::fs::read_to_string(&path) {
		Ok(source) => {
			trace!(template = name, "loaded template");
			session.lock().register(scan_macro_signatures(&source));
			Ok(Some(source))
		}
		Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
		Err(err) => {
			Err(
				Error::new(ErrorKind::InvalidOperation, format!("could not read template `{name}`"))
					.with_source(err),
			)
		}
	}
}

#[derive(Debug)]
struct Session {
	state: Mutex<SessionState>,
}

#[derive(Debug, Default)]
struct SessionState {
	indent_step: String,
	/// Base indentation and line ending of each block.
	layouts: Vec<(String, String)>,
	outputs: Vec<String>,
	active: Option<(usize, Emitter)>,
	/// Macro headers of each block, registered when the block is entered.
	block_signatures: Vec<Vec<MacroSignature>>,
	signatures: HashMap<String, Vec<MacroParam>>,
}

impl Session {
	fn new(indent_step: String) -> Self {
		Self {
			state: Mutex::new(SessionState {
				indent_step,
				..SessionState::default()
			}),
		}
	}

	fn lock(&self) -> MutexGuard<'_, SessionState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn enter(&self, index: usize) -> Result<(), Error> {
		self.lock().enter(index)
	}

	/// Run `f` against the emitter of the block being evaluated. The lock is
	/// released before returning so components may call back into `emit`.
	fn with_emitter(&self, f: impl FnOnce(&mut Emitter) -> CrowbarResult<()>) -> Result<(), Error> {
		let mut state = self.lock();
		let Some((_, emitter)) = state.active.as_mut() else {
			return Err(Error::new(
				ErrorKind::InvalidOperation,
				"emit() can only be called while a block is being evaluated",
			));
		};
		f(emitter).map_err(engine_error)
	}

	fn signature(&self, name: &str) -> Option<Vec<MacroParam>> {
		self.lock().signatures.get(name).cloned()
	}
}

impl SessionState {
	fn prepare(&mut self, snippets: &[Snippet]) {
		self.layouts = snippets
			.iter()
			.map(|s| (s.base_indent.clone(), s.line_ending.clone()))
			.collect();
		self.outputs = vec![String::new(); snippets.len()];
		self.block_signatures = snippets
			.iter()
			.map(|s| scan_macro_signatures(&s.code))
			.collect();
		self.active = None;
	}

	fn enter(&mut self, index: usize) -> Result<(), Error> {
		let Some((base_indent, line_ending)) = self.layouts.get(index).cloned() else {
			return Err(Error::new(
				ErrorKind::InvalidOperation,
				format!("there is no block {index}"),
			));
		};
		self.close_active();
		let signatures = std::mem::take(&mut self.block_signatures[index]);
		self.register(signatures);

		trace!(block = index, "entering block");
		let emitter = Emitter::new(String::new())
			.with_base_indent(base_indent)
			.with_indent_step(self.indent_step.clone())
			.with_line_ending(line_ending);
		self.active = Some((index, emitter));
		Ok(())
	}

	fn close_active(&mut self) {
		if let Some((index, emitter)) = self.active.take() {
			self.outputs[index] = emitter.into_inner();
		}
	}

	fn finish(&mut self) -> Vec<String> {
		self.close_active();
		std::mem::take(&mut self.outputs)
	}

	fn current_block(&self) -> Option<usize> {
		self.active.as_ref().map(|(index, _)| *index)
	}

	fn register(&mut self, signatures: Vec<MacroSignature>) {
		for signature in signatures {
			self.signatures.insert(signature.name, signature.params);
		}
	}
}

impl Object for Token {
	fn repr(self: &Arc<Self>) -> ObjectRepr {
		ObjectRepr::Plain
	}

	fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&**self, f)
	}
}

/// The `emit` callable exposed to snippets. Every instance of one session
/// writes into the same emitter.
#[derive(Debug)]
struct EmitFunction {
	session: Arc<Session>,
}

impl EmitFunction {
	fn entry_point(&self) -> Value {
		Value::from_object(EmitFunction {
			session: Arc::clone(&self.session),
		})
	}

	fn emit_value(&self, state: &State<'_, '_>, value: &Value) -> Result<(), Error> {
		if let Some(token) = value.downcast_object_ref::<Token>() {
			let token = *token;
			return self.session.with_emitter(|emitter| emitter.apply_token(token));
		}
		if let Some(closure) = value.downcast_object_ref::<ScriptClosure>() {
			return closure.render(state, self.entry_point());
		}
		if let Some(component) = value.downcast_object_ref::<ScriptComponent>() {
			return Err(engine_error(CrowbarError::ComponentNotInvoked(
				component.name.clone(),
			)));
		}

		match value.kind() {
			ValueKind::Undefined => {
				Err(Error::new(
					ErrorKind::UndefinedError,
					"emit() received an undefined value",
				))
			}
			ValueKind::None => Ok(()),
			ValueKind::Seq | ValueKind::Iterable => {
				self.session
					.with_emitter(|emitter| emitter.apply_token(Token::Indent))?;
				for item in value.try_iter()? {
					self.emit_value(state, &item)?;
				}
				self.session
					.with_emitter(|emitter| emitter.apply_token(Token::Dedent))
			}
			_ => {
				let text = value.to_string();
				self.session.with_emitter(|emitter| emitter.write_text(&text))
			}
		}
	}
}

impl Object for EmitFunction {
	fn repr(self: &Arc<Self>) -> ObjectRepr {
		ObjectRepr::Plain
	}

	fn call(self: &Arc<Self>, state: &State<'_, '_>, args: &[Value]) -> Result<Value, Error> {
		for arg in args {
			if arg.is_kwargs() {
				return Err(Error::new(
					ErrorKind::TooManyArguments,
					"emit() does not accept keyword arguments",
				));
			}
			self.emit_value(state, arg)?;
		}
		Ok(Value::from(""))
	}

	fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("<emit>")
	}
}

/// Implementation of the `component(macro)` snippet function.
fn declare_component(session: &Session, routine: &Value) -> Result<Value, Error> {
	let not_a_routine = || {
		Error::new(
			ErrorKind::InvalidOperation,
			"component() expects a macro whose first parameter is `emit`",
		)
	};

	let name = routine
		.get_attr("name")?
		.as_str()
		.map(str::to_string)
		.ok_or_else(not_a_routine)?;
	let mut names = Vec::new();
	for argument in routine.get_attr("arguments")?.try_iter()? {
		names.push(argument.as_str().map(str::to_string).ok_or_else(not_a_routine)?);
	}
	if names.is_empty() {
		return Err(not_a_routine());
	}

	let signature = session.signature(&name);
	let params = names[1..]
		.iter()
		.map(|param| {
			let required = signature.as_ref().is_some_and(|signature| {
				signature
					.iter()
					.any(|known| known.name == *param && !known.has_default)
			});
			if required {
				Param::required(param.clone())
			} else {
				Param::optional(param.clone(), Value::UNDEFINED)
			}
		})
		.collect();

	Ok(Value::from_object(ScriptComponent {
		name,
		routine: routine.clone(),
		params,
	}))
}

/// A snippet-declared component. Calling it binds arguments.
#[derive(Debug)]
struct ScriptComponent {
	name: String,
	routine: Value,
	params: Vec<Param<Value>>,
}

impl Object for ScriptComponent {
	fn repr(self: &Arc<Self>) -> ObjectRepr {
		ObjectRepr::Plain
	}

	fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
		match key.as_str()? {
			"name" => Some(Value::from(self.name.clone())),
			_ => None,
		}
	}

	fn call(self: &Arc<Self>, _state: &State<'_, '_>, args: &[Value]) -> Result<Value, Error> {
		let (Rest(positional), kwargs): (Rest<Value>, Kwargs) = from_args(args)?;
		let mut bound = Args::new();
		for value in positional {
			bound = bound.arg(value);
		}
		let names: Vec<String> = kwargs.args().map(str::to_string).collect();
		for name in names {
			let value: Value = kwargs.get(&name)?;
			bound = bound.named(name, value);
		}

		let values = bind_arguments(&self.name, &self.params, bound).map_err(engine_error)?;
		Ok(Value::from_object(ScriptClosure {
			component: Arc::clone(self),
			values,
		}))
	}

	fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "<component {}>", self.name)
	}
}

/// A snippet component with its arguments bound, in declaration order.
#[derive(Debug)]
struct ScriptClosure {
	component: Arc<ScriptComponent>,
	values: Vec<Value>,
}

impl ScriptClosure {
	fn render(&self, state: &State<'_, '_>, emit: Value) -> Result<(), Error> {
		let mut args = Vec::with_capacity(self.values.len() + 1);
		args.push(emit);
		args.extend(self.values.iter().cloned());
		self.component.routine.call(state, &args)?;
		Ok(())
	}
}

impl Object for ScriptClosure {
	fn repr(self: &Arc<Self>) -> ObjectRepr {
		ObjectRepr::Plain
	}

	fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "<closure {}>", self.component.name)
	}
}
