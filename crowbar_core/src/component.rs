use std::fmt;
use std::sync::Arc;

use crate::CrowbarError;
use crate::CrowbarResult;
use crate::Emit;
use crate::Item;

/// The body of a component. It receives the emit entry point of the
/// renderer it is rendered into, and its bound arguments.
pub type Routine = dyn Fn(&mut dyn Emit, &Arguments) -> CrowbarResult<()> + Send + Sync;

/// A declared component parameter. Parameters without a default are
/// required.
#[derive(Debug, Clone, PartialEq)]
pub struct Param<V = Item> {
	name: String,
	default: Option<V>,
}

impl<V> Param<V> {
	pub fn required(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			default: None,
		}
	}

	pub fn optional(name: impl Into<String>, default: impl Into<V>) -> Self {
		Self {
			name: name.into(),
			default: Some(default.into()),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn default_value(&self) -> Option<&V> {
		self.default.as_ref()
	}

	pub fn is_required(&self) -> bool {
		self.default.is_none()
	}
}

/// Arguments supplied when calling a component, before they are resolved
/// against its parameters.
#[derive(Debug, Clone)]
pub struct Args<V = Item> {
	positional: Vec<V>,
	named: Vec<(String, V)>,
}

impl<V> Default for Args<V> {
	fn default() -> Self {
		Self {
			positional: Vec::new(),
			named: Vec::new(),
		}
	}
}

impl<V> Args<V> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Append a positional argument.
	#[must_use]
	pub fn arg(mut self, value: impl Into<V>) -> Self {
		self.positional.push(value.into());
		self
	}

	/// Add a named argument.
	#[must_use]
	pub fn named(mut self, name: impl Into<String>, value: impl Into<V>) -> Self {
		self.named.push((name.into(), value.into()));
		self
	}

	pub fn is_empty(&self) -> bool {
		self.positional.is_empty() && self.named.is_empty()
	}
}

/// Resolve `args` against `params`: positional arguments fill parameters in
/// declaration order, named arguments fill the remaining ones, and defaults
/// fill whatever is left. Returns the values in declaration order.
pub fn bind_arguments<V: Clone>(
	component: &str,
	params: &[Param<V>],
	args: Args<V>,
) -> CrowbarResult<Vec<V>> {
	let Args { positional, named } = args;

	if positional.len() > params.len() {
		return Err(CrowbarError::TooManyArguments {
			component: component.to_string(),
			expected: params.len(),
			got: positional.len(),
		});
	}

	let mut slots: Vec<Option<V>> = positional.into_iter().map(Some).collect();
	slots.resize_with(params.len(), || None);

	for (name, value) in named {
		let Some(index) = params.iter().position(|param| param.name == name) else {
			return Err(CrowbarError::UnknownArgument {
				component: component.to_string(),
				param: name,
			});
		};
		if slots[index].is_some() {
			return Err(CrowbarError::DuplicateArgument {
				component: component.to_string(),
				param: name,
			});
		}
		slots[index] = Some(value);
	}

	slots
		.into_iter()
		.zip(params)
		.map(|(slot, param)| {
			slot.or_else(|| param.default.clone())
				.ok_or_else(|| CrowbarError::MissingArgument {
					component: component.to_string(),
					param: param.name.clone(),
				})
		})
		.collect()
}

/// The resolved arguments of a [`ComponentClosure`], keyed by parameter name.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
	entries: Vec<(String, Item)>,
}

impl Arguments {
	/// Look up an argument by parameter name.
	pub fn get(&self, name: &str) -> Option<&Item> {
		self.entries
			.iter()
			.find_map(|(key, value)| (key == name).then_some(value))
	}

	/// Look up an argument and return it only if it is text.
	pub fn str(&self, name: &str) -> Option<&str> {
		self.get(name).and_then(Item::as_str)
	}

	/// Look up an argument and return its elements if it is a sequence.
	pub fn seq(&self, name: &str) -> Option<&[Item]> {
		self.get(name).and_then(Item::as_seq)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Item)> {
		self.entries.iter().map(|(key, value)| (key.as_str(), value))
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

struct ComponentInner {
	name: String,
	params: Vec<Param>,
	routine: Box<Routine>,
}

/// A reusable generation routine. Calling it with [`Component::call`] binds
/// its arguments and returns a [`ComponentClosure`]; nothing is rendered
/// until the closure is emitted.
#[derive(Clone)]
pub struct Component {
	inner: Arc<ComponentInner>,
}

impl Component {
	pub fn name(&self) -> &str {
		&self.inner.name
	}

	pub fn params(&self) -> &[Param] {
		&self.inner.params
	}

	/// Bind `args` and produce a closure. Fails when a required parameter is
	/// missing or an argument does not match the signature.
	pub fn call(&self, args: Args) -> CrowbarResult<ComponentClosure> {
		let values = bind_arguments(&self.inner.name, &self.inner.params, args)?;
		let entries = self
			.inner
			.params
			.iter()
			.map(|param| param.name.clone())
			.zip(values)
			.collect();

		Ok(ComponentClosure {
			component: self.clone(),
			arguments: Arc::new(Arguments { entries }),
		})
	}
}

impl fmt::Debug for Component {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Component")
			.field("name", &self.inner.name)
			.field("params", &self.inner.params)
			.finish_non_exhaustive()
	}
}

/// Declare a component.
///
/// ```rust
/// use crowbar_core::Args;
/// use crowbar_core::Emitter;
/// use crowbar_core::Param;
/// use crowbar_core::component;
///
/// let greet = component("greet", [Param::optional("name", "thing")], |emit, args| {
/// 	emit.emit(format!("hello, {}!", args.str("name").unwrap_or_default()))
/// });
///
/// let mut emitter = Emitter::default();
/// emitter.emit(greet.call(Args::new().named("name", "gordon"))?)?;
/// assert_eq!(emitter.into_inner(), "hello, gordon!");
/// # Ok::<(), crowbar_core::CrowbarError>(())
/// ```
pub fn component<F>(name: impl Into<String>, params: impl IntoIterator<Item = Param>, routine: F) -> Component
where
	F: Fn(&mut dyn Emit, &Arguments) -> CrowbarResult<()> + Send + Sync + 'static,
{
	Component {
		inner: Arc::new(ComponentInner {
			name: name.into(),
			params: params.into_iter().collect(),
			routine: Box::new(routine),
		}),
	}
}

/// A component paired with one fully resolved set of arguments. Closures
/// are immutable and can be rendered any number of times.
#[derive(Clone)]
pub struct ComponentClosure {
	component: Component,
	arguments: Arc<Arguments>,
}

impl ComponentClosure {
	pub fn component(&self) -> &Component {
		&self.component
	}

	pub fn arguments(&self) -> &Arguments {
		&self.arguments
	}

	/// Run the component's routine against `emit`.
	pub fn render(&self, emit: &mut dyn Emit) -> CrowbarResult<()> {
		(self.component.inner.routine)(emit, &self.arguments)
	}
}

impl fmt::Debug for ComponentClosure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ComponentClosure")
			.field("component", &self.component.inner.name)
			.field("arguments", &self.arguments)
			.finish()
	}
}
