//! `crowbar_core` is the core library for crowbar, an in-place code
//! generator. Source files carry generator code inside comment blocks, and
//! running crowbar replaces the region below each block with the block's
//! rendered output.
//!
//! ```text
//! # <<crowbar
//! # {% set names = ["a", "b"] %}
//! # {% for name in names %}{{ emit(name ~ " = None") }}{% endfor %}
//! # >>
//! a = None
//! b = None
//! # <<end>>
//! ```
//!
//! ## Processing Pipeline
//!
//! ```text
//! Source file
//!   → Parser (splits the document into passthrough text and blocks)
//!   → Execution context (evaluates every block's snippet in order, sharing bindings)
//!   → Emitter (turns emitted text and control tokens into indented lines)
//!   → Preprocessor (reassembles the document and replaces the file atomically)
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from `crowbar.toml`, including
//!   markers, indentation and data bindings.
//!
//! ## Key Types
//!
//! - [`Emitter`]: Indentation and line aware renderer behind `emit`.
//! - [`Item`]: Anything that can be emitted: text, a [`Token`], a nested
//!   sequence or a [`ComponentClosure`].
//! - [`Component`]: A reusable generation routine declared with
//!   [`component`].
//! - [`ExecutionContext`]: The binding environment shared by all blocks of
//!   one pass.
//! - [`ProcessOptions`]: Options for [`process_file`], optionally loaded
//!   from `crowbar.toml`.
//!
//! ## Snippets
//!
//! Block code is a [`minijinja`](https://docs.rs/minijinja) template whose
//! textual output is ignored. Output is produced by calling `emit`:
//!
//! ```text
//! {% macro greet(emit, thing="world") %}{{ emit("hello, " ~ thing ~ "!") }}{% endmacro %}
//! {% set greet = component(greet) %}
//! {{ emit(greet(thing="Gordon"), nl, "done") }}
//! ```
//!
//! The control tokens `indent`, `dedent`, `nl`, `fl` and `lc` are predefined.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crowbar_core::ProcessOptions;
//! use crowbar_core::process_file;
//! use std::path::Path;
//!
//! let options = ProcessOptions::load(Path::new("."))?;
//! let report = process_file(Path::new("src/generated.rs"), None, &options)?;
//! println!("rendered {} block(s)", report.blocks);
//! # Ok::<(), crowbar_core::CrowbarError>(())
//! ```

pub use component::*;
pub use config::*;
pub use context::*;
pub use emitter::*;
pub use error::*;
pub use parser::*;
pub use preprocessor::*;
pub use tokens::*;

mod component;
pub mod config;
mod context;
mod emitter;
#[allow(unused_assignments)]
mod error;
mod parser;
mod preprocessor;
pub(crate) mod signature;
mod tokens;

#[cfg(test)]
mod __fixtures;
