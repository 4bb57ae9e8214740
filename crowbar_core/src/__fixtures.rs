use std::path::Path;
use std::path::PathBuf;

use crate::*;

pub(crate) fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
	let path = dir.join(name);
	std::fs::write(&path, content).unwrap_or_else(|e| panic!("write {name}: {e}"));
	path
}

pub(crate) fn read_file(path: &Path) -> String {
	std::fs::read_to_string(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

pub(crate) fn snippet(code: &str) -> Snippet {
	Snippet {
		code: code.to_string(),
		base_indent: String::new(),
		line_ending: "\n".to_string(),
		start_line: 1,
		first_code_line: 2,
	}
}

pub(crate) fn greet() -> Component {
	component("greet", [Param::optional("name", "thing")], |emit, args| {
		emit.emit(format!("hello, {}!", args.str("name").unwrap_or_default()))
	})
}

pub(crate) fn greet_required() -> Component {
	component("greet", [Param::required("name")], |emit, args| {
		emit.emit(format!("hello, {}!!", args.str("name").unwrap_or_default()))
	})
}

/// Emits `val` unchanged.
pub(crate) fn as_value() -> Component {
	component("as_value", [Param::optional("val", Item::Nothing)], |emit, args| {
		emit.emit(args.get("val").cloned())
	})
}

pub(crate) fn strjoin() -> Component {
	component(
		"strjoin",
		[
			Param::optional("sep", ", "),
			Param::optional("components", Item::Seq(Vec::new())),
		],
		|emit, args| {
			let sep = args.str("sep").unwrap_or_default();
			for (index, item) in args.seq("components").unwrap_or_default().iter().enumerate() {
				if index > 0 {
					emit.emit_all(items![LC, sep, LC])?;
				}
				emit.emit(item.clone())?;
			}
			Ok(())
		},
	)
}

pub(crate) fn cfunc() -> Component {
	let strjoin = strjoin();
	component(
		"cfunc",
		[
			Param::required("label"),
			Param::optional("args", Item::Seq(Vec::new())),
			Param::optional("ret", "void"),
			Param::optional("body", Item::Nothing),
		],
		move |emit, args| {
			let label = args
				.str("label")
				.ok_or_else(|| CrowbarError::component("cfunc", "must name the function"))?;
			let params = strjoin.call(
				Args::new().named("components", args.get("args").cloned().unwrap_or_default()),
			)?;
			emit.emit_all(items![
				FL,
				args.str("ret").unwrap_or("void"),
				LC,
				format!(" {label}("),
				LC,
				params,
				LC,
				") {",
				INDENT,
				NL,
				args.get("body").cloned(),
				FL,
				DEDENT,
				"}",
			])
		},
	)
}

pub(crate) fn param() -> Component {
	component(
		"param",
		[Param::required("ctype"), Param::required("label")],
		|emit, args| {
			emit.emit(format!(
				"{} {}",
				args.str("ctype").unwrap_or_default(),
				args.str("label").unwrap_or_default()
			))
		},
	)
}

pub(crate) fn zebody() -> Component {
	component("zebody", [], |emit, _| emit.emit("return x + y;"))
}

/// The `int add(int x, int y)` generator written as a snippet.
pub(crate) const C_FUNCTION_DOCUMENT: &str = concat!(
	"#include <stdio.h>\n",
	"\n",
	"// <<crowbar\n",
	"// {% macro strjoin(emit, components, sep=\", \") %}{% for c in components %}{% if not loop.first %}{{ emit(lc, sep, lc) }}{% endif %}{{ emit(c) }}{% endfor %}{% endmacro %}\n",
	"// {% set strjoin = component(strjoin) %}\n",
	"// {% macro cfunc(emit, label, args=[], ret=\"void\", body=none) %}{{ emit(fl, ret, lc, \" \" ~ label ~ \"(\", lc, strjoin(args), lc, \") {\", indent, nl, body, fl, dedent, \"}\") }}{% endmacro %}\n",
	"// {% set cfunc = component(cfunc) %}\n",
	"// {% macro param(emit, ctype, label) %}{{ emit(ctype ~ \" \" ~ label) }}{% endmacro %}\n",
	"// {% set param = component(param) %}\n",
	"// {% macro zebody(emit) %}{{ emit(\"return x + y;\") }}{% endmacro %}\n",
	"// {% set zebody = component(zebody) %}\n",
	"// {{ emit(cfunc(label=\"add\", args=[param(ctype=\"int\", label=\"x\"), param(\"int\", \"y\")], ret=\"int\", body=zebody())) }}\n",
	"// >>\n",
	"// <<end>>\n",
	"\n",
	"int main(void) { return add(1, 2); }\n",
);

/// Two blocks: the first renders, the second fails at runtime.
pub(crate) const FAILING_SECOND_BLOCK_DOCUMENT: &str = concat!(
	"\n",
	"hello, world\n",
	"\n",
	"# <<crowbar\n",
	"# {{ emit(\"hey\") }}\n",
	"# >>\n",
	"output from last run\n",
	"# <<end>>\n",
	"\n",
	"more stuff\n",
	"\n",
	"# <<crowbar\n",
	"# {{ does_not_exist() }}\n",
	"# >>\n",
	"output from last run, also\n",
	"# <<end>>",
);

/// Code lines indented less than the start marker. They share a prefix, so
/// it is stripped.
pub(crate) const WRONG_PREFIX_DOCUMENT: &str = concat!(
	"    # <<crowbar\n",
	"  # {% set greeting = \"hi\" %}{{ emit(greeting) }}\n",
	"  # {% set other = 1 %}\n",
	"    # >>\n",
	"    # <<end>>\n",
);
