use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub fn crowbar_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("crowbar"));
	cmd.env("NO_COLOR", "1");
	cmd.env_remove("RUST_LOG");
	cmd
}

pub const GREETING_SOURCE: &str = concat!(
	"fn main() {\n",
	"\t// <<crowbar\n",
	"\t// {% for name in [\"ada\", \"grace\"] %}{{ emit(\"println!(\\\"hi \" ~ name ~ \"\\\");\") }}{% endfor %}\n",
	"\t// >>\n",
	"\t// <<end>>\n",
	"}\n",
);

pub const GREETING_RENDERED: &str = concat!(
	"fn main() {\n",
	"\t// <<crowbar\n",
	"\t// {% for name in [\"ada\", \"grace\"] %}{{ emit(\"println!(\\\"hi \" ~ name ~ \"\\\");\") }}{% endfor %}\n",
	"\t// >>\n",
	"\tprintln!(\"hi ada\");\n",
	"\tprintln!(\"hi grace\");\n",
	"\t// <<end>>\n",
	"}\n",
);
