use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

use crate::CrowbarError;
use crate::CrowbarResult;
use crate::Markers;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
	["crowbar.toml", ".crowbar.toml", ".config/crowbar.toml"];

/// Configuration loaded from a `crowbar.toml` file.
///
/// ```toml
/// indent_step = "    "
/// base_indent = ""
///
/// [markers]
/// start = "<<crowbar"
/// code_end = ">>"
/// end = "<<end>>"
///
/// [data]
/// pkg = "package.json"
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CrowbarConfig {
	/// String added per indentation level.
	#[serde(default)]
	pub indent_step: Option<String>,
	/// Indentation prepended to every block's own indentation.
	#[serde(default)]
	pub base_indent: Option<String>,
	#[serde(default)]
	pub markers: Markers,
	/// Map of binding name to a JSON or TOML file, relative to the directory
	/// the config was discovered from.
	#[serde(default)]
	pub data: BTreeMap<String, PathBuf>,
}

impl CrowbarConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if there is none.
	pub fn load(root: &Path) -> CrowbarResult<Option<CrowbarConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		debug!(path = %config_path.display(), "loading config");
		let content = std::fs::read_to_string(&config_path)?;
		let config: CrowbarConfig =
			toml::from_str(&content).map_err(|e| CrowbarError::ConfigParse(e.to_string()))?;
		config.markers.validate()?;

		Ok(Some(config))
	}

	/// Read each data file and parse it into a `serde_json::Value` keyed by
	/// binding name.
	pub fn load_data(&self, root: &Path) -> CrowbarResult<BTreeMap<String, serde_json::Value>> {
		let mut data = BTreeMap::new();

		for (name, rel_path) in &self.data {
			let path_display = rel_path.display().to_string();
			let content = std::fs::read_to_string(root.join(rel_path)).map_err(|e| {
				CrowbarError::DataFile {
					path: path_display.clone(),
					reason: e.to_string(),
				}
			})?;
			let format = rel_path
				.extension()
				.and_then(|e| e.to_str())
				.unwrap_or("")
				.to_ascii_lowercase();

			data.insert(name.clone(), parse_data_file(&content, &format, &path_display)?);
		}

		Ok(data)
	}
}

fn parse_data_file(
	content: &str,
	format: &str,
	path_display: &str,
) -> CrowbarResult<serde_json::Value> {
	let data_error = |reason: String| {
		CrowbarError::DataFile {
			path: path_display.to_string(),
			reason,
		}
	};

	match format {
		"json" => serde_json::from_str(content).map_err(|e| data_error(e.to_string())),
		"toml" => {
			let value: toml::Value =
				toml::from_str(content).map_err(|e| data_error(e.to_string()))?;
			Ok(toml_to_json(value))
		}
		"txt" | "text" => Ok(serde_json::Value::String(content.to_string())),
		other => {
			Err(data_error(format!(
				"unsupported data format `{other}`, expected `json`, `toml` or `txt`"
			)))
		}
	}
}

fn toml_to_json(value: toml::Value) -> serde_json::Value {
	match value {
		toml::Value::String(s) => serde_json::Value::String(s),
		toml::Value::Integer(i) => serde_json::Value::from(i),
		toml::Value::Float(f) => serde_json::Value::from(f),
		toml::Value::Boolean(b) => serde_json::Value::Bool(b),
		toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
		toml::Value::Array(items) => items.into_iter().map(toml_to_json).collect(),
		toml::Value::Table(table) => {
			serde_json::Value::Object(
				table
					.into_iter()
					.map(|(key, value)| (key, toml_to_json(value)))
					.collect(),
			)
		}
	}
}
