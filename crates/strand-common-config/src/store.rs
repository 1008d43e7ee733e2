// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The key-value store that placeholders are expanded against.

use std::fs;
use std::io::Write;
use std::path::Path;

use parking_lot::RwLock;
use toml::{Table, Value};
use tracing::instrument;

use crate::error::ConfigError;
use crate::options::ExpandOptions;

/// Default separator between key path segments.
pub const DEFAULT_DELIMITER: &str = ".";

/// A TOML-backed configuration.
///
/// Keys are paths through nested tables joined with the delimiter, so with
/// the default `.` the key `app.password` is `password` in table `app`.
/// Reads take a shared lock and writes an exclusive one; values are copied
/// out before any placeholder is resolved, so no lock is held while a
/// resolver runs.
pub struct Config {
	table: RwLock<Table>,
	delimiter: String,
	defaults: RwLock<ExpandOptions>,
}

impl Config {
	pub fn new() -> Self {
		Self::from_table(Table::new())
	}

	pub fn from_table(table: Table) -> Self {
		Self {
			table: RwLock::new(table),
			delimiter: DEFAULT_DELIMITER.to_string(),
			defaults: RwLock::new(ExpandOptions::default()),
		}
	}

	/// Parses TOML text into a new configuration.
	pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
		Ok(Self::from_table(toml::from_str(text)?))
	}

	/// Uses `delimiter` to split keys. Credential stores use `::` because
	/// their keys are host names that contain dots.
	pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
		self.delimiter = delimiter.into();
		self
	}

	pub fn delimiter(&self) -> &str {
		&self.delimiter
	}

	/// Joins key segments with this configuration's delimiter.
	pub fn join<I, S>(&self, parts: I) -> String
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		parts
			.into_iter()
			.map(|p| p.as_ref().to_string())
			.collect::<Vec<_>>()
			.join(&self.delimiter)
	}

	fn split<'a>(&self, key: &'a str) -> Vec<&'a str> {
		key.split(self.delimiter.as_str()).collect()
	}

	/// Options applied beneath the options of every expanding call.
	pub fn set_default_expand_options(&self, options: ExpandOptions) {
		*self.defaults.write() = options;
	}

	pub(crate) fn effective_options(&self, call: &ExpandOptions) -> ExpandOptions {
		self.defaults.read().layered(call)
	}

	/// Sets `key`, creating intermediate tables and replacing any non-table
	/// value in the way.
	pub fn set(&self, key: &str, value: impl Into<Value>) {
		let path = self.split(key);
		self.set_path(&path, value.into());
	}

	pub fn set_string(&self, key: &str, value: impl Into<String>) {
		self.set(key, Value::String(value.into()));
	}

	pub(crate) fn set_path(&self, path: &[&str], value: Value) {
		let Some((last, parents)) = path.split_last() else {
			return;
		};
		let mut table = self.table.write();
		let mut current: &mut Table = &mut table;
		for part in parents {
			let entry = current
				.entry(part.to_string())
				.or_insert_with(|| Value::Table(Table::new()));
			if !entry.is_table() {
				*entry = Value::Table(Table::new());
			}
			current = match entry {
				Value::Table(t) => t,
				_ => return,
			};
		}
		current.insert(last.to_string(), value);
	}

	/// Returns a copy of the value at `key`.
	pub fn get(&self, key: &str) -> Option<Value> {
		self.get_path(&self.split(key))
	}

	pub(crate) fn get_path(&self, path: &[&str]) -> Option<Value> {
		let table = self.table.read();
		let (last, parents) = path.split_last()?;
		let mut current: &Table = &table;
		for part in parents {
			current = current.get(*part)?.as_table()?;
		}
		current.get(*last).cloned()
	}

	pub fn is_set(&self, key: &str) -> bool {
		self.get(key).is_some()
	}

	/// The value at `key` as text, without expansion. Numbers, booleans and
	/// datetimes are formatted; arrays and tables are `None`.
	pub fn get_raw_string(&self, key: &str) -> Option<String> {
		self.get(key).and_then(|v| value_to_string(&v))
	}

	/// The table at `key`, if it is one.
	pub fn get_map(&self, key: &str) -> Option<Table> {
		match self.get(key)? {
			Value::Table(t) => Some(t),
			_ => None,
		}
	}

	/// Removes `key` and returns its value.
	pub fn remove(&self, key: &str) -> Option<Value> {
		self.remove_path(&self.split(key))
	}

	pub(crate) fn remove_path(&self, path: &[&str]) -> Option<Value> {
		let mut table = self.table.write();
		let (last, parents) = path.split_last()?;
		let mut current: &mut Table = &mut table;
		for part in parents {
			current = current.get_mut(*part)?.as_table_mut()?;
		}
		current.remove(*last)
	}

	/// Every leaf key, joined with the delimiter. Arrays are leaves.
	pub fn all_keys(&self) -> Vec<String> {
		let table = self.table.read();
		let mut keys = Vec::new();
		collect_keys(&table, &mut Vec::new(), &self.delimiter, &mut keys);
		keys
	}

	/// A copy of the whole table.
	pub fn all_settings(&self) -> Table {
		self.table.read().clone()
	}

	/// Merges `other` into this configuration. Tables merge recursively;
	/// other values replace.
	pub fn merge_table(&self, other: Table) {
		let mut table = self.table.write();
		merge_into(&mut table, other);
	}

	/// Loads a TOML file.
	#[instrument(skip_all, fields(path = %path.as_ref().display()))]
	pub fn load_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let text = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
		let table = toml::from_str(&text).map_err(|source| ConfigError::TomlParse {
			path: path.to_path_buf(),
			source,
		})?;
		tracing::debug!("configuration loaded");
		Ok(Self::from_table(table))
	}

	/// Writes the configuration as TOML, creating parent directories. On
	/// Unix the file is written with mode `0600` since it may hold
	/// credentials.
	#[instrument(skip_all, fields(path = %path.as_ref().display()))]
	pub fn save_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
		let path = path.as_ref();
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
		}
		let text = toml::to_string_pretty(&*self.table.read())?;

		let mut tmp = path.as_os_str().to_owned();
		tmp.push(".tmp");
		let tmp = std::path::PathBuf::from(tmp);
		write_private(&tmp, text.as_bytes()).map_err(|e| ConfigError::io(&tmp, e))?;
		if let Err(e) = fs::rename(&tmp, path) {
			let _ = fs::remove_file(&tmp);
			return Err(ConfigError::io(path, e));
		}
		tracing::debug!("configuration saved");
		Ok(())
	}
}

impl Default for Config {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for Config {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		// values may be secrets; show the shape only
		f.debug_struct("Config")
			.field("delimiter", &self.delimiter)
			.field("keys", &self.all_keys().len())
			.finish()
	}
}

pub(crate) fn value_to_string(value: &Value) -> Option<String> {
	match value {
		Value::String(s) => Some(s.clone()),
		Value::Integer(i) => Some(i.to_string()),
		Value::Float(f) => Some(f.to_string()),
		Value::Boolean(b) => Some(b.to_string()),
		Value::Datetime(d) => Some(d.to_string()),
		Value::Array(_) | Value::Table(_) => None,
	}
}

fn collect_keys(table: &Table, prefix: &mut Vec<String>, delimiter: &str, out: &mut Vec<String>) {
	for (key, value) in table {
		prefix.push(key.clone());
		match value {
			Value::Table(inner) => collect_keys(inner, prefix, delimiter, out),
			_ => out.push(prefix.join(delimiter)),
		}
		prefix.pop();
	}
}

fn merge_into(target: &mut Table, source: Table) {
	for (key, value) in source {
		match (target.get_mut(&key), value) {
			(Some(Value::Table(existing)), Value::Table(incoming)) => merge_into(existing, incoming),
			(_, value) => {
				target.insert(key, value);
			}
		}
	}
}

fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
	let mut options = fs::OpenOptions::new();
	options.write(true).create(true).truncate(true);
	#[cfg(unix)]
	{
		use std::os::unix::fs::OpenOptionsExt;
		options.mode(0o600);
	}
	let mut file = options.open(path)?;
	file.write_all(content)?;
	file.sync_all()
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn set_and_get_nested() {
		let config = Config::new();
		config.set_string("app.db.password", "pw");
		config.set("app.port", 8080);
		assert_eq!(config.get_raw_string("app.db.password").as_deref(), Some("pw"));
		assert_eq!(config.get_raw_string("app.port").as_deref(), Some("8080"));
		assert!(config.get_map("app.db").is_some());
		assert!(config.get_raw_string("app.db").is_none());
		assert!(!config.is_set("app.missing"));
	}

	#[test]
	fn set_replaces_scalar_with_table() {
		let config = Config::new();
		config.set_string("a", "scalar");
		config.set_string("a.b", "nested");
		assert_eq!(config.get_raw_string("a.b").as_deref(), Some("nested"));
	}

	#[test]
	fn custom_delimiter_keeps_dotted_segments() {
		let config = Config::new().with_delimiter("::");
		config.set_string("credentials::api.example.com::username", "alice");
		let creds = config.get_map("credentials").unwrap();
		assert!(creds.contains_key("api.example.com"));
		assert_eq!(config.join(["a", "b.c"]), "a::b.c");
	}

	#[test]
	fn remove_returns_value() {
		let config = Config::new();
		config.set_string("x.y", "1");
		assert_eq!(config.remove("x.y"), Some(Value::String("1".into())));
		assert!(config.remove("x.y").is_none());
		assert!(config.remove("nope.nope").is_none());
	}

	#[test]
	fn all_keys_lists_leaves() {
		let config = Config::parse(
			r#"
			top = "t"
			list = ["a", "b"]
			[app]
			name = "n"
			[app.db]
			host = "h"
			"#,
		)
		.unwrap();
		let mut keys = config.all_keys();
		keys.sort();
		assert_eq!(keys, vec!["app.db.host", "app.name", "list", "top"]);
	}

	#[test]
	fn merge_table_is_recursive() {
		let config = Config::parse("[app]\nname = \"a\"\nport = 1\n").unwrap();
		let other: Table = toml::from_str("[app]\nport = 2\n").unwrap();
		config.merge_table(other);
		assert_eq!(config.get_raw_string("app.name").as_deref(), Some("a"));
		assert_eq!(config.get_raw_string("app.port").as_deref(), Some("2"));
	}

	#[test]
	fn save_and_load_roundtrip() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("nested/config.toml");
		let config = Config::new();
		config.set_string("app.password", "${enc:~/.keyfile.aes:+encs+00}");
		config.save_file(&path).unwrap();

		let loaded = Config::load_file(&path).unwrap();
		assert_eq!(
			loaded.get_raw_string("app.password").as_deref(),
			Some("${enc:~/.keyfile.aes:+encs+00}")
		);
	}

	#[test]
	#[cfg(unix)]
	fn save_sets_owner_only_permissions() {
		use std::os::unix::fs::PermissionsExt;

		let dir = TempDir::new().unwrap();
		let path = dir.path().join("config.toml");
		Config::new().save_file(&path).unwrap();
		let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
		assert_eq!(mode, 0o600);
	}

	#[test]
	fn load_reports_parse_errors_with_path() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("bad.toml");
		fs::write(&path, "this is = = not toml").unwrap();
		let err = Config::load_file(&path).unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
		assert!(err.to_string().contains("bad.toml"));
	}

	#[test]
	fn debug_does_not_print_values() {
		let config = Config::new();
		config.set_string("password", "hunter2");
		assert!(!format!("{config:?}").contains("hunter2"));
	}
}
