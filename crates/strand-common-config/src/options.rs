// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-call expansion options.

use std::collections::HashMap;
use std::fmt;

use crate::error::ResolutionError;
use crate::resolver::ResolverRegistry;
use crate::store::Config;

/// A lookup table consulted for bare `${word}` placeholders.
pub type LookupTable = HashMap<String, String>;

/// Options that control one expansion call.
///
/// Built with chained setters:
///
/// ```ignore
/// let opts = ExpandOptions::new()
///     .lookup_table(values)
///     .external_lookups(false)
///     .default_value("none");
/// let s = config.get_string("app.password", &opts);
/// ```
///
/// A [`Config`] may hold default options
/// ([`Config::set_default_expand_options`]); per-call options are layered on
/// top, with lookup tables appended and every other set option replacing
/// the default.
#[derive(Clone, Default)]
pub struct ExpandOptions {
	lookup_tables: Vec<LookupTable>,
	replace_tables: bool,
	resolvers: ResolverRegistry,
	trim_prefix: Option<bool>,
	trim_space: Option<bool>,
	default_value: Option<String>,
	initial_value: Option<String>,
	no_expand: Option<bool>,
}

impl ExpandOptions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a lookup table. Tables are searched in the order added.
	///
	/// When any table is present a bare `${word}` is only looked up in the
	/// tables; the environment is consulted only when there are none.
	pub fn lookup_table(mut self, table: LookupTable) -> Self {
		self.lookup_tables.push(table);
		self
	}

	/// Replaces all lookup tables, including any from the defaults.
	pub fn lookup_tables(mut self, tables: Vec<LookupTable>) -> Self {
		self.lookup_tables = tables;
		self.replace_tables = true;
		self
	}

	/// Registers a resolver for `${prefix:...}`.
	pub fn prefix<F>(mut self, prefix: impl Into<String>, resolver: F) -> Self
	where
		F: Fn(&Config, &str, bool) -> Result<String, ResolutionError> + Send + Sync + 'static,
	{
		self.resolvers.register(prefix, resolver);
		self
	}

	/// Enables or disables the built-in `file`, `http` and `https`
	/// resolvers. Enabled by default.
	pub fn external_lookups(mut self, enabled: bool) -> Self {
		self.resolvers.set_external_enabled(enabled);
		self
	}

	/// Pass resolvers only the text after `prefix:`.
	pub fn trim_prefix(mut self, enabled: bool) -> Self {
		self.trim_prefix = Some(enabled);
		self
	}

	/// Trim whitespace from each substituted value. Off by default. Literal
	/// text and the default value are never trimmed.
	pub fn trim_space(mut self, enabled: bool) -> Self {
		self.trim_space = Some(enabled);
		self
	}

	/// Value returned when the whole expansion is empty.
	pub fn default_value(mut self, value: impl Into<String>) -> Self {
		self.default_value = Some(value.into());
		self
	}

	/// Value used in place of an absent or empty configuration item. Unlike
	/// [`ExpandOptions::default_value`] it is expanded like a stored value.
	pub fn initial_value(mut self, value: impl Into<String>) -> Self {
		self.initial_value = Some(value.into());
		self
	}

	/// Return the input unexpanded (or the default when it is empty).
	pub fn no_expand(mut self, enabled: bool) -> Self {
		self.no_expand = Some(enabled);
		self
	}

	pub fn tables(&self) -> &[LookupTable] {
		&self.lookup_tables
	}

	pub fn resolvers(&self) -> &ResolverRegistry {
		&self.resolvers
	}

	pub fn trims_prefix(&self) -> bool {
		self.trim_prefix.unwrap_or(false)
	}

	pub fn trims_space(&self) -> bool {
		self.trim_space.unwrap_or(false)
	}

	pub fn default_text(&self) -> &str {
		self.default_value.as_deref().unwrap_or("")
	}

	pub fn initial(&self) -> Option<&str> {
		self.initial_value.as_deref()
	}

	pub fn is_no_expand(&self) -> bool {
		self.no_expand.unwrap_or(false)
	}

	/// Layers `call` over `self`.
	pub(crate) fn layered(&self, call: &ExpandOptions) -> ExpandOptions {
		let lookup_tables = if call.replace_tables {
			call.lookup_tables.clone()
		} else {
			self.lookup_tables
				.iter()
				.chain(call.lookup_tables.iter())
				.cloned()
				.collect()
		};
		ExpandOptions {
			lookup_tables,
			replace_tables: call.replace_tables || self.replace_tables,
			resolvers: self.resolvers.merged(&call.resolvers),
			trim_prefix: call.trim_prefix.or(self.trim_prefix),
			trim_space: call.trim_space.or(self.trim_space),
			default_value: call
				.default_value
				.clone()
				.or_else(|| self.default_value.clone()),
			initial_value: call
				.initial_value
				.clone()
				.or_else(|| self.initial_value.clone()),
			no_expand: call.no_expand.or(self.no_expand),
		}
	}
}

impl fmt::Debug for ExpandOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		// lookup table values may hold secrets, so only their sizes are shown
		f.debug_struct("ExpandOptions")
			.field(
				"lookup_tables",
				&self.lookup_tables.iter().map(HashMap::len).collect::<Vec<_>>(),
			)
			.field("resolvers", &self.resolvers)
			.field("trim_prefix", &self.trims_prefix())
			.field("trim_space", &self.trims_space())
			.field("has_default", &self.default_value.is_some())
			.field("has_initial", &self.initial_value.is_some())
			.field("no_expand", &self.is_no_expand())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn table(pairs: &[(&str, &str)]) -> LookupTable {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect()
	}

	#[test]
	fn defaults() {
		let opts = ExpandOptions::new();
		assert!(opts.tables().is_empty());
		assert!(opts.resolvers().external_enabled());
		assert!(!opts.trims_prefix());
		assert!(!opts.trims_space());
		assert_eq!(opts.default_text(), "");
		assert!(opts.initial().is_none());
		assert!(!opts.is_no_expand());
	}

	#[test]
	fn layering_appends_tables_and_overrides_flags() {
		let base = ExpandOptions::new()
			.lookup_table(table(&[("a", "1")]))
			.trim_space(true)
			.default_value("base");
		let call = ExpandOptions::new()
			.lookup_table(table(&[("b", "2")]))
			.default_value("call");

		let opts = base.layered(&call);
		assert_eq!(opts.tables().len(), 2);
		assert_eq!(opts.tables()[0]["a"], "1");
		assert!(opts.trims_space());
		assert_eq!(opts.default_text(), "call");
	}

	#[test]
	fn lookup_tables_replaces_defaults() {
		let base = ExpandOptions::new().lookup_table(table(&[("a", "1")]));
		let call = ExpandOptions::new().lookup_tables(vec![table(&[("b", "2")])]);
		let opts = base.layered(&call);
		assert_eq!(opts.tables().len(), 1);
		assert!(opts.tables()[0].contains_key("b"));
	}

	#[test]
	fn debug_hides_table_values() {
		let opts = ExpandOptions::new().lookup_table(table(&[("password", "hunter2")]));
		let printed = format!("{opts:?}");
		assert!(!printed.contains("hunter2"));
	}
}
