// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Prefix to resolver mapping for `${prefix:...}` placeholders.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use strand_common_crypto::expand_home;
use tracing::instrument;

use crate::error::ResolutionError;
use crate::store::Config;

/// A placeholder resolver.
///
/// Called with the configuration being expanded, the placeholder contents
/// (with or without the prefix, see [`crate::ExpandOptions::trim_prefix`])
/// and whether the result should be whitespace-trimmed.
pub type ResolverFn =
	Arc<dyn Fn(&Config, &str, bool) -> Result<String, ResolutionError> + Send + Sync>;

/// Prefixes served by the built-in external resolvers.
pub const EXTERNAL_PREFIXES: [&str; 3] = ["file", "http", "https"];

/// Resolvers keyed by prefix.
///
/// The built-in `file`, `http` and `https` resolvers are active unless
/// external lookups are disabled. A registered resolver for the same prefix
/// replaces the built-in and stays active regardless of that flag.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
	custom: BTreeMap<String, ResolverFn>,
	external: Option<bool>,
}

impl ResolverRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `resolver` for `prefix` (without the trailing `:`).
	pub fn register<F>(&mut self, prefix: impl Into<String>, resolver: F)
	where
		F: Fn(&Config, &str, bool) -> Result<String, ResolutionError> + Send + Sync + 'static,
	{
		self.custom.insert(prefix.into(), Arc::new(resolver));
	}

	pub fn set_external_enabled(&mut self, enabled: bool) {
		self.external = Some(enabled);
	}

	/// Whether the built-in external resolvers are active. Defaults to true.
	pub fn external_enabled(&self) -> bool {
		self.external.unwrap_or(true)
	}

	/// Finds the active resolver for `prefix`, if any.
	pub fn lookup(&self, prefix: &str) -> Option<ResolverFn> {
		if let Some(resolver) = self.custom.get(prefix) {
			return Some(resolver.clone());
		}
		if !self.external_enabled() {
			return None;
		}
		let builtin: ResolverFn = match prefix {
			"file" => Arc::new(fetch_file),
			"http" | "https" => Arc::new(fetch_url),
			_ => return None,
		};
		Some(builtin)
	}

	/// Resolves `input` with the resolver for `prefix`.
	pub fn resolve(
		&self,
		config: &Config,
		prefix: &str,
		input: &str,
		trim: bool,
	) -> Result<String, ResolutionError> {
		match self.lookup(prefix) {
			Some(resolver) => resolver(config, input, trim),
			None if EXTERNAL_PREFIXES.contains(&prefix) => {
				Err(ResolutionError::Disabled(prefix.to_string()))
			}
			None => Err(ResolutionError::UnknownPrefix(prefix.to_string())),
		}
	}

	/// Layers `other` on top of `self`: its resolvers replace same-prefix
	/// entries and its external flag, if set, wins.
	pub(crate) fn merged(&self, other: &ResolverRegistry) -> ResolverRegistry {
		let mut custom = self.custom.clone();
		custom.extend(other.custom.iter().map(|(k, v)| (k.clone(), v.clone())));
		ResolverRegistry {
			custom,
			external: other.external.or(self.external),
		}
	}
}

impl fmt::Debug for ResolverRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResolverRegistry")
			.field("custom", &self.custom.keys().collect::<Vec<_>>())
			.field("external", &self.external_enabled())
			.finish()
	}
}

/// Reads a local file.
///
/// Accepts `file:path`, `file://path`, `file:~/path` and bare paths
/// (`/abs`, `~/home-relative`, `./relative`).
#[instrument(skip(_config), fields(input = %input))]
pub fn fetch_file(_config: &Config, input: &str, trim: bool) -> Result<String, ResolutionError> {
	let mut path = input.strip_prefix("file:").unwrap_or(input);
	if path.starts_with("//") {
		path = &path[1..];
	}
	let path = expand_home(path);
	let content = std::fs::read_to_string(&path).map_err(|source| ResolutionError::Io {
		path: path.clone(),
		source,
	})?;
	Ok(trimmed(content, trim))
}

/// Performs an HTTP GET and returns the body.
#[instrument(skip(_config), fields(url = %url))]
pub fn fetch_url(_config: &Config, url: &str, trim: bool) -> Result<String, ResolutionError> {
	let client = strand_common_http::new_client();
	let body = strand_common_http::fetch_text(&client, url)?;
	Ok(trimmed(body, trim))
}

fn trimmed(value: String, trim: bool) -> String {
	if trim {
		value.trim().to_string()
	} else {
		value
	}
}
