// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `${...}` placeholder expansion.
//!
//! Placeholders are strictly `${name}`; a `$` not followed by `{` is
//! literal. `name` is dispatched in this order:
//!
//! 1. `enc:keyfile[|keyfile...]:value` decrypts `value` (an `+encs+`
//!    ciphertext, or a reference to one) with the first keyfile that works
//! 2. a path containing `/` but no `:` is read as a file
//! 3. `config:key`, or any name with a `.` and no `:`, reads the store
//! 4. a bare word is looked up in the lookup tables, or in the environment
//!    when no tables were given
//! 5. `env:NAME` reads the environment
//! 6. `prefix:rest` calls the resolver registered for `prefix`
//!
//! A placeholder that cannot be resolved becomes an empty string. Values
//! are read fresh on every call and expansion is not recursive, except that
//! an `enc:` value may itself be a reference.

use std::collections::BTreeMap;

use strand_common_crypto::{decode_with_candidates, split_keyfiles, ENCRYPTED_PREFIX};
use strand_common_secret::SecureValue;
use toml::{Table, Value};
use zeroize::Zeroizing;

use crate::error::ResolutionError;
use crate::options::ExpandOptions;
use crate::store::{value_to_string, Config};

/// Nesting limit for `enc:` values that refer to other values.
pub const MAX_EXPANSION_DEPTH: usize = 2;

const ENC_PREFIX: &str = "enc:";
const CONFIG_PREFIX: &str = "config:";
const ENV_PREFIX: &str = "env:";

/// A piece of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
	Literal(&'a str),
	/// The text between `${` and `}`
	Placeholder(&'a str),
}

/// Splits `input` into literal text and placeholders.
///
/// An unterminated `${` is dropped and scanning continues after it, so the
/// text that follows is kept and any later `${` is treated the same way.
pub fn segments(input: &str) -> Vec<Segment<'_>> {
	let mut out = Vec::new();
	let mut rest = input;
	while let Some(pos) = rest.find("${") {
		if pos > 0 {
			out.push(Segment::Literal(&rest[..pos]));
		}
		let after = &rest[pos + 2..];
		match after.find('}') {
			Some(end) => {
				out.push(Segment::Placeholder(&after[..end]));
				rest = &after[end + 1..];
			}
			None => rest = after,
		}
	}
	if !rest.is_empty() {
		out.push(Segment::Literal(rest));
	}
	out
}

/// What a placeholder resolved to. Decrypted values stay sealed until they
/// are written into the output.
enum Resolved {
	Plain(String),
	Sealed(SecureValue),
}

/// Output buffer shared by the three expansion variants.
trait Sink {
	fn push_bytes(&mut self, bytes: &[u8]);
}

impl Sink for String {
	fn push_bytes(&mut self, bytes: &[u8]) {
		self.push_str(&String::from_utf8_lossy(bytes));
	}
}

impl Sink for Zeroizing<Vec<u8>> {
	fn push_bytes(&mut self, bytes: &[u8]) {
		self.extend_from_slice(bytes);
	}
}

fn trim_bytes(bytes: &[u8]) -> &[u8] {
	let start = bytes
		.iter()
		.position(|b| !b.is_ascii_whitespace())
		.unwrap_or(bytes.len());
	let end = bytes
		.iter()
		.rposition(|b| !b.is_ascii_whitespace())
		.map_or(start, |p| p + 1);
	&bytes[start..end]
}

impl Config {
	/// Expands all placeholders in `input`.
	pub fn expand_string(&self, input: &str, options: &ExpandOptions) -> String {
		let opts = self.effective_options(options);
		if opts.is_no_expand() {
			return if input.is_empty() {
				opts.default_text().to_string()
			} else {
				input.to_string()
			};
		}
		let mut out = String::with_capacity(input.len());
		self.expand_into(input, &opts, &mut out);
		if out.is_empty() {
			return opts.default_text().to_string();
		}
		out
	}

	/// As [`Config::expand_string`] but into a buffer that is zeroed on
	/// drop. Use this when the result may be a secret.
	pub fn expand_bytes(&self, input: &str, options: &ExpandOptions) -> Zeroizing<Vec<u8>> {
		let opts = self.effective_options(options);
		if opts.is_no_expand() {
			let raw = if input.is_empty() {
				opts.default_text()
			} else {
				input
			};
			return Zeroizing::new(raw.as_bytes().to_vec());
		}
		let mut out = Zeroizing::new(Vec::with_capacity(input.len()));
		self.expand_into(input, &opts, &mut out);
		if out.is_empty() {
			out.extend_from_slice(opts.default_text().as_bytes());
		}
		out
	}

	/// As [`Config::expand_string`] but the result is sealed. The default
	/// value, when used, is a fresh copy.
	pub fn expand_secure(&self, input: &str, options: &ExpandOptions) -> SecureValue {
		let bytes = self.expand_bytes(input, options);
		SecureValue::from_slice(&bytes)
	}

	/// Expands each string in `inputs`.
	pub fn expand_string_slice<S: AsRef<str>>(
		&self,
		inputs: &[S],
		options: &ExpandOptions,
	) -> Vec<String> {
		inputs
			.iter()
			.map(|s| self.expand_string(s.as_ref(), options))
			.collect()
	}

	/// A copy of every setting with all strings, including those inside
	/// arrays and nested tables, expanded.
	pub fn expand_all_settings(&self, options: &ExpandOptions) -> Table {
		let all = self.all_settings();
		self.expand_table(all, options)
	}

	fn expand_table(&self, table: Table, options: &ExpandOptions) -> Table {
		table
			.into_iter()
			.map(|(k, v)| (k, self.expand_value(v, options)))
			.collect()
	}

	fn expand_value(&self, value: Value, options: &ExpandOptions) -> Value {
		match value {
			Value::String(s) => Value::String(self.expand_string(&s, options)),
			Value::Array(items) => Value::Array(
				items
					.into_iter()
					.map(|v| self.expand_value(v, options))
					.collect(),
			),
			Value::Table(t) => Value::Table(self.expand_table(t, options)),
			other => other,
		}
	}

	/// The stored value for `key` (or the initial value when it is absent
	/// or empty), unexpanded.
	fn raw_or_initial(&self, key: &str, opts: &ExpandOptions) -> String {
		match self.get_raw_string(key) {
			Some(s) if !s.is_empty() => s,
			_ => opts.initial().unwrap_or_default().to_string(),
		}
	}

	/// Reads `key` and expands it.
	pub fn get_string(&self, key: &str, options: &ExpandOptions) -> String {
		let opts = self.effective_options(options);
		let raw = self.raw_or_initial(key, &opts);
		self.expand_string(&raw, options)
	}

	/// Reads `key`, expands it and parses it as an integer.
	pub fn get_int(&self, key: &str, options: &ExpandOptions) -> Option<i64> {
		self.get_string(key, options).trim().parse().ok()
	}

	/// Reads `key` and expands it into a zeroing buffer.
	pub fn get_bytes(&self, key: &str, options: &ExpandOptions) -> Zeroizing<Vec<u8>> {
		let opts = self.effective_options(options);
		let raw = Zeroizing::new(self.raw_or_initial(key, &opts));
		self.expand_bytes(&raw, options)
	}

	/// Reads `key` and expands it into a sealed value. This is the way to
	/// read passwords, which are usually `${enc:...}` references.
	pub fn get_password(&self, key: &str, options: &ExpandOptions) -> SecureValue {
		let opts = self.effective_options(options);
		let raw = Zeroizing::new(self.raw_or_initial(key, &opts));
		self.expand_secure(&raw, options)
	}

	/// Reads `key` as a list of strings and expands each. An array yields
	/// its scalar elements; a single string is split on whitespace.
	pub fn get_string_slice(&self, key: &str, options: &ExpandOptions) -> Vec<String> {
		let raw: Vec<String> = match self.get(key) {
			Some(Value::Array(items)) => items.iter().filter_map(value_to_string).collect(),
			Some(other) => value_to_string(&other)
				.map(|s| s.split_whitespace().map(str::to_string).collect())
				.unwrap_or_default(),
			None => Vec::new(),
		};
		self.expand_string_slice(&raw, options)
	}

	/// Reads the table at `key` and expands each scalar entry. Nested tables
	/// and arrays are skipped.
	pub fn get_string_map(&self, key: &str, options: &ExpandOptions) -> BTreeMap<String, String> {
		self.get_map(key)
			.unwrap_or_default()
			.iter()
			.filter_map(|(k, v)| value_to_string(v).map(|s| (k.clone(), s)))
			.map(|(k, s)| {
				let expanded = self.expand_string(&s, options);
				(k, expanded)
			})
			.collect()
	}

	fn expand_into<S: Sink>(&self, input: &str, opts: &ExpandOptions, out: &mut S) {
		for segment in segments(input) {
			match segment {
				Segment::Literal(text) => out.push_bytes(text.as_bytes()),
				Segment::Placeholder(name) => match self.dispatch(name, opts, 1) {
					Ok(Resolved::Plain(value)) => {
						let value = Zeroizing::new(value);
						if opts.trims_space() {
							out.push_bytes(trim_bytes(value.as_bytes()));
						} else {
							out.push_bytes(value.as_bytes());
						}
					}
					Ok(Resolved::Sealed(value)) => {
						let open = value.open();
						if opts.trims_space() {
							out.push_bytes(trim_bytes(open.bytes()));
						} else {
							out.push_bytes(open.bytes());
						}
						open.destroy();
					}
					Err(e) => {
						tracing::debug!(placeholder = %name, error = %e, "placeholder expanded to empty");
					}
				},
			}
		}
	}

	fn dispatch(
		&self,
		name: &str,
		opts: &ExpandOptions,
		depth: usize,
	) -> Result<Resolved, ResolutionError> {
		if depth > MAX_EXPANSION_DEPTH {
			return Err(ResolutionError::DepthExceeded);
		}
		if name.is_empty() {
			return Ok(Resolved::Plain(String::new()));
		}
		if let Some(rest) = name.strip_prefix(ENC_PREFIX) {
			return self.resolve_encoded(rest, opts, depth).map(Resolved::Sealed);
		}
		self.dispatch_plain(name, opts).map(Resolved::Plain)
	}

	fn dispatch_plain(&self, name: &str, opts: &ExpandOptions) -> Result<String, ResolutionError> {
		let registry = opts.resolvers();

		if name.contains('/') && !name.contains(':') {
			return registry.resolve(self, "file", name, opts.trims_space());
		}

		let has_config_prefix = name.starts_with(CONFIG_PREFIX);
		if has_config_prefix || !name.contains(':') {
			if has_config_prefix || name.contains('.') {
				let key = name.strip_prefix(CONFIG_PREFIX).unwrap_or(name);
				return self
					.get_raw_string(key)
					.ok_or_else(|| ResolutionError::NotFound(format!("config key {key:?}")));
			}
			if opts.tables().is_empty() {
				return lookup_env(name);
			}
			return opts
				.tables()
				.iter()
				.find_map(|table| table.get(name).cloned())
				.ok_or_else(|| ResolutionError::NotFound(format!("lookup {name:?}")));
		}

		if let Some(var) = name.strip_prefix(ENV_PREFIX) {
			return lookup_env(var);
		}

		let (prefix, rest) = name
			.split_once(':')
			.ok_or_else(|| ResolutionError::Malformed(name.to_string()))?;
		let input = if opts.trims_prefix() { rest } else { name };
		registry.resolve(self, prefix, input, opts.trims_space())
	}

	/// Resolves the part of an `enc:` placeholder after the prefix.
	fn resolve_encoded(
		&self,
		reference: &str,
		opts: &ExpandOptions,
		depth: usize,
	) -> Result<SecureValue, ResolutionError> {
		let (keyfiles, payload) = split_encoded(reference, opts)
			.ok_or_else(|| ResolutionError::Malformed(format!("{ENC_PREFIX}{reference}")))?;

		let ciphertext = if payload.starts_with(ENCRYPTED_PREFIX) {
			payload.to_string()
		} else {
			match self.dispatch(payload, opts, depth + 1)? {
				Resolved::Plain(s) => s,
				Resolved::Sealed(v) => v.plaintext_string(),
			}
		};
		let ciphertext = ciphertext.trim();
		if ciphertext.is_empty() {
			return Err(ResolutionError::NotFound(format!("encrypted value {payload:?}")));
		}

		let candidates = split_keyfiles(keyfiles);
		Ok(decode_with_candidates(&candidates, ciphertext)?)
	}
}

/// Splits `keyfiles:payload` on the last `:`.
///
/// When the payload is a prefixed reference such as `env:NAME` or
/// `config:key`, the last colon is the one inside the reference, so a
/// trailing keyfile segment that names a known prefix is moved back into
/// the payload.
fn split_encoded<'a>(reference: &'a str, opts: &ExpandOptions) -> Option<(&'a str, &'a str)> {
	let (mut keyfiles, _) = reference.rsplit_once(':')?;
	if let Some((head, tail)) = keyfiles.rsplit_once(':') {
		let is_prefix = matches!(tail, "env" | "config")
			|| opts.resolvers().lookup(tail).is_some();
		if is_prefix && !tail.is_empty() {
			keyfiles = head;
		}
	}
	let payload = &reference[keyfiles.len() + 1..];
	if keyfiles.is_empty() {
		return None;
	}
	Some((keyfiles, payload))
}

/// Reads an environment variable. An unset or empty `HOME` falls back to
/// the user's home directory.
fn lookup_env(name: &str) -> Result<String, ResolutionError> {
	match std::env::var(name) {
		Ok(value) if !value.is_empty() => Ok(value),
		_ if name == "HOME" => dirs::home_dir()
			.map(|p| p.display().to_string())
			.ok_or_else(|| ResolutionError::NotFound("environment variable \"HOME\"".to_string())),
		Ok(value) => Ok(value),
		Err(_) => Err(ResolutionError::NotFound(format!(
			"environment variable {name:?}"
		))),
	}
}
