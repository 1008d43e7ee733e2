// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::io::Write;

use anyhow::{anyhow, Result};
use strand_common_config::{Config, ExpandOptions, LookupTable};
use tracing::instrument;

/// Expand ${...} placeholders
#[derive(Debug, Clone, clap::Args)]
pub struct ExpandArgs {
	/// Templates to expand, one result per line
	#[arg(required = true)]
	pub templates: Vec<String>,

	/// Disable file and URL lookups
	#[arg(long)]
	pub no_external: bool,

	/// Trim whitespace from each substituted value
	#[arg(long)]
	pub trim: bool,

	/// Value printed when a template expands to nothing
	#[arg(long)]
	pub default: Option<String>,

	/// Lookup table entry for bare ${name} placeholders, as name=value.
	/// When any is given the environment is not used for bare names
	#[arg(short = 'l', long = "lookup", value_name = "NAME=VALUE")]
	pub lookups: Vec<String>,
}

impl ExpandArgs {
	fn options(&self) -> Result<ExpandOptions> {
		let mut opts = ExpandOptions::new()
			.external_lookups(!self.no_external)
			.trim_space(self.trim);
		if let Some(default) = &self.default {
			opts = opts.default_value(default.clone());
		}
		if !self.lookups.is_empty() {
			let table = self
				.lookups
				.iter()
				.map(|entry| {
					entry
						.split_once('=')
						.map(|(k, v)| (k.to_string(), v.to_string()))
						.ok_or_else(|| anyhow!("lookup {entry:?} is not NAME=VALUE"))
				})
				.collect::<Result<LookupTable>>()?;
			opts = opts.lookup_table(table);
		}
		Ok(opts)
	}
}

#[instrument(skip_all, fields(count = args.templates.len()))]
pub fn run(args: &ExpandArgs, config: &Config, out: &mut impl Write) -> Result<()> {
	let opts = args.options()?;
	for line in config.expand_string_slice(&args.templates, &opts) {
		writeln!(out, "{line}")?;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn args(templates: &[&str]) -> ExpandArgs {
		ExpandArgs {
			templates: templates.iter().map(|s| s.to_string()).collect(),
			no_external: false,
			trim: false,
			default: None,
			lookups: vec![],
		}
	}

	fn run_to_string(args: &ExpandArgs, config: &Config) -> String {
		let mut out = Vec::new();
		run(args, config, &mut out).unwrap();
		String::from_utf8(out).unwrap()
	}

	#[test]
	fn expands_against_config() {
		let config = Config::new();
		config.set_string("app.name", "strand");
		let out = run_to_string(&args(&["name=${app.name}", "literal"]), &config);
		assert_eq!(out, "name=strand\nliteral\n");
	}

	#[test]
	fn lookups_and_default() {
		let mut a = args(&["${who}", "${nobody}"]);
		a.lookups = vec!["who=world".to_string()];
		a.default = Some("-".to_string());
		let out = run_to_string(&a, &Config::new());
		assert_eq!(out, "world\n-\n");
	}

	#[test]
	fn malformed_lookup_is_an_error() {
		let mut a = args(&["x"]);
		a.lookups = vec!["novalue".to_string()];
		let mut out = Vec::new();
		assert!(run(&a, &Config::new(), &mut out).is_err());
	}

	#[test]
	fn no_external_blocks_files() {
		let dir = tempfile::TempDir::new().unwrap();
		let path = dir.path().join("v.txt");
		std::fs::write(&path, "file").unwrap();
		let template = format!("[${{{}}}]", path.display());

		assert_eq!(run_to_string(&args(&[template.as_str()]), &Config::new()), "[file]\n");
		let mut offline = args(&[template.as_str()]);
		offline.no_external = true;
		assert_eq!(run_to_string(&offline, &Config::new()), "[]\n");
	}
}
