// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod aes;
pub mod expand;
pub mod login;

use std::io::{self, BufRead};
use std::path::Path;

use anyhow::{bail, Context, Result};
use strand_common_crypto::KeyFile;
use strand_common_secret::SecretString;

pub use aes::AesCommands;
pub use expand::ExpandArgs;
pub use login::{CredsArgs, LoginArgs, LogoutArgs};

/// Uses `given` if set, otherwise reads one line from stdin.
pub(crate) fn secret_or_stdin(given: Option<&str>, prompt: &str) -> Result<SecretString> {
	match given {
		Some(value) => Ok(SecretString::from(value)),
		None => {
			eprint!("{prompt}: ");
			read_secret_line(io::stdin().lock())
		}
	}
}

/// A keyfile handle for a path given on the command line. `~/` is expanded
/// for UTF-8 paths; other paths are used as they are.
pub(crate) fn keyfile_at(path: &Path) -> KeyFile {
	match path.to_str() {
		Some(text) => KeyFile::new(text),
		None => KeyFile::from_path(path),
	}
}

pub(crate) fn read_secret_line(mut reader: impl BufRead) -> Result<SecretString> {
	let mut line = SecretString::default();
	reader
		.read_line(line.expose_mut())
		.context("reading from stdin")?;
	let trimmed_len = line.expose().trim_end_matches(['\r', '\n']).len();
	line.expose_mut().truncate(trimmed_len);
	if line.is_empty() {
		bail!("no value given");
	}
	Ok(line)
}
