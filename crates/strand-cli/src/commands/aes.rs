// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `strand aes` - keyfile creation and explicit encode/decode.
//!
//! Unlike expansion, these commands fail loudly: a bad keyfile or an
//! undecodable value is an error.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use strand_common_config::{paths, Config, ExpandOptions};
use strand_common_crypto::{decode_with_candidates, KeyFile, KeyValues};
use tracing::instrument;

use super::{keyfile_at, secret_or_stdin};

#[derive(Debug, Subcommand)]
pub enum AesCommands {
	/// Create new key material
	New(NewArgs),

	/// Encrypt a value
	Encode(EncodeArgs),

	/// Decrypt a value
	Decode(DecodeArgs),
}

#[derive(Debug, clap::Args)]
pub struct NewArgs {
	/// Keyfile to write. Without this (or --user) the key is printed
	#[arg(short, long)]
	pub keyfile: Option<PathBuf>,

	/// Write the user keyfile (~/.config/strand/keyfile.aes)
	#[arg(long, conflicts_with = "keyfile")]
	pub user: bool,

	/// Suffix for the backup of an existing keyfile
	#[arg(short, long, default_value = "-prev")]
	pub backup: String,

	/// Overwrite an existing keyfile without a backup
	#[arg(short = 'F', long)]
	pub force: bool,
}

#[derive(Debug, clap::Args)]
pub struct EncodeArgs {
	/// Keyfile to encrypt with (default: the user keyfile)
	#[arg(short, long)]
	pub keyfile: Option<PathBuf>,

	/// Print a complete ${enc:...} reference
	#[arg(short, long)]
	pub expandable: bool,

	/// Plaintext to encrypt; read from stdin if neither this nor --source
	/// is given
	#[arg(short, long, conflicts_with = "source")]
	pub password: Option<String>,

	/// Template whose expansion is encrypted, e.g. "${env:DB_PASSWORD}"
	#[arg(short, long)]
	pub source: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct DecodeArgs {
	/// Keyfiles to try, in order (default: the user keyfile)
	#[arg(short, long)]
	pub keyfile: Vec<PathBuf>,

	/// A complete ${enc:...} reference
	#[arg(short, long, conflicts_with_all = ["keyfile", "password"])]
	pub expandable: Option<String>,

	/// The +encs+ value to decrypt
	#[arg(short, long)]
	pub password: Option<String>,
}

/// Runs an `aes` subcommand. `config` is what `--source` templates and
/// `--expandable` references are expanded against.
pub fn run(cmd: &AesCommands, config: &Config, out: &mut impl Write) -> Result<()> {
	match cmd {
		AesCommands::New(args) => new(args, out),
		AesCommands::Encode(args) => encode(args, config, out),
		AesCommands::Decode(args) => decode(args, config, out),
	}
}

fn user_keyfile() -> Result<KeyFile> {
	let path = paths::default_keyfile_path().context("locating user keyfile")?;
	Ok(KeyFile::from_path(path))
}

fn keyfile_or_user(keyfile: Option<&PathBuf>) -> Result<KeyFile> {
	match keyfile {
		Some(path) => Ok(keyfile_at(path)),
		None => user_keyfile(),
	}
}

#[instrument(skip_all)]
pub fn new(args: &NewArgs, out: &mut impl Write) -> Result<()> {
	let target = match (&args.keyfile, args.user) {
		(Some(path), _) => keyfile_at(path),
		(None, true) => user_keyfile()?,
		(None, false) => {
			let keys = KeyValues::generate();
			out.write_all(keys.to_keyfile_string().as_bytes())?;
			return Ok(());
		}
	};

	let suffix = if args.force { "" } else { args.backup.as_str() };
	let crc = target
		.create_with_backup(suffix)
		.with_context(|| format!("creating keyfile {target}"))?;
	writeln!(out, "keyfile {target} created, checksum {crc:08X}")?;
	Ok(())
}

#[instrument(skip_all)]
pub fn encode(args: &EncodeArgs, config: &Config, out: &mut impl Write) -> Result<()> {
	let keyfile = keyfile_or_user(args.keyfile.as_ref())?;

	let plaintext = match &args.source {
		Some(template) => {
			let value = config.expand_string(template, &ExpandOptions::new());
			if value.is_empty() {
				bail!("source {template:?} expanded to nothing");
			}
			value.into()
		}
		None => secret_or_stdin(args.password.as_deref(), "Password")?,
	};

	let encoded = keyfile
		.encode_string(plaintext.expose(), args.expandable)
		.with_context(|| format!("encoding with {keyfile}"))?;
	writeln!(out, "{encoded}")?;
	Ok(())
}

#[instrument(skip_all)]
pub fn decode(args: &DecodeArgs, config: &Config, out: &mut impl Write) -> Result<()> {
	if let Some(reference) = &args.expandable {
		if !reference.starts_with("${enc:") {
			bail!("expected a ${{enc:...}} reference");
		}
		let value = config.expand_secure(reference, &ExpandOptions::new());
		if value.is_empty() {
			bail!("no keyfile in the reference could decode the value");
		}
		let open = value.open();
		out.write_all(open.bytes())?;
		open.destroy();
		writeln!(out)?;
		return Ok(());
	}

	let password = match &args.password {
		Some(p) => p.clone(),
		None => secret_or_stdin(None, "Encrypted value")?.into_inner(),
	};
	let keyfiles = if args.keyfile.is_empty() {
		vec![user_keyfile()?]
	} else {
		args.keyfile
			.iter()
			.map(|p| keyfile_at(p))
			.collect()
	};

	let value = decode_with_candidates(&keyfiles, &password).context("decoding value")?;
	let open = value.open();
	out.write_all(open.bytes())?;
	open.destroy();
	writeln!(out)?;
	Ok(())
}
