// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `strand login`, `logout` and `creds`: the credentials file.
//!
//! Passwords are stored as `${enc:...}` references encrypted with a keyfile,
//! never in plain text.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use strand_common_config::{paths, Credentials, CredentialsFile};
use strand_common_crypto::KeyFile;
use tracing::instrument;

use super::{keyfile_at, secret_or_stdin};

#[derive(Debug, Clone, clap::Args)]
pub struct LoginArgs {
	/// Domain, host name or URL fragment the credentials apply to
	pub domain: String,

	#[arg(short, long)]
	pub username: Option<String>,

	/// Password; read from stdin if not given
	#[arg(short, long)]
	pub password: Option<String>,

	/// Keyfile used to encrypt the password, created if missing (default:
	/// the user keyfile)
	#[arg(short, long)]
	pub keyfile: Option<PathBuf>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct LogoutArgs {
	/// Domain to remove, exactly as stored
	#[arg(required_unless_present = "all")]
	pub domain: Option<String>,

	/// Remove all stored credentials
	#[arg(long, conflicts_with = "domain")]
	pub all: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub struct CredsArgs {
	/// URL or host name to match; lists stored domains when omitted
	pub lookup: Option<String>,
}

#[instrument(skip_all, fields(domain = %args.domain))]
pub fn login(args: &LoginArgs, path: &Path, out: &mut impl Write) -> Result<()> {
	let keyfile = match &args.keyfile {
		Some(p) => keyfile_at(p),
		None => KeyFile::from_path(paths::default_keyfile_path()?),
	};
	let (_, created) = keyfile
		.read_or_create()
		.with_context(|| format!("opening keyfile {keyfile}"))?;
	if created {
		writeln!(out, "created keyfile {keyfile}")?;
	}

	let password = secret_or_stdin(args.password.as_deref(), "Password")?;
	let reference = keyfile
		.encode_string(password.expose(), true)
		.context("encrypting password")?;

	let file = CredentialsFile::load(path)?;
	let record = Credentials {
		username: args.username.clone(),
		password: Some(reference.into()),
		..Credentials::new(&args.domain)
	};
	file.add(&record)?;
	file.save()
		.with_context(|| format!("saving {}", path.display()))?;
	writeln!(out, "credentials for {} saved", args.domain)?;
	Ok(())
}

#[instrument(skip_all)]
pub fn logout(args: &LogoutArgs, path: &Path, out: &mut impl Write) -> Result<()> {
	let file = CredentialsFile::load(path)?;
	if args.all {
		file.delete_all();
		writeln!(out, "all credentials removed")?;
	} else if let Some(domain) = &args.domain {
		if !file.delete(domain) {
			bail!("no credentials stored for {domain:?}");
		}
		writeln!(out, "credentials for {domain} removed")?;
	}
	file.save()
		.with_context(|| format!("saving {}", path.display()))?;
	Ok(())
}

/// Prints the matching record with secrets shown only as present or absent.
#[instrument(skip_all)]
pub fn show(args: &CredsArgs, path: &Path, out: &mut impl Write) -> Result<()> {
	let file = CredentialsFile::load(path)?;
	let Some(lookup) = &args.lookup else {
		for domain in file.domains() {
			writeln!(out, "{domain}")?;
		}
		return Ok(());
	};

	let Some(creds) = file.find(lookup) else {
		bail!("no credentials match {lookup:?}");
	};
	writeln!(out, "domain: {}", creds.domain)?;
	if let Some(username) = &creds.username {
		writeln!(out, "username: {username}")?;
	}
	if let Some(client_id) = &creds.client_id {
		writeln!(out, "client_id: {client_id}")?;
	}
	for (name, set) in [
		("password", creds.password.is_some()),
		("client_secret", creds.client_secret.is_some()),
		("token", creds.token.is_some()),
	] {
		if set {
			writeln!(out, "{name}: {}", strand_common_secret::REDACTED)?;
		}
	}
	if let Some(renewal) = &creds.renewal {
		writeln!(out, "renewal: {renewal}")?;
	}
	Ok(())
}
