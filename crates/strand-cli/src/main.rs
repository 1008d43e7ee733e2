// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `strand` - keyfiles, encrypted values, expansion and stored credentials.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use strand_common_config::global;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::{AesCommands, CredsArgs, ExpandArgs, LoginArgs, LogoutArgs};

#[derive(Parser, Debug)]
#[command(
	name = "strand",
	about = "Manage keyfiles, encrypted values and credentials",
	version
)]
struct Cli {
	/// Log debug output to stderr
	#[arg(short, long, global = true)]
	verbose: bool,

	/// TOML configuration file that placeholders are expanded against
	#[arg(long, global = true, env = "STRAND_CONFIG")]
	config: Option<PathBuf>,

	/// Credentials file (default: ~/.config/strand/credentials.toml)
	#[arg(long, global = true, env = "STRAND_CREDENTIALS")]
	credentials: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Keyfile and encrypted value operations
	#[command(subcommand)]
	Aes(AesCommands),

	/// Expand ${...} placeholders and print the results
	Expand(ExpandArgs),

	/// Store credentials for a domain
	Login(LoginArgs),

	/// Remove stored credentials
	Logout(LogoutArgs),

	/// Show the credentials that match a URL or host name
	Creds(CredsArgs),
}

fn init_tracing(verbose: bool) {
	let filter = if verbose {
		EnvFilter::new("debug")
	} else {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
	};
	tracing_subscriber::registry()
		.with(filter)
		.with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
		.init();
}

fn credentials_path(cli: &Cli) -> Result<PathBuf> {
	match &cli.credentials {
		Some(path) => Ok(path.clone()),
		None => strand_common_config::CredentialsFile::default_path()
			.context("locating credentials file"),
	}
}

fn main() -> Result<()> {
	let cli = Cli::parse();
	init_tracing(cli.verbose);

	if let Some(path) = &cli.config {
		let loaded = strand_common_config::Config::load_file(path)
			.with_context(|| format!("loading {}", path.display()))?;
		global().merge_table(loaded.all_settings());
	}

	let stdout = io::stdout();
	let mut out = stdout.lock();
	match &cli.command {
		Command::Aes(cmd) => commands::aes::run(cmd, global(), &mut out),
		Command::Expand(args) => commands::expand::run(args, global(), &mut out),
		Command::Login(args) => commands::login::login(args, &credentials_path(&cli)?, &mut out),
		Command::Logout(args) => commands::login::logout(args, &credentials_path(&cli)?, &mut out),
		Command::Creds(args) => commands::login::show(args, &credentials_path(&cli)?, &mut out),
	}
}
