// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn strand(home: &Path, args: &[&str]) -> Output {
	Command::new(env!("CARGO_BIN_EXE_strand"))
		.args(args)
		.env("HOME", home)
		.env("XDG_CONFIG_HOME", home.join(".config"))
		.env_remove("STRAND_CONFIG")
		.env_remove("STRAND_CREDENTIALS")
		.env_remove("RUST_LOG")
		.output()
		.unwrap()
}

fn stdout(output: &Output) -> String {
	assert!(
		output.status.success(),
		"stderr: {}",
		String::from_utf8_lossy(&output.stderr)
	);
	String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn encrypted_config_value_expands() {
	let home = TempDir::new().unwrap();
	let keyfile = home.path().join("k.aes");
	let keyfile = keyfile.to_str().unwrap();

	stdout(&strand(home.path(), &["aes", "new", "-k", keyfile]));
	let encoded = stdout(&strand(
		home.path(),
		&["aes", "encode", "-k", keyfile, "-p", "s3cret"],
	));
	assert!(encoded.starts_with("+encs+"));

	let config = home.path().join("app.toml");
	std::fs::write(
		&config,
		format!("[db]\npassword = {:?}\n", encoded.trim()),
	)
	.unwrap();

	let template = format!("pw=${{enc:{keyfile}:config:db.password}}");
	let out = strand(
		home.path(),
		&["--config", config.to_str().unwrap(), "expand", &template],
	);
	assert_eq!(stdout(&out), "pw=s3cret\n");
}

#[test]
fn login_then_creds_uses_user_keyfile() {
	let home = TempDir::new().unwrap();
	stdout(&strand(
		home.path(),
		&["login", "example.com", "-u", "ops", "-p", "pw"],
	));
	assert!(home.path().join(".config/strand/keyfile.aes").exists());

	let shown = stdout(&strand(home.path(), &["creds", "https://www.example.com/"]));
	assert!(shown.contains("username: ops"));
	assert!(shown.contains("password: [REDACTED]"));

	stdout(&strand(home.path(), &["logout", "--all"]));
	assert!(!strand(home.path(), &["creds", "example.com"]).status.success());
}

#[test]
fn logout_needs_a_domain_or_all() {
	let home = TempDir::new().unwrap();
	assert!(!strand(home.path(), &["logout"]).status.success());
}

#[test]
fn encode_source_reads_the_config_file() {
	let home = TempDir::new().unwrap();
	let keyfile = home.path().join("k.aes");
	let keyfile = keyfile.to_str().unwrap();
	stdout(&strand(home.path(), &["aes", "new", "-k", keyfile]));

	let config = home.path().join("app.toml");
	std::fs::write(&config, "[app]\nsecret = \"from-file\"\n").unwrap();
	let config = config.to_str().unwrap();

	let reference = stdout(&strand(
		home.path(),
		&["--config", config, "aes", "encode", "-k", keyfile, "-e", "-s", "${app.secret}"],
	));
	let decoded = stdout(&strand(
		home.path(),
		&["aes", "decode", "-e", reference.trim()],
	));
	assert_eq!(decoded, "from-file\n");
}
