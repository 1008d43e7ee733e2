// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! On-disk key material.
//!
//! A keyfile holds one [`KeyValues`] pair in the two-line text format. Its
//! CRC32 fingerprint is taken over the raw file bytes, so a keyfile written
//! by another tool with extra comment lines has a different fingerprint to
//! one written here.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use strand_common_secret::SecureValue;
use tracing::instrument;

use crate::cipher::{KeyValues, ENCRYPTED_PREFIX};
use crate::error::{KeyFileError, Result};
use crate::paths::{abbreviate_home, expand_home};

/// Separator between alternative keyfiles in an `enc:` reference.
pub const KEYFILE_SEPARATOR: char = '|';

/// A path to a keyfile. Nothing is read until an operation needs it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyFile {
	path: PathBuf,
}

impl KeyFile {
	/// Creates a handle, expanding a leading `~/`.
	pub fn new(path: impl AsRef<str>) -> Self {
		Self {
			path: expand_home(path.as_ref()),
		}
	}

	pub fn from_path(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// The final path component, or an empty string for a bare root.
	pub fn base(&self) -> String {
		self.path
			.file_name()
			.map(|name| name.to_string_lossy().into_owned())
			.unwrap_or_default()
	}

	/// The directory containing the keyfile.
	pub fn dir(&self) -> PathBuf {
		self.path
			.parent()
			.map(Path::to_path_buf)
			.unwrap_or_else(|| PathBuf::from("."))
	}

	/// Joins further components onto the keyfile path.
	pub fn concat<I, S>(&self, extras: I) -> PathBuf
	where
		I: IntoIterator<Item = S>,
		S: AsRef<Path>,
	{
		extras
			.into_iter()
			.fold(self.path.clone(), |acc, extra| acc.join(extra))
	}

	/// Reads and parses the key material.
	#[instrument(skip(self), fields(path = %self.path.display()))]
	pub fn read(&self) -> Result<KeyValues> {
		let text = fs::read_to_string(&self.path).map_err(|e| KeyFileError::io(&self.path, e))?;
		KeyValues::parse(&text).map_err(|source| KeyFileError::Invalid {
			path: self.path.clone(),
			source,
		})
	}

	/// Writes `keys`, replacing any existing file.
	///
	/// Parent directories are created. The new content goes to a sibling
	/// temporary file (mode `0600` on Unix) which is then renamed over the
	/// target, so readers never observe a half-written keyfile.
	#[instrument(skip(self, keys), fields(path = %self.path.display()))]
	pub fn write(&self, keys: &KeyValues) -> Result<()> {
		let dir = self.dir();
		fs::create_dir_all(&dir).map_err(|e| KeyFileError::io(&dir, e))?;

		let tmp = self.sibling(".tmp");
		let content = keys.to_keyfile_string();
		write_private(&tmp, content.as_bytes()).map_err(|e| KeyFileError::io(&tmp, e))?;
		if let Err(e) = fs::rename(&tmp, &self.path) {
			let _ = fs::remove_file(&tmp);
			return Err(KeyFileError::io(&self.path, e));
		}
		tracing::debug!("keyfile written");
		Ok(())
	}

	/// CRC32 of the raw file bytes.
	pub fn checksum(&self) -> Result<u32> {
		let file = fs::File::open(&self.path).map_err(|e| KeyFileError::io(&self.path, e))?;
		crate::cipher::checksum_reader(file).map_err(|e| KeyFileError::io(&self.path, e))
	}

	/// Returns the checksum of the keyfile, creating it with fresh key
	/// material first if it does not exist. The flag reports whether a new
	/// file was created. Any error other than a missing file is returned
	/// untouched; an unreadable keyfile is never replaced.
	#[instrument(skip(self), fields(path = %self.path.display()))]
	pub fn read_or_create(&self) -> Result<(u32, bool)> {
		match self.checksum() {
			Ok(crc) => Ok((crc, false)),
			Err(e) if e.is_not_found() => {
				self.write(&KeyValues::generate())?;
				tracing::info!("created new keyfile");
				Ok((self.checksum()?, true))
			}
			Err(e) => Err(e),
		}
	}

	/// Writes fresh key material. If a keyfile already exists and `suffix`
	/// is non-empty, it is first renamed to `name<suffix>.ext`; an empty
	/// suffix overwrites it. Returns the new checksum.
	#[instrument(skip(self), fields(path = %self.path.display()))]
	pub fn create_with_backup(&self, suffix: &str) -> Result<u32> {
		if !suffix.is_empty() && self.path.exists() {
			let backup = self.backup_path(suffix);
			fs::rename(&self.path, &backup).map_err(|e| KeyFileError::io(&backup, e))?;
			tracing::info!(backup = %backup.display(), "existing keyfile backed up");
		}
		self.write(&KeyValues::generate())?;
		self.checksum()
	}

	/// Path the current keyfile is moved to by [`KeyFile::create_with_backup`].
	pub fn backup_path(&self, suffix: &str) -> PathBuf {
		let stem = self
			.path
			.file_stem()
			.map(|s| s.to_string_lossy().into_owned())
			.unwrap_or_default();
		let name = match self.path.extension() {
			Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
			None => format!("{stem}{suffix}"),
		};
		self.dir().join(name)
	}

	/// Encrypts `plaintext` with this keyfile.
	///
	/// Returns `+encs+HEX`, or with `expandable` set a complete
	/// `${enc:<keyfile>:+encs+HEX}` reference that names this keyfile with
	/// the home directory abbreviated.
	pub fn encode_string(&self, plaintext: &str, expandable: bool) -> Result<String> {
		let keys = self.read()?;
		let encoded = format!("{ENCRYPTED_PREFIX}{}", keys.encode(plaintext.as_bytes())?);
		if expandable {
			Ok(format!("${{enc:{}:{encoded}}}", abbreviate_home(&self.path)))
		} else {
			Ok(encoded)
		}
	}

	/// As [`KeyFile::encode_string`] for a sealed plaintext, without the
	/// expandable form.
	pub fn encode_secure(&self, plaintext: &SecureValue) -> Result<String> {
		let keys = self.read()?;
		Ok(format!("{ENCRYPTED_PREFIX}{}", keys.encode_secure(plaintext)?))
	}

	pub fn decode_string(&self, input: &str) -> Result<String> {
		Ok(self.read()?.decode_string(input)?)
	}

	pub fn decode_secure(&self, input: &str) -> Result<SecureValue> {
		Ok(self.read()?.decode_secure(input)?)
	}

	fn sibling(&self, extra: &str) -> PathBuf {
		let mut name = self.path.as_os_str().to_owned();
		name.push(extra);
		PathBuf::from(name)
	}
}

impl fmt::Display for KeyFile {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.path.display())
	}
}

impl From<&str> for KeyFile {
	fn from(path: &str) -> Self {
		Self::new(path)
	}
}

/// Splits a `|` separated keyfile list into handles, skipping empty entries.
pub fn split_keyfiles(list: &str) -> Vec<KeyFile> {
	list.split(KEYFILE_SEPARATOR)
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(KeyFile::new)
		.collect()
}

/// Decrypts `input` with the first keyfile that works.
///
/// Candidates are tried in order. One that cannot be read, whose key does
/// not fit the ciphertext, or whose plaintext is not UTF-8 is skipped. The
/// UTF-8 test makes this probabilistic: a wrong key can, very rarely, pass.
pub fn decode_with_candidates<'a, I>(keyfiles: I, input: &str) -> Result<SecureValue>
where
	I: IntoIterator<Item = &'a KeyFile>,
{
	for keyfile in keyfiles {
		match keyfile.decode_secure(input) {
			Ok(value) => return Ok(value),
			Err(e) => {
				tracing::debug!(keyfile = %keyfile, error = %e, "keyfile candidate rejected");
			}
		}
	}
	Err(KeyFileError::NoMatchingKeyFile)
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

	fn keyfile_in(dir: &TempDir, name: &str) -> KeyFile {
		KeyFile::from_path(dir.path().join(name))
	}

	#[test]
	fn write_then_read() {
		let dir = TempDir::new().unwrap();
		let kf = keyfile_in(&dir, "keyfile.aes");
		let keys = KeyValues::generate();
		kf.write(&keys).unwrap();

		let loaded = kf.read().unwrap();
		assert_eq!(loaded.checksum(), keys.checksum());
		assert_eq!(kf.checksum().unwrap(), keys.checksum());
	}

	#[test]
	#[cfg(unix)]
	fn write_sets_owner_only_permissions() {
		use std::os::unix::fs::PermissionsExt;

		let dir = TempDir::new().unwrap();
		let kf = keyfile_in(&dir, "nested/dir/keyfile.aes");
		kf.write(&KeyValues::generate()).unwrap();

		let mode = fs::metadata(kf.path()).unwrap().permissions().mode() & 0o777;
		assert_eq!(mode, 0o600);
	}

	#[test]
	fn write_leaves_no_temporary_file() {
		let dir = TempDir::new().unwrap();
		let kf = keyfile_in(&dir, "keyfile.aes");
		kf.write(&KeyValues::generate()).unwrap();
		let names: Vec<_> = fs::read_dir(dir.path())
			.unwrap()
			.map(|e| e.unwrap().file_name())
			.collect();
		assert_eq!(names, vec![std::ffi::OsString::from("keyfile.aes")]);
	}

	#[test]
	fn read_missing_file_is_not_found() {
		let dir = TempDir::new().unwrap();
		let err = keyfile_in(&dir, "absent.aes").read().unwrap_err();
		assert!(err.is_not_found());
	}

	#[test]
	fn read_invalid_file_reports_path() {
		let dir = TempDir::new().unwrap();
		let kf = keyfile_in(&dir, "bad.aes");
		fs::write(kf.path(), "key=nothex\n").unwrap();
		let err = kf.read().unwrap_err();
		assert!(matches!(err, KeyFileError::Invalid { .. }));
		assert!(err.to_string().contains("bad.aes"));
	}

	#[test]
	fn read_or_create_creates_once() {
		let dir = TempDir::new().unwrap();
		let kf = keyfile_in(&dir, "keyfile.aes");

		let (first, created) = kf.read_or_create().unwrap();
		assert!(created);
		let (second, created) = kf.read_or_create().unwrap();
		assert!(!created);
		assert_eq!(first, second);
	}

	#[test]
	fn read_or_create_keeps_unreadable_file() {
		let dir = TempDir::new().unwrap();
		let kf = keyfile_in(&dir, "keyfile.aes");
		fs::create_dir(kf.path()).unwrap();
		assert!(kf.read_or_create().is_err());
		assert!(kf.path().is_dir());
	}

	#[test]
	fn create_with_backup_renames_existing() {
		let dir = TempDir::new().unwrap();
		let kf = keyfile_in(&dir, "keyfile.aes");
		let (old, _) = kf.read_or_create().unwrap();

		let new = kf.create_with_backup("-prev").unwrap();
		assert_ne!(old, new);

		let backup = KeyFile::from_path(dir.path().join("keyfile-prev.aes"));
		assert_eq!(backup.checksum().unwrap(), old);
		assert_eq!(kf.checksum().unwrap(), new);
	}

	#[test]
	fn create_with_empty_suffix_overwrites() {
		let dir = TempDir::new().unwrap();
		let kf = keyfile_in(&dir, "keyfile.aes");
		let (old, _) = kf.read_or_create().unwrap();
		let new = kf.create_with_backup("").unwrap();
		assert_ne!(old, new);
		assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
	}

	#[test]
	fn backup_path_without_extension() {
		let kf = KeyFile::from_path("/tmp/strand/keyfile");
		assert_eq!(kf.backup_path(".old"), PathBuf::from("/tmp/strand/keyfile.old"));
	}

	#[test]
	fn path_helpers() {
		let kf = KeyFile::from_path("/etc/strand/keyfile.aes");
		assert_eq!(kf.base(), "keyfile.aes");
		assert_eq!(kf.dir(), PathBuf::from("/etc/strand"));
		assert_eq!(kf.concat(["a", "b"]), PathBuf::from("/etc/strand/keyfile.aes/a/b"));
		assert_eq!(kf.to_string(), "/etc/strand/keyfile.aes");
	}

	#[test]
	fn new_expands_home() {
		let Some(home) = dirs::home_dir() else {
			return;
		};
		let kf = KeyFile::new("~/.config/strand/keyfile.aes");
		assert_eq!(kf.path(), home.join(".config/strand/keyfile.aes"));
	}

	#[test]
	fn encode_and_decode_string() {
		let dir = TempDir::new().unwrap();
		let kf = keyfile_in(&dir, "keyfile.aes");
		kf.read_or_create().unwrap();

		let encoded = kf.encode_string("s3cret", false).unwrap();
		assert!(encoded.starts_with(ENCRYPTED_PREFIX));
		assert_eq!(kf.decode_string(&encoded).unwrap(), "s3cret");

		let value = kf.decode_secure(&encoded).unwrap();
		assert_eq!(value.plaintext_string(), "s3cret");
	}

	#[test]
	fn encode_expandable_names_keyfile() {
		let dir = TempDir::new().unwrap();
		let kf = keyfile_in(&dir, "keyfile.aes");
		kf.read_or_create().unwrap();

		let encoded = kf.encode_string("pw", true).unwrap();
		let expected_prefix = format!("${{enc:{}:{ENCRYPTED_PREFIX}", abbreviate_home(kf.path()));
		assert!(encoded.starts_with(&expected_prefix), "{encoded}");
		assert!(encoded.ends_with('}'));
	}

	#[test]
	fn encode_secure_decodes() {
		let dir = TempDir::new().unwrap();
		let kf = keyfile_in(&dir, "keyfile.aes");
		kf.read_or_create().unwrap();
		let value = SecureValue::from("sealed");
		let encoded = kf.encode_secure(&value).unwrap();
		assert_eq!(kf.decode_string(&encoded).unwrap(), "sealed");
	}

	#[test]
	fn candidates_fall_back_in_either_order() {
		let dir = TempDir::new().unwrap();
		let right = keyfile_in(&dir, "right.aes");
		let wrong = keyfile_in(&dir, "wrong.aes");
		right.read_or_create().unwrap();
		wrong.read_or_create().unwrap();

		let plaintext = "x".repeat(300);
		let encoded = right.encode_string(&plaintext, false).unwrap();

		let forward = decode_with_candidates([&right, &wrong], &encoded).unwrap();
		assert_eq!(forward.plaintext_string(), plaintext);

		let reverse = decode_with_candidates([&wrong, &right], &encoded).unwrap();
		assert_eq!(reverse.plaintext_string(), plaintext);
	}

	#[test]
	fn candidates_skip_missing_files() {
		let dir = TempDir::new().unwrap();
		let missing = keyfile_in(&dir, "missing.aes");
		let right = keyfile_in(&dir, "right.aes");
		right.read_or_create().unwrap();
		let encoded = right.encode_string("value", false).unwrap();

		let value = decode_with_candidates([&missing, &right], &encoded).unwrap();
		assert_eq!(value.plaintext_string(), "value");
	}

	#[test]
	fn no_candidate_matches() {
		let dir = TempDir::new().unwrap();
		let missing = keyfile_in(&dir, "missing.aes");
		let err = decode_with_candidates([&missing], "+encs+00").unwrap_err();
		assert!(matches!(err, KeyFileError::NoMatchingKeyFile));

		let none: [&KeyFile; 0] = [];
		assert!(decode_with_candidates(none, "+encs+00").is_err());
	}

	#[test]
	fn split_keyfiles_ignores_empty_entries() {
		let list = split_keyfiles("/a/one.aes| /b/two.aes ||");
		assert_eq!(
			list,
			vec![
				KeyFile::from_path("/a/one.aes"),
				KeyFile::from_path("/b/two.aes")
			]
		);
	}
}
