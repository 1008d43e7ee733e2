// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-domain credentials stored under the `credentials` table.
//!
//! Each record lives at `credentials.<domain>` and is matched against URLs
//! and host names by case-insensitive substring, longest domain first.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strand_common_secret::{SecretString, SecureValue};
use toml::Value;
use tracing::instrument;

use crate::error::ConfigError;
use crate::options::ExpandOptions;
use crate::paths;
use crate::store::Config;

/// Top-level table holding credential records.
pub const CREDENTIALS_KEY: &str = "credentials";

/// Key delimiter for credential stores; domains contain dots.
pub const CREDENTIALS_DELIMITER: &str = "::";

/// One credential record. Secret fields are redacted when formatted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub domain: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub username: Option<String>,
	/// Plain text or a `${enc:...}` reference; see
	/// [`Credentials::expand_password`]
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub password: Option<SecretString>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_secret: Option<SecretString>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token: Option<SecretString>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub renewal: Option<String>,
}

impl Credentials {
	pub fn new(domain: impl Into<String>) -> Self {
		Self {
			domain: domain.into(),
			..Self::default()
		}
	}

	/// Expands the stored password against `config`, so that encrypted
	/// passwords are decrypted into a sealed value. An absent password is an
	/// empty value.
	pub fn expand_password(&self, config: &Config, options: &ExpandOptions) -> SecureValue {
		match &self.password {
			Some(password) => config.expand_secure(password.expose(), options),
			None => SecureValue::empty(),
		}
	}
}

impl Config {
	/// Finds the record whose domain is the longest case-insensitive
	/// substring of `lookup`.
	pub fn find_credentials(&self, lookup: &str) -> Option<Credentials> {
		let records = self.get_path(&[CREDENTIALS_KEY])?;
		let records = records.as_table()?;

		let mut domains: Vec<&String> = records.keys().collect();
		domains.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

		let lookup = lookup.to_lowercase();
		let domain = domains
			.into_iter()
			.find(|d| lookup.contains(&d.to_lowercase()))?;

		match records[domain.as_str()].clone().try_into::<Credentials>() {
			Ok(mut creds) => {
				creds.domain = domain.clone();
				Some(creds)
			}
			Err(e) => {
				tracing::warn!(domain = %domain, error = %e, "ignoring malformed credentials");
				None
			}
		}
	}

	/// Stores `creds` under its domain, replacing any existing record.
	pub fn add_credentials(&self, creds: &Credentials) -> Result<(), ConfigError> {
		if creds.domain.is_empty() {
			return Err(ConfigError::invalid_value("domain", "must not be empty"));
		}
		let value = Value::try_from(creds)?;
		self.set_path(&[CREDENTIALS_KEY, &creds.domain], value);
		tracing::debug!(domain = %creds.domain, "credentials stored");
		Ok(())
	}

	/// Removes the record for exactly `domain`. Returns whether one existed.
	pub fn delete_credentials(&self, domain: &str) -> bool {
		self.remove_path(&[CREDENTIALS_KEY, domain]).is_some()
	}

	/// Removes every credential record.
	pub fn delete_all_credentials(&self) {
		self.set_path(&[CREDENTIALS_KEY], Value::Table(toml::Table::new()));
	}

	/// Domains with stored credentials, sorted.
	pub fn credential_domains(&self) -> Vec<String> {
		let mut domains: Vec<String> = self
			.get_path(&[CREDENTIALS_KEY])
			.and_then(|v| v.as_table().map(|t| t.keys().cloned().collect()))
			.unwrap_or_default();
		domains.sort();
		domains
	}
}

/// A credentials file on disk, loaded with the `::` key delimiter.
#[derive(Debug)]
pub struct CredentialsFile {
	path: PathBuf,
	config: Config,
}

impl CredentialsFile {
	/// `credentials.toml` in the user config directory.
	pub fn default_path() -> Result<PathBuf, ConfigError> {
		Ok(paths::user_config_dir()?.join("credentials.toml"))
	}

	/// Loads the file at `path`. A missing file is an empty store.
	#[instrument(skip_all, fields(path = %path.as_ref().display()))]
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref().to_path_buf();
		let config = if path.exists() {
			Config::load_file(&path)?
		} else {
			tracing::debug!("no credentials file, starting empty");
			Config::new()
		};
		Ok(Self {
			path,
			config: config.with_delimiter(CREDENTIALS_DELIMITER),
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn find(&self, lookup: &str) -> Option<Credentials> {
		self.config.find_credentials(lookup)
	}

	pub fn add(&self, creds: &Credentials) -> Result<(), ConfigError> {
		self.config.add_credentials(creds)
	}

	pub fn delete(&self, domain: &str) -> bool {
		self.config.delete_credentials(domain)
	}

	pub fn delete_all(&self) {
		self.config.delete_all_credentials();
	}

	pub fn domains(&self) -> Vec<String> {
		self.config.credential_domains()
	}

	/// Writes the store back to its file with owner-only permissions.
	pub fn save(&self) -> Result<(), ConfigError> {
		self.config.save_file(&self.path)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use strand_common_crypto::KeyFile;
	use tempfile::TempDir;

	fn creds(domain: &str, user: &str) -> Credentials {
		Credentials {
			username: Some(user.to_string()),
			password: Some(format!("{user}-pw").into()),
			..Credentials::new(domain)
		}
	}

	fn store() -> Config {
		let config = Config::new().with_delimiter(CREDENTIALS_DELIMITER);
		config.add_credentials(&creds("example.com", "outer")).unwrap();
		config.add_credentials(&creds("sub.example.com", "inner")).unwrap();
		config.add_credentials(&creds("other.org", "other")).unwrap();
		config
	}

	#[test]
	fn longest_matching_domain_wins() {
		let found = store().find_credentials("test.sub.example.com").unwrap();
		assert_eq!(found.domain, "sub.example.com");
		assert_eq!(found.username.as_deref(), Some("inner"));

		let found = store().find_credentials("https://www.example.com/api").unwrap();
		assert_eq!(found.domain, "example.com");
	}

	#[test]
	fn matching_is_case_insensitive() {
		let found = store().find_credentials("HTTPS://OTHER.ORG/").unwrap();
		assert_eq!(found.username.as_deref(), Some("other"));
	}

	#[test]
	fn no_match_is_none() {
		assert!(store().find_credentials("unrelated.net").is_none());
		assert!(Config::new().find_credentials("example.com").is_none());
	}

	#[test]
	fn add_replaces_existing_record() {
		let config = store();
		let updated = Credentials {
			token: Some("tok".into()),
			..Credentials::new("other.org")
		};
		config.add_credentials(&updated).unwrap();
		let found = config.find_credentials("other.org").unwrap();
		assert!(found.username.is_none());
		assert_eq!(found.token.as_ref().map(|t| t.expose().as_str()), Some("tok"));
	}

	#[test]
	fn add_requires_domain() {
		let err = Config::new().add_credentials(&Credentials::default()).unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { .. }));
	}

	#[test]
	fn delete_one_and_all() {
		let config = store();
		assert!(config.delete_credentials("sub.example.com"));
		assert!(!config.delete_credentials("sub.example.com"));
		let found = config.find_credentials("test.sub.example.com").unwrap();
		assert_eq!(found.domain, "example.com");

		config.delete_all_credentials();
		assert!(config.credential_domains().is_empty());
		assert!(config.find_credentials("example.com").is_none());
	}

	#[test]
	fn debug_redacts_secrets() {
		let printed = format!("{:?}", creds("example.com", "alice"));
		assert!(printed.contains("alice"));
		assert!(!printed.contains("alice-pw"));
	}

	#[test]
	fn encrypted_password_expands() {
		let dir = TempDir::new().unwrap();
		let kf = KeyFile::from_path(dir.path().join("keyfile.aes"));
		kf.read_or_create().unwrap();

		let config = Config::new();
		let record = Credentials {
			password: Some(kf.encode_string("s3cret", true).unwrap().into()),
			..Credentials::new("example.com")
		};
		let password = record.expand_password(&config, &ExpandOptions::new());
		assert_eq!(password.plaintext_string(), "s3cret");
		assert!(Credentials::new("x")
			.expand_password(&config, &ExpandOptions::new())
			.is_empty());
	}

	#[test]
	fn credentials_file_roundtrip() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("credentials.toml");

		let file = CredentialsFile::load(&path).unwrap();
		assert!(file.domains().is_empty());
		file.add(&creds("api.example.com", "alice")).unwrap();
		file.save().unwrap();

		let text = std::fs::read_to_string(&path).unwrap();
		assert!(text.contains("api.example.com"));

		let reloaded = CredentialsFile::load(&path).unwrap();
		assert_eq!(reloaded.config().delimiter(), CREDENTIALS_DELIMITER);
		let found = reloaded.find("https://api.example.com/v1").unwrap();
		assert_eq!(found.username.as_deref(), Some("alice"));
		assert_eq!(
			found.password.as_ref().map(|p| p.expose().as_str()),
			Some("alice-pw")
		);

		assert!(reloaded.delete("api.example.com"));
		reloaded.save().unwrap();
		assert!(CredentialsFile::load(&path).unwrap().domains().is_empty());
	}

	#[test]
	fn credentials_serialize_to_json_for_display() {
		let json = serde_json::to_string(&creds("example.com", "bob")).unwrap();
		assert!(json.contains("\"username\":\"bob\""));
		assert!(!json.contains("client_id"));
	}
}
