// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration and placeholder resolution error types.

use std::path::PathBuf;

use strand_common_crypto::KeyFileError;
use strand_common_http::FetchError;

/// Errors from loading, saving and modifying a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// I/O error reading or writing a config file
	#[error("I/O error on {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// TOML parsing error
	#[error("TOML parse error in {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("TOML serialize error: {0}")]
	TomlSerialize(#[from] toml::ser::Error),

	/// Invalid value
	#[error("Invalid value for {field}: {message}")]
	InvalidValue { field: String, message: String },

	/// Home directory not found
	#[error("Could not determine home directory")]
	HomeDirNotFound,
}

impl ConfigError {
	pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Io {
			path: path.into(),
			source,
		}
	}

	/// Create an invalid value error
	pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			field: field.into(),
			message: message.into(),
		}
	}
}

/// Why a single `${...}` placeholder produced no value.
///
/// Expansion never surfaces these to its caller: each failed placeholder
/// becomes an empty string. They exist so resolvers can use `?` and so the
/// failure can be logged at the dispatch boundary.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
	#[error("{0} not found")]
	NotFound(String),

	/// The prefix names a built-in that external lookups disabled
	#[error("resolver {0:?} is disabled")]
	Disabled(String),

	#[error("no resolver registered for prefix {0:?}")]
	UnknownPrefix(String),

	#[error("reading {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error(transparent)]
	Http(#[from] FetchError),

	#[error("decoding encrypted value: {0}")]
	Decode(#[from] KeyFileError),

	#[error("malformed placeholder: {0}")]
	Malformed(String),

	/// An `enc:` payload referred to another encrypted value too deeply
	#[error("expansion depth limit reached")]
	DepthExceeded,

	/// Returned by caller-registered resolvers for their own failures
	#[error("{0}")]
	Custom(String),
}

impl ResolutionError {
	pub fn custom(message: impl Into<String>) -> Self {
		Self::Custom(message.into())
	}
}
