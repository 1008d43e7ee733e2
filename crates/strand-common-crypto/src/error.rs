// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cipher and keyfile error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the AES codec and from parsing key material.
#[derive(Debug, Error)]
pub enum CipherError {
	/// Key or IV has the wrong length
	#[error("invalid {field}: expected {expected} bytes, got {actual}")]
	InvalidKeyLength {
		field: &'static str,
		expected: usize,
		actual: usize,
	},

	/// Input is not valid hex
	#[error("invalid hex: {0}")]
	InvalidHex(#[from] hex::FromHexError),

	/// Ciphertext length is not a multiple of the AES block size
	#[error("ciphertext length {0} is not a multiple of the block size")]
	NotBlockAligned(usize),

	#[error("ciphertext is empty")]
	Empty,

	/// The trailing pad length byte is outside 1 to 16
	#[error("invalid padding length {0}")]
	InvalidPadding(usize),

	#[error("decoded text is not valid UTF-8")]
	InvalidUtf8,

	/// A keyfile line is not `key=`, `iv=`, `salt=` or a comment
	#[error("invalid keyfile line {line}: {reason}")]
	InvalidKeyFileLine { line: usize, reason: String },

	#[error("keyfile must contain both key and iv")]
	MissingKeyMaterial,
}

/// Errors from explicit keyfile operations.
#[derive(Debug, Error)]
pub enum KeyFileError {
	#[error("keyfile {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("keyfile {path}: {source}")]
	Invalid {
		path: PathBuf,
		#[source]
		source: CipherError,
	},

	#[error(transparent)]
	Cipher(#[from] CipherError),

	#[error("no keyfile could decode the value")]
	NoMatchingKeyFile,
}

impl KeyFileError {
	pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Io {
			path: path.into(),
			source,
		}
	}

	/// True when the underlying failure is a missing file.
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
	}
}

pub type Result<T> = std::result::Result<T, KeyFileError>;
