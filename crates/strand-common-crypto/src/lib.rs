// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! AES-256-CBC codec and keyfile handling for `+encs+` secure passwords.
//!
//! - [`KeyValues`]: key and IV pair, generation, text format and codec
//! - [`KeyFile`]: on-disk key material with fingerprinting and backups
//! - [`decode_with_candidates`]: first-keyfile-that-works decoding

mod cipher;
mod error;
mod keyfile;
mod paths;

pub use cipher::{
	checksum, checksum_reader, KeyValues, BLOCK_SIZE, ENCRYPTED_PREFIX, IV_SIZE, KEY_SIZE,
};
pub use error::{CipherError, KeyFileError, Result};
pub use keyfile::{decode_with_candidates, split_keyfiles, KeyFile, KEYFILE_SEPARATOR};
pub use paths::{abbreviate_home, expand_home};
