// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! AES-256-CBC codec for Geneos secure passwords.
//!
//! Ciphertext is carried as upper-case hex, optionally prefixed with
//! [`ENCRYPTED_PREFIX`]. Padding always adds between 1 and 16 bytes, each
//! holding the pad length, so block-aligned plaintext gains a full block.
//!
//! There is no authentication tag in this format. Decrypting with the wrong
//! key usually fails the alignment or UTF-8 checks but can, rarely, yield
//! plausible text. Callers that try several keys rely on that heuristic.

use std::fmt;

use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::Sha1;
use strand_common_secret::{SecureValue, REDACTED};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::CipherError;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of the CBC initialisation vector in bytes.
pub const IV_SIZE: usize = BLOCK_SIZE;

/// Marker that prefixes encrypted values in Geneos configuration.
pub const ENCRYPTED_PREFIX: &str = "+encs+";

const PASSPHRASE_SIZE: usize = 20;
const SALT_SIZE: usize = 10;
const PBKDF2_ROUNDS: u32 = 10_000;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// An AES key and IV pair, always generated and stored together.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyValues {
	key: [u8; KEY_SIZE],
	iv: [u8; IV_SIZE],
}

impl KeyValues {
	/// Generates new key material.
	///
	/// A random passphrase and salt are stretched with PBKDF2-HMAC-SHA1; the
	/// first 32 derived bytes become the key and the last 16 the IV. Neither
	/// passphrase nor salt is kept.
	pub fn generate() -> Self {
		let mut passphrase = Zeroizing::new([0u8; PASSPHRASE_SIZE]);
		let mut salt = [0u8; SALT_SIZE];
		OsRng.fill_bytes(passphrase.as_mut());
		OsRng.fill_bytes(&mut salt);

		let mut derived = Zeroizing::new([0u8; KEY_SIZE + IV_SIZE]);
		pbkdf2_hmac::<Sha1>(passphrase.as_ref(), &salt, PBKDF2_ROUNDS, derived.as_mut());

		let mut kv = Self {
			key: [0u8; KEY_SIZE],
			iv: [0u8; IV_SIZE],
		};
		kv.key.copy_from_slice(&derived[..KEY_SIZE]);
		kv.iv.copy_from_slice(&derived[KEY_SIZE..]);
		kv
	}

	/// Builds key material from raw bytes, checking both lengths.
	pub fn from_parts(key: &[u8], iv: &[u8]) -> Result<Self, CipherError> {
		if key.len() != KEY_SIZE {
			return Err(CipherError::InvalidKeyLength {
				field: "key",
				expected: KEY_SIZE,
				actual: key.len(),
			});
		}
		if iv.len() != IV_SIZE {
			return Err(CipherError::InvalidKeyLength {
				field: "iv",
				expected: IV_SIZE,
				actual: iv.len(),
			});
		}
		let mut kv = Self {
			key: [0u8; KEY_SIZE],
			iv: [0u8; IV_SIZE],
		};
		kv.key.copy_from_slice(key);
		kv.iv.copy_from_slice(iv);
		Ok(kv)
	}

	/// Parses the keyfile text format.
	///
	/// Blank lines, `#` comments and an OpenSSL `salt=` line are ignored.
	/// Anything else that is not `key=` or `iv=` is an error.
	pub fn parse(text: &str) -> Result<Self, CipherError> {
		let mut key: Option<Zeroizing<Vec<u8>>> = None;
		let mut iv: Option<Zeroizing<Vec<u8>>> = None;

		for (index, raw) in text.lines().enumerate() {
			let line = raw.trim();
			if line.is_empty() || line.starts_with('#') {
				continue;
			}
			let (name, value) =
				line
					.split_once('=')
					.ok_or_else(|| CipherError::InvalidKeyFileLine {
						line: index + 1,
						reason: "must be of the form name=value".to_string(),
					})?;
			match name.trim() {
				"salt" => {}
				"key" => key = Some(Zeroizing::new(hex::decode(value.trim())?)),
				"iv" => iv = Some(Zeroizing::new(hex::decode(value.trim())?)),
				other => {
					return Err(CipherError::InvalidKeyFileLine {
						line: index + 1,
						reason: format!("unknown entry {other:?}"),
					})
				}
			}
		}

		match (key, iv) {
			(Some(key), Some(iv)) => Self::from_parts(&key, &iv),
			_ => Err(CipherError::MissingKeyMaterial),
		}
	}

	/// Renders the keyfile text. The space before `=` on the `iv` line
	/// matches OpenSSL output and must be kept.
	pub fn to_keyfile_string(&self) -> Zeroizing<String> {
		Zeroizing::new(format!(
			"key={}\niv ={}\n",
			hex::encode_upper(&self.key),
			hex::encode_upper(&self.iv)
		))
	}

	/// CRC32 of the canonical keyfile text. Identifies which key a value was
	/// encrypted with without decrypting anything.
	pub fn checksum(&self) -> u32 {
		crc32fast::hash(self.to_keyfile_string().as_bytes())
	}

	/// [`KeyValues::checksum`] as eight upper-case hex digits.
	pub fn checksum_string(&self) -> String {
		format!("{:08X}", self.checksum())
	}

	/// Encrypts `plaintext` and returns the raw ciphertext.
	pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
		let pad = BLOCK_SIZE - plaintext.len() % BLOCK_SIZE;
		let mut buf = Zeroizing::new(Vec::with_capacity(plaintext.len() + pad));
		buf.extend_from_slice(plaintext);
		buf.resize(plaintext.len() + pad, pad as u8);

		let len = buf.len();
		let encryptor = Aes256CbcEnc::new_from_slices(&self.key, &self.iv).map_err(|_| {
			CipherError::InvalidKeyLength {
				field: "key",
				expected: KEY_SIZE,
				actual: self.key.len(),
			}
		})?;
		let ciphertext = encryptor
			.encrypt_padded_mut::<NoPadding>(&mut buf, len)
			.map_err(|_| CipherError::NotBlockAligned(len))?;
		Ok(ciphertext.to_vec())
	}

	/// Encrypts `plaintext` and returns upper-case hex without the
	/// [`ENCRYPTED_PREFIX`].
	pub fn encode(&self, plaintext: &[u8]) -> Result<String, CipherError> {
		Ok(hex::encode_upper(self.encrypt(plaintext)?))
	}

	/// Encrypts the contents of a sealed value.
	pub fn encode_secure(&self, plaintext: &SecureValue) -> Result<String, CipherError> {
		let open = plaintext.open();
		let encoded = self.encode(open.bytes());
		open.destroy();
		encoded
	}

	/// Decrypts raw ciphertext.
	///
	/// The last decrypted byte gives the pad length, which must be 1 to 16
	/// and is removed. The other pad bytes are not checked.
	pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError> {
		if ciphertext.is_empty() {
			return Err(CipherError::Empty);
		}
		if ciphertext.len() % BLOCK_SIZE != 0 {
			return Err(CipherError::NotBlockAligned(ciphertext.len()));
		}

		let mut buf = Zeroizing::new(ciphertext.to_vec());
		let decryptor = Aes256CbcDec::new_from_slices(&self.key, &self.iv).map_err(|_| {
			CipherError::InvalidKeyLength {
				field: "key",
				expected: KEY_SIZE,
				actual: self.key.len(),
			}
		})?;
		decryptor
			.decrypt_padded_mut::<NoPadding>(&mut buf)
			.map_err(|_| CipherError::NotBlockAligned(ciphertext.len()))?;

		let pad = usize::from(buf[buf.len() - 1]);
		if pad == 0 || pad > BLOCK_SIZE {
			return Err(CipherError::InvalidPadding(pad));
		}
		let keep = buf.len() - pad;
		buf.truncate(keep);
		Ok(buf)
	}

	/// Decodes hex ciphertext, with or without the [`ENCRYPTED_PREFIX`].
	pub fn decode(&self, input: &str) -> Result<Zeroizing<Vec<u8>>, CipherError> {
		let input = input.trim();
		let hex_text = input.strip_prefix(ENCRYPTED_PREFIX).unwrap_or(input);
		let ciphertext = hex::decode(hex_text)?;
		self.decrypt(&ciphertext)
	}

	/// Decodes into a sealed value, rejecting plaintext that is not UTF-8.
	///
	/// The UTF-8 check is what lets multi-key callers skip a wrong key.
	pub fn decode_secure(&self, input: &str) -> Result<SecureValue, CipherError> {
		let plaintext = self.decode(input)?;
		if std::str::from_utf8(&plaintext).is_err() {
			return Err(CipherError::InvalidUtf8);
		}
		Ok(SecureValue::from_slice(&plaintext))
	}

	/// Decodes and returns an ordinary string. For explicit decode requests
	/// only; expansion keeps results sealed.
	pub fn decode_string(&self, input: &str) -> Result<String, CipherError> {
		let plaintext = self.decode(input)?;
		std::str::from_utf8(&plaintext)
			.map(str::to_string)
			.map_err(|_| CipherError::InvalidUtf8)
	}
}

impl fmt::Debug for KeyValues {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("KeyValues")
			.field("key", &REDACTED)
			.field("iv", &REDACTED)
			.finish()
	}
}

/// CRC32 (IEEE) of arbitrary bytes, as used for keyfile fingerprints.
pub fn checksum(data: &[u8]) -> u32 {
	crc32fast::hash(data)
}

/// Reads `reader` to the end and returns its CRC32.
pub fn checksum_reader(mut reader: impl std::io::Read) -> std::io::Result<u32> {
	let mut hasher = crc32fast::Hasher::new();
	let mut buf = [0u8; 8192];
	loop {
		let n = reader.read(&mut buf)?;
		if n == 0 {
			break;
		}
		hasher.update(&buf[..n]);
	}
	Ok(hasher.finalize())
}
