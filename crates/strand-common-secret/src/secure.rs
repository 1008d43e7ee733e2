// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sealed secret storage with short-lived open handles.
//!
//! A [`SecureValue`] is the at-rest form of a secret: its bytes are held
//! XOR-masked with a random pad, so the plaintext never sits in the value's
//! own allocation. Reading requires [`SecureValue::open`], which returns an
//! [`OpenValue`] that owns a zeroizing plaintext copy. The handle is neither
//! `Send` nor `Clone` and borrows the sealed value, so it cannot outlive it or
//! cross threads. Dropping or calling [`OpenValue::destroy`] zeroes the copy.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::REDACTED;

/// A secret held in sealed form.
pub struct SecureValue {
	sealed: Vec<u8>,
	mask: Vec<u8>,
	open_handles: AtomicUsize,
}

impl SecureValue {
	/// Seals `plaintext`, zeroing the caller's buffer in the process.
	pub fn new(mut plaintext: Vec<u8>) -> Self {
		let value = Self::from_slice(&plaintext);
		plaintext.zeroize();
		value
	}

	/// Seals a copy of `plaintext`. The caller still owns (and should clear)
	/// the original.
	pub fn from_slice(plaintext: &[u8]) -> Self {
		let mut mask = vec![0u8; plaintext.len()];
		rand::thread_rng().fill_bytes(&mut mask);
		let sealed = plaintext
			.iter()
			.zip(mask.iter())
			.map(|(p, m)| p ^ m)
			.collect();
		tracing::trace!(len = plaintext.len(), "sealed secure value");
		Self {
			sealed,
			mask,
			open_handles: AtomicUsize::new(0),
		}
	}

	pub fn empty() -> Self {
		Self::from_slice(&[])
	}

	pub fn len(&self) -> usize {
		self.sealed.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sealed.is_empty()
	}

	/// Opens the value for reading. The returned handle must be dropped or
	/// destroyed as soon as the bytes have been used.
	pub fn open(&self) -> OpenValue<'_> {
		let plaintext: Vec<u8> = self
			.sealed
			.iter()
			.zip(self.mask.iter())
			.map(|(s, m)| s ^ m)
			.collect();
		self.open_handles.fetch_add(1, Ordering::SeqCst);
		OpenValue {
			owner: self,
			plaintext: Zeroizing::new(plaintext),
			_not_send: PhantomData,
		}
	}

	/// Number of [`OpenValue`] handles currently alive for this value.
	///
	/// Tests use this to assert that every code path destroyed its handle.
	pub fn open_handles(&self) -> usize {
		self.open_handles.load(Ordering::SeqCst)
	}

	/// Explicitly unwraps the secret into an ordinary `String` for final
	/// consumption, e.g. a password passed to an HTTP client. Invalid UTF-8
	/// is replaced lossily. The returned string cannot be zeroed by this
	/// crate.
	pub fn plaintext_string(&self) -> String {
		let open = self.open();
		let text = String::from_utf8_lossy(open.bytes()).into_owned();
		text
	}

	/// As [`SecureValue::plaintext_string`] but returns the bytes. Clear the
	/// buffer after use.
	pub fn plaintext_bytes(&self) -> Vec<u8> {
		let open = self.open();
		let bytes = open.bytes().to_vec();
		bytes
	}

	/// Zeroes the sealed bytes and leaves the value empty.
	pub fn wipe(&mut self) {
		self.sealed.zeroize();
		self.mask.zeroize();
		self.sealed.clear();
		self.mask.clear();
	}

	/// Destroys the value. Equivalent to dropping it, but states intent.
	pub fn destroy(mut self) {
		self.wipe();
	}
}

impl Clone for SecureValue {
	/// Returns an independent copy, re-sealed under a fresh mask.
	fn clone(&self) -> Self {
		let open = self.open();
		Self::from_slice(open.bytes())
	}
}

impl Default for SecureValue {
	fn default() -> Self {
		Self::empty()
	}
}

impl From<&str> for SecureValue {
	fn from(value: &str) -> Self {
		Self::from_slice(value.as_bytes())
	}
}

impl From<String> for SecureValue {
	fn from(value: String) -> Self {
		Self::new(value.into_bytes())
	}
}

impl From<Vec<u8>> for SecureValue {
	fn from(value: Vec<u8>) -> Self {
		Self::new(value)
	}
}

impl Drop for SecureValue {
	fn drop(&mut self) {
		self.wipe();
	}
}

impl fmt::Debug for SecureValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SecureValue")
			.field("len", &self.len())
			.field("value", &REDACTED)
			.finish()
	}
}

/// A readable view of a [`SecureValue`].
pub struct OpenValue<'a> {
	owner: &'a SecureValue,
	plaintext: Zeroizing<Vec<u8>>,
	// raw pointer marker keeps the handle !Send and !Sync
	_not_send: PhantomData<*const u8>,
}

impl OpenValue<'_> {
	pub fn bytes(&self) -> &[u8] {
		&self.plaintext
	}

	/// The plaintext as UTF-8, if valid.
	pub fn as_str(&self) -> Option<&str> {
		std::str::from_utf8(&self.plaintext).ok()
	}

	pub fn len(&self) -> usize {
		self.plaintext.len()
	}

	pub fn is_empty(&self) -> bool {
		self.plaintext.is_empty()
	}

	/// Zeroes the plaintext copy and releases the handle.
	pub fn destroy(self) {}
}

impl Drop for OpenValue<'_> {
	fn drop(&mut self) {
		self.plaintext.zeroize();
		self.owner.open_handles.fetch_sub(1, Ordering::SeqCst);
	}
}

impl fmt::Debug for OpenValue<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("OpenValue")
			.field("len", &self.len())
			.field("value", &REDACTED)
			.finish()
	}
}
