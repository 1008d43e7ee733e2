// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Redacting wrapper for credential fields that must never be logged.

use std::fmt;

use zeroize::Zeroize;

/// Placeholder written in place of any secret value by `Debug` and `Display`.
pub const REDACTED: &str = "[REDACTED]";

/// A value that is redacted when formatted and zeroed when dropped.
///
/// Use [`Secret::expose`] at the point where the real value is needed, e.g.
/// when building an HTTP request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret<T: Zeroize> {
	inner: T,
}

/// The common case: a secret string such as a password or token.
pub type SecretString = Secret<String>;

impl<T: Zeroize> Secret<T> {
	pub fn new(value: T) -> Self {
		Self { inner: value }
	}

	/// Returns a reference to the wrapped value.
	pub fn expose(&self) -> &T {
		&self.inner
	}

	pub fn expose_mut(&mut self) -> &mut T {
		&mut self.inner
	}
}

impl<T: Zeroize + Default> Secret<T> {
	/// Consumes the wrapper and returns the value. The caller becomes
	/// responsible for clearing it.
	pub fn into_inner(mut self) -> T {
		std::mem::take(&mut self.inner)
	}
}

impl SecretString {
	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}
}

impl<T: Zeroize> Drop for Secret<T> {
	fn drop(&mut self) {
		self.inner.zeroize();
	}
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T: Zeroize> fmt::Display for Secret<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Self::new(value.to_string())
	}
}

// Serialization writes the real value: it exists so credential files can be
// persisted. Never serialize a Secret into a log record.
#[cfg(feature = "serde")]
impl<T: Zeroize + serde::Serialize> serde::Serialize for Secret<T> {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.inner.serialize(serializer)
	}
}

#[cfg(feature = "serde")]
impl<'de, T: Zeroize + serde::Deserialize<'de>> serde::Deserialize<'de> for Secret<T> {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		T::deserialize(deserializer).map(Self::new)
	}
}
