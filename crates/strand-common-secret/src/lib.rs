// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret handling primitives shared by the strand crates.
//!
//! - [`Secret<T>`]: a wrapper that redacts its value in `Debug`/`Display`
//!   and zeroes it on drop. Used for credential fields.
//! - [`SecureValue`]: sealed storage for decrypted plaintext, readable only
//!   through a short-lived, non-`Send` [`OpenValue`] handle.

mod secret;
mod secure;

pub use secret::{Secret, SecretString, REDACTED};
pub use secure::{OpenValue, SecureValue};
