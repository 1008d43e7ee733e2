// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration values with `${...}` expansion.
//!
//! This crate provides:
//! - A TOML-backed [`Config`] store with a configurable key delimiter
//! - Placeholder expansion against the store, the environment, lookup
//!   tables, files, URLs and caller-registered resolvers
//! - Decryption of `${enc:...}` values into sealed [`SecureValue`]s
//! - Per-domain [`Credentials`] with longest-match lookup
//!
//! [`SecureValue`]: strand_common_secret::SecureValue

pub mod credentials;
pub mod error;
pub mod expand;
pub mod global;
pub mod options;
pub mod paths;
pub mod resolver;
pub mod store;

pub use credentials::{Credentials, CredentialsFile, CREDENTIALS_DELIMITER};
pub use error::{ConfigError, ResolutionError};
pub use expand::{segments, Segment, MAX_EXPANSION_DEPTH};
pub use global::global;
pub use options::{ExpandOptions, LookupTable};
pub use resolver::{ResolverFn, ResolverRegistry};
pub use store::Config;
