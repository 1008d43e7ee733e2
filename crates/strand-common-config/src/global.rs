// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process-wide configuration for application entry points.
//!
//! Library code takes a `&Config`; only binaries should reach for this.

use std::sync::OnceLock;

use crate::store::Config;

static GLOBAL: OnceLock<Config> = OnceLock::new();

/// The shared configuration, empty until something is set or merged in.
pub fn global() -> &'static Config {
	GLOBAL.get_or_init(Config::new)
}
