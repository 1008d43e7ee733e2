// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User configuration paths.

use std::path::PathBuf;

use crate::ConfigError;

/// Application directory name under the user config directory.
pub const APP_DIR: &str = "strand";

/// `$XDG_CONFIG_HOME/strand`, or `~/.config/strand`.
pub fn user_config_dir() -> Result<PathBuf, ConfigError> {
	let config_home = match std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
		Some(dir) => PathBuf::from(dir),
		None => dirs::home_dir()
			.ok_or(ConfigError::HomeDirNotFound)?
			.join(".config"),
	};
	let dir = config_home.join(APP_DIR);
	tracing::debug!(config_dir = %dir.display(), "resolved user config directory");
	Ok(dir)
}

/// Default keyfile location, `<user config dir>/keyfile.aes`.
pub fn default_keyfile_path() -> Result<PathBuf, ConfigError> {
	Ok(user_config_dir()?.join("keyfile.aes"))
}
