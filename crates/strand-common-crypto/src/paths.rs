// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Home directory shorthand for keyfile and resolver paths.

use std::path::{Path, PathBuf};

/// Replaces a leading `~/` (or a lone `~`) with the user's home directory.
/// Other paths, and all paths when the home directory is unknown, are
/// returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
	let rest = if path == "~" {
		Some("")
	} else {
		path.strip_prefix("~/")
	};
	match (rest, dirs::home_dir()) {
		(Some(rest), Some(home)) => home.join(rest),
		_ => PathBuf::from(path),
	}
}

/// Rewrites a path under the user's home directory as `~/...`, for display
/// and for the keyfile reference embedded in `${enc:...}` strings.
pub fn abbreviate_home(path: &Path) -> String {
	if let Some(home) = dirs::home_dir() {
		if let Ok(rest) = path.strip_prefix(&home) {
			if rest.as_os_str().is_empty() {
				return "~".to_string();
			}
			return format!("~/{}", rest.display());
		}
	}
	path.display().to_string()
}
