// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared blocking HTTP client with consistent User-Agent header.

use std::time::Duration;

use reqwest::blocking::{Client, ClientBuilder};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::instrument;

/// Timeout applied by [`new_client`]. Placeholder expansion has no timeout of
/// its own, so this is the only bound on a slow `${https://...}` lookup.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FetchError {
	#[error("HTTP request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("unexpected status: {0}")]
	UnexpectedStatus(StatusCode),
}

/// Creates a new HTTP client with the standard strand User-Agent header and
/// [`DEFAULT_TIMEOUT`].
pub fn new_client() -> Client {
	new_client_with_timeout(DEFAULT_TIMEOUT)
}

/// Creates a new HTTP client builder with the standard strand User-Agent header.
///
/// Use this when you need to customize the client (e.g., set timeout).
///
/// # Example
/// ```ignore
/// let client = strand_common_http::builder()
///     .timeout(Duration::from_secs(5))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a new HTTP client with a custom timeout and the standard User-Agent.
pub fn new_client_with_timeout(timeout: Duration) -> Client {
	builder()
		.timeout(timeout)
		.build()
		.expect("failed to build HTTP client")
}

/// Returns the standard strand User-Agent string.
///
/// Format: `strand/{version}/{os}-{arch}`
pub fn user_agent() -> String {
	format!(
		"strand/{}/{}-{}",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}

/// Performs a GET on `url` and returns the response body as text. Non-2xx
/// responses are errors.
#[instrument(skip(client), fields(url = %url))]
pub fn fetch_text(client: &Client, url: &str) -> Result<String, FetchError> {
	let response = client.get(url).send()?;
	let status = response.status();
	if !status.is_success() {
		tracing::debug!(status = %status, "fetch returned non-success status");
		return Err(FetchError::UnexpectedStatus(status));
	}
	Ok(response.text()?)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_agent_has_correct_format() {
		let ua = user_agent();
		assert!(ua.starts_with("strand/"));
		let parts: Vec<&str> = ua.split('/').collect();
		assert_eq!(parts.len(), 3);
		assert_eq!(parts[0], "strand");
		assert_eq!(parts[1], env!("CARGO_PKG_VERSION"));
	}

	#[test]
	fn builder_accepts_overrides() {
		let client = builder().timeout(Duration::from_secs(5)).build();
		assert!(client.is_ok());
	}

	#[test]
	fn fetch_from_unreachable_host_is_an_error() {
		let client = new_client_with_timeout(Duration::from_millis(500));
		let result = fetch_text(&client, "http://127.0.0.1:1/unreachable");
		assert!(matches!(result, Err(FetchError::Http(_))));
	}
}
