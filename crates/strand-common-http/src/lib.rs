// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for strand.
//!
//! This crate provides:
//! - A pre-configured blocking HTTP client with a consistent User-Agent
//! - [`fetch_text`], the GET used by the `http:`/`https:` resolvers

mod client;

pub use client::{
	builder, fetch_text, new_client, new_client_with_timeout,
	user_agent, FetchError, DEFAULT_TIMEOUT,
};
