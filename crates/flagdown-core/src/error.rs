// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Errors raised by the core parser.
///
/// Malformed markdown is never an error; only a missing document is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
	#[error("document body not found")]
	DocumentNotFound,
}

pub type Result<T> = std::result::Result<T, CoreError>;
