// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebhookError {
	#[error("missing webhook signature header")]
	MissingSignature,

	#[error("invalid webhook signature")]
	InvalidSignature,

	#[error("invalid webhook payload: {0}")]
	InvalidPayload(#[from] serde_json::Error),
}
