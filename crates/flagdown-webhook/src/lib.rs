// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Signed issue webhooks.
//!
//! Deliveries carry an `x-hub-signature-256` header holding
//! `sha256=<hex>`, the HMAC-SHA256 of the raw request body keyed with the
//! shared webhook secret. [`verify`] checks that header before the body is
//! parsed into an [`IssueEvent`].

mod error;
mod event;
mod signature;

pub use error::WebhookError;
pub use event::IssueEvent;
pub use signature::{compute_signature, verify, verify_signature, SIGNATURE_HEADER, SIGNATURE_PREFIX};
