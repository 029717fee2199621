// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::error::WebhookError;
use crate::event::IssueEvent;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Computes the `sha256=<hex>` signature header value for `body`.
pub fn compute_signature(secret: &str, body: &[u8]) -> String {
	let mut mac =
		HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
	mac.update(body);
	format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

/// Checks a signature header value against the raw body.
///
/// The comparison covers the full header value, prefix included, so any
/// change to it (even letter case in the hex digits) is a mismatch.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> Result<(), WebhookError> {
	let expected = compute_signature(secret, body);
	let expected = expected.as_bytes();
	let provided = signature.as_bytes();

	if expected.len() != provided.len() {
		warn!("webhook signature length mismatch");
		return Err(WebhookError::InvalidSignature);
	}

	if expected.ct_eq(provided).into() {
		debug!("webhook signature verified");
		Ok(())
	} else {
		warn!("webhook signature verification failed");
		Err(WebhookError::InvalidSignature)
	}
}

/// Authenticates a delivery and parses it.
///
/// The body is only parsed after the signature has been accepted.
pub fn verify(
	body: &[u8],
	signature: Option<&str>,
	secret: &str,
) -> Result<IssueEvent, WebhookError> {
	let signature = match signature {
		Some(value) if !value.trim().is_empty() => value,
		_ => {
			warn!("webhook delivery without signature");
			return Err(WebhookError::MissingSignature);
		}
	};

	verify_signature(secret, body, signature)?;

	let event = IssueEvent::parse(body)?;
	debug!(
		action = %event.action,
		repository = %event.repository_full_name,
		issue = event.issue_number,
		"webhook event accepted"
	);
	Ok(event)
}
