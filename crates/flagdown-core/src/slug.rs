// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stable identifiers derived from human-written names.

const SEPARATOR: char = '-';

/// Normalizes free text into a slug.
///
/// Leading heading hashes and a leading checklist marker are stripped, the
/// text is lower-cased, runs of whitespace, `-` and `_` collapse into a single
/// `-`, and any other punctuation is dropped.
///
/// ```
/// use flagdown_core::slugify;
///
/// assert_eq!(slugify("## Dark Mode"), "dark-mode");
/// assert_eq!(slugify("- [x] Beta   Users!"), "beta-users");
/// ```
pub fn slugify(text: &str) -> String {
	let text = strip_markup(text);

	let mut slug = String::with_capacity(text.len());
	let mut pending_separator = false;
	for c in text.chars().flat_map(char::to_lowercase) {
		if c.is_whitespace() || c == '-' || c == '_' {
			pending_separator = true;
		} else if c.is_alphanumeric() {
			if pending_separator && !slug.is_empty() {
				slug.push(SEPARATOR);
			}
			pending_separator = false;
			slug.push(c);
		}
	}
	slug
}

fn strip_markup(text: &str) -> &str {
	let text = text.trim().trim_start_matches('#').trim_start();
	match crate::parser::split_checkbox(text) {
		Some((_, rest)) => rest,
		None => text,
	}
}
