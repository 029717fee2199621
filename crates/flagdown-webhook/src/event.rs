// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

/// The parts of an issue delivery the flag engine acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawIssuePayload")]
pub struct IssueEvent {
	pub action: String,
	/// `owner/repo` as sent by the tracker.
	pub repository_full_name: String,
	pub issue_number: u64,
	/// Current issue body. `None` when the issue has no description.
	pub issue_body: Option<String>,
}

impl IssueEvent {
	pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
		serde_json::from_slice(body)
	}
}

#[derive(Deserialize)]
struct RawIssuePayload {
	#[serde(default)]
	action: String,
	issue: RawIssue,
	repository: RawRepository,
}

#[derive(Deserialize)]
struct RawIssue {
	number: u64,
	#[serde(default)]
	body: Option<String>,
}

#[derive(Deserialize)]
struct RawRepository {
	full_name: String,
}

impl From<RawIssuePayload> for IssueEvent {
	fn from(raw: RawIssuePayload) -> Self {
		Self {
			action: raw.action,
			repository_full_name: raw.repository.full_name,
			issue_number: raw.issue.number,
			issue_body: raw.issue.body,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_issue_delivery() {
		let body = br###"{
			"action": "edited",
			"issue": {"number": 42, "body": "## Dark Mode\n- [x] Enabled", "title": "Flags"},
			"repository": {"full_name": "Acme/Web", "private": true},
			"sender": {"login": "octocat"}
		}"###;

		let event = IssueEvent::parse(body).unwrap();
		assert_eq!(event.action, "edited");
		assert_eq!(event.repository_full_name, "Acme/Web");
		assert_eq!(event.issue_number, 42);
		assert_eq!(event.issue_body.as_deref(), Some("## Dark Mode\n- [x] Enabled"));
	}

	#[test]
	fn null_body_is_none() {
		let body = br#"{"action":"opened","issue":{"number":1,"body":null},"repository":{"full_name":"a/b"}}"#;
		let event = IssueEvent::parse(body).unwrap();
		assert!(event.issue_body.is_none());
	}

	#[test]
	fn missing_repository_is_rejected() {
		let body = br#"{"action":"opened","issue":{"number":1}}"#;
		assert!(IssueEvent::parse(body).is_err());
	}

	#[test]
	fn non_json_is_rejected() {
		assert!(IssueEvent::parse(b"not json").is_err());
	}
}
