// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Block-level markdown nodes consumed by the document parser.
//!
//! The parser only needs the top-level block structure of a document: which
//! blocks are headings (and at what depth), which are lists (and what their
//! items say), and the raw source text of each. [`tokenize`] produces that
//! stream from markdown text with `pulldown-cmark`; callers that already have
//! a markdown AST can build [`Node`]s themselves.

use pulldown_cmark::{Event, Options, Parser, Tag};
use serde::{Deserialize, Serialize};

/// Kind of a block-level node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
	Heading,
	List,
	ListItem,
	Paragraph,
	/// Anything the parser has no rule for (code blocks, quotes, tables...).
	Other,
}

/// A block of the source document with its raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
	pub kind: NodeKind,
	/// Heading level for headings, 0 otherwise.
	pub depth: u8,
	/// Source text of the block, trimmed.
	pub raw: String,
	/// Items of a list. Empty for every other kind.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub children: Vec<Node>,
}

impl Node {
	pub fn heading(depth: u8, raw: impl Into<String>) -> Self {
		Self::leaf(NodeKind::Heading, depth, raw)
	}

	pub fn list(items: impl IntoIterator<Item = Node>) -> Self {
		let children: Vec<Node> = items.into_iter().collect();
		let raw = children
			.iter()
			.map(|item| item.raw.as_str())
			.collect::<Vec<_>>()
			.join("\n");
		Self {
			kind: NodeKind::List,
			depth: 0,
			raw,
			children,
		}
	}

	pub fn item(raw: impl Into<String>) -> Self {
		Self::leaf(NodeKind::ListItem, 0, raw)
	}

	pub fn paragraph(raw: impl Into<String>) -> Self {
		Self::leaf(NodeKind::Paragraph, 0, raw)
	}

	pub fn other(raw: impl Into<String>) -> Self {
		Self::leaf(NodeKind::Other, 0, raw)
	}

	fn leaf(kind: NodeKind, depth: u8, raw: impl Into<String>) -> Self {
		Self {
			kind,
			depth,
			raw: raw.into().trim().to_string(),
			children: Vec::new(),
		}
	}

	pub fn is_heading(&self, depth: u8) -> bool {
		self.kind == NodeKind::Heading && self.depth == depth
	}

	/// Heading text without the `#` markers, or the first line for setext
	/// headings.
	pub fn heading_text(&self) -> &str {
		let line = self.raw.lines().next().unwrap_or_default().trim();
		let line = line.trim_start_matches('#');
		// A closing sequence only counts when separated from the text.
		let stripped = line.trim_end_matches('#');
		let line = if stripped.len() < line.len() && (stripped.is_empty() || stripped.ends_with(' ')) {
			stripped
		} else {
			line
		};
		line.trim()
	}
}

/// Splits markdown text into top-level block nodes.
///
/// Lists carry one child per top-level item; nested lists stay inside their
/// parent item's raw text.
pub fn tokenize(markdown: &str) -> Vec<Node> {
	let mut nodes = Vec::new();
	let mut open_list: Option<Vec<Node>> = None;
	let mut nesting = 0usize;

	let parser = Parser::new_ext(markdown, Options::ENABLE_TASKLISTS | Options::ENABLE_TABLES);
	for (event, range) in parser.into_offset_iter() {
		match event {
			Event::Start(tag) => {
				let raw = &markdown[range];
				if nesting == 0 {
					match tag {
						Tag::Heading { level, .. } => nodes.push(Node::heading(level as u8, raw)),
						Tag::List(_) => open_list = Some(Vec::new()),
						Tag::Paragraph => nodes.push(Node::paragraph(raw)),
						_ => nodes.push(Node::other(raw)),
					}
				} else if nesting == 1 && matches!(tag, Tag::Item) {
					if let Some(items) = open_list.as_mut() {
						items.push(Node::item(raw));
					}
				}
				nesting += 1;
			}
			Event::End(_) => {
				nesting = nesting.saturating_sub(1);
				if nesting == 0 {
					if let Some(items) = open_list.take() {
						nodes.push(Node::list(items));
					}
				}
			}
			Event::Rule | Event::Html(_) if nesting == 0 => {
				nodes.push(Node::other(&markdown[range]));
			}
			_ => {}
		}
	}

	nodes
}
