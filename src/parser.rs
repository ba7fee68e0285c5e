//! HTML fragment parsing using html5ever
//!
//! Stored record text is an HTML snippet, not a full document. It is parsed
//! with the WHATWG document algorithm, which wraps the snippet in implied
//! `<html>`/`<body>` elements, and the body is then treated as the fragment
//! root. Malformed markup is repaired the way browsers repair it; parsing
//! never fails.
//!
//! # Examples
//!
//! ```rust
//! use entity_mention_converter::parser::{fragment_root, parse_fragment};
//!
//! let dom = parse_fragment("<p>Hello");
//! let root = fragment_root(&dom);
//! assert_eq!(root.children.borrow().len(), 1);
//! ```

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Parse an HTML snippet into a DOM tree
///
/// Scripting is disabled, so `<noscript>` content is parsed as markup.
pub fn parse_fragment(html: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(html)
}

/// The node whose children make up the parsed fragment
///
/// This is the `<body>` element the parser created around the snippet, or
/// the document itself if no body exists.
pub fn fragment_root(dom: &RcDom) -> Handle {
    find_child_element(&dom.document, "html")
        .and_then(|html| find_child_element(&html, "body"))
        .unwrap_or_else(|| dom.document.clone())
}

fn find_child_element(node: &Handle, tag: &str) -> Option<Handle> {
    node.children
        .borrow()
        .iter()
        .find(|child| match child.data {
            NodeData::Element { ref name, .. } => name.local.as_ref() == tag,
            _ => false,
        })
        .cloned()
}
