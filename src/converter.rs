//! Markdown converter - serializes a parsed HTML fragment to Markdown
//!
//! This is the read path for record text: HTML comes back from storage and
//! is turned into the Markdown dialect that [`crate::renderer`] accepts, so
//! that rendering the result reproduces equivalent structure.
//!
//! # Conversion Strategy
//!
//! Depth-first recursive descent. Every element is classified into a closed
//! [`Tag`] set and rendered by the rule for that tag. Text leaves are emitted
//! exactly as they are; entity mentions are plain text by the time they get
//! here, so they need no special handling beyond the anchor rule below.
//!
//! A parent renders its children in document order, concatenates them and
//! trims the result. Block rules end with two newlines; the trim stops
//! those from piling up through nested blocks while still leaving a blank
//! line between siblings.
//!
//! | Tag                  | Markdown                                  |
//! |----------------------|-------------------------------------------|
//! | `p`                  | children, blank line                      |
//! | `br`                 | newline                                   |
//! | `h1`-`h6`            | `#` x level, space, children, blank line  |
//! | `strong`, `b`        | `**children**`                            |
//! | `em`, `i`            | `*children*`                              |
//! | `code`               | raw text in backticks                     |
//! | `pre`                | raw text in a fenced block                |
//! | `a`                  | `[children](href)`, or bare mention       |
//! | `ul`, `ol`           | `- item` / `1. item` lines                |
//! | `blockquote`         | children with `> ` on every line          |
//! | `hr`                 | `---`                                     |
//! | `table`              | pipe table with `---` separator row       |
//! | anything else        | children, unwrapped                       |
//!
//! # Totality
//!
//! No tag makes the converter fail. Unknown elements fall back to rendering
//! their children, and comments, doctypes and processing instructions
//! render to nothing. Subtrees nested deeper than [`MAX_NESTING_DEPTH`]
//! are flattened to their text instead of being walked.
//!
//! # Examples
//!
//! ```rust
//! use entity_mention_converter::converter::MarkdownConverter;
//! use entity_mention_converter::parser::parse_fragment;
//!
//! let dom = parse_fragment("<h1>Title</h1><p>Some <strong>bold</strong> text.</p>");
//! let markdown = MarkdownConverter::new().convert(&dom);
//! assert_eq!(markdown, "# Title\n\nSome **bold** text.");
//! ```

use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::Regex;
use std::sync::OnceLock;

use crate::mention::contains_mention;
use crate::parser::fragment_root;

/// Maximum element nesting the converter descends into
///
/// Deeper subtrees are rendered as their plain text. Keeps recursion well
/// inside a default 2 MiB thread stack.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Element classes the converter knows how to render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag<'a> {
    Paragraph,
    LineBreak,
    /// Heading level, 1-6
    Heading(usize),
    Strong,
    Emphasis,
    InlineCode,
    CodeBlock,
    Anchor,
    UnorderedList,
    OrderedList,
    Blockquote,
    HorizontalRule,
    Table,
    /// Layout containers rendered as their children
    Container,
    /// Any other tag; rendered as its children
    Unknown(&'a str),
}

impl<'a> Tag<'a> {
    /// Classify an element by its local name
    pub fn from_name(name: &'a str) -> Self {
        match name {
            "p" => Tag::Paragraph,
            "br" => Tag::LineBreak,
            "h1" => Tag::Heading(1),
            "h2" => Tag::Heading(2),
            "h3" => Tag::Heading(3),
            "h4" => Tag::Heading(4),
            "h5" => Tag::Heading(5),
            "h6" => Tag::Heading(6),
            "strong" | "b" => Tag::Strong,
            "em" | "i" => Tag::Emphasis,
            "code" => Tag::InlineCode,
            "pre" => Tag::CodeBlock,
            "a" => Tag::Anchor,
            "ul" => Tag::UnorderedList,
            "ol" => Tag::OrderedList,
            "blockquote" => Tag::Blockquote,
            "hr" => Tag::HorizontalRule,
            "table" => Tag::Table,
            "div" | "span" | "section" | "article" | "main" | "header" | "footer" | "li"
            | "thead" | "tbody" | "tfoot" | "tr" | "td" | "th" | "body" | "html" => {
                Tag::Container
            }
            other => Tag::Unknown(other),
        }
    }

    fn is_list(self) -> bool {
        matches!(self, Tag::UnorderedList | Tag::OrderedList)
    }
}

/// HTML to Markdown converter
///
/// Holds no state; one instance can convert any number of independent trees,
/// from any number of threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownConverter;

impl MarkdownConverter {
    pub fn new() -> Self {
        Self
    }

    /// Convert a parsed fragment to Markdown
    ///
    /// Renders the fragment root (see [`fragment_root`]) and applies
    /// [`normalize_output`] once to the whole result.
    pub fn convert(&self, dom: &RcDom) -> String {
        let root = fragment_root(dom);
        normalize_output(&self.render_children(&root, 0))
    }

    /// Render a single node and its subtree
    pub fn render_node(&self, node: &Handle) -> String {
        self.render_at(node, 0)
    }

    /// Render `node` found at nesting `depth`
    ///
    /// Elements nested deeper than [`MAX_NESTING_DEPTH`] are flattened to
    /// their text so the walk never exhausts the stack.
    fn render_at(&self, node: &Handle, depth: usize) -> String {
        match node.data {
            NodeData::Document => self.render_children(node, depth),
            NodeData::Element { ref name, .. } => {
                if depth >= MAX_NESTING_DEPTH {
                    tracing::debug!(depth, "nesting limit reached, flattening subtree to text");
                    return raw_text(node);
                }
                self.render_element(node, Tag::from_name(name.local.as_ref()), depth)
            }
            NodeData::Text { ref contents } => contents.borrow().to_string(),
            NodeData::Comment { .. }
            | NodeData::Doctype { .. }
            | NodeData::ProcessingInstruction { .. } => String::new(),
        }
    }

    /// Render all children of `node` in document order, trimmed
    fn render_children(&self, node: &Handle, depth: usize) -> String {
        self.render_child_sequence(node, depth).0
    }

    /// Concatenate the children of `node` and trim the result
    ///
    /// Two layout fixes happen while concatenating: a newline in the source
    /// right after `<br>` is absorbed into the break, and a nested list that
    /// follows inline content starts on a line of its own. The flag reports
    /// whether the last non-blank child was a block (ended in a blank line).
    fn render_child_sequence(&self, node: &Handle, depth: usize) -> (String, bool) {
        let mut output = String::new();
        let mut after_break = false;
        let mut ends_with_block = false;

        for child in node.children.borrow().iter() {
            let tag = element_tag(child);
            let rendered = self.render_at(child, depth + 1);

            let rendered = match child.data {
                NodeData::Text { .. } if after_break => rendered
                    .strip_prefix('\n')
                    .map(str::to_string)
                    .unwrap_or(rendered),
                _ => rendered,
            };

            if tag.is_some_and(Tag::is_list) && !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            if !rendered.trim().is_empty() {
                ends_with_block = rendered.ends_with("\n\n");
            }
            output.push_str(&rendered);

            // A comment between `<br>` and its newline does not end the break
            after_break = match child.data {
                NodeData::Comment { .. } => after_break,
                _ => tag == Some(Tag::LineBreak),
            };
        }

        (output.trim().to_string(), ends_with_block)
    }

    /// Containers add no markup of their own, but keep the blank line after
    /// a trailing block child so the next sibling does not run into it
    fn render_passthrough(&self, node: &Handle, depth: usize) -> String {
        let (content, ends_with_block) = self.render_child_sequence(node, depth);
        if ends_with_block && !content.is_empty() {
            format!("{}\n\n", content)
        } else {
            content
        }
    }

    fn render_element(&self, node: &Handle, tag: Tag<'_>, depth: usize) -> String {
        match tag {
            Tag::Paragraph => format!("{}\n\n", self.render_children(node, depth)),
            Tag::LineBreak => "\n".to_string(),
            Tag::Heading(level) => format!(
                "{} {}\n\n",
                "#".repeat(level),
                self.render_children(node, depth)
            ),
            Tag::Strong => wrap_inline(&self.render_children(node, depth), "**"),
            Tag::Emphasis => wrap_inline(&self.render_children(node, depth), "*"),
            Tag::InlineCode => wrap_inline(&raw_text(node), "`"),
            Tag::CodeBlock => render_code_block(node),
            Tag::Anchor => self.render_anchor(node, depth),
            Tag::UnorderedList => self.render_list(node, false, depth),
            Tag::OrderedList => self.render_list(node, true, depth),
            Tag::Blockquote => self.render_blockquote(node, depth),
            Tag::HorizontalRule => "---\n\n".to_string(),
            Tag::Table => self.render_table(node, depth),
            Tag::Container => self.render_passthrough(node, depth),
            Tag::Unknown(name) => {
                tracing::trace!(tag = name, "rendering unknown tag as its children");
                self.render_passthrough(node, depth)
            }
        }
    }

    /// Anchors wrapping a mention are emitted as the bare mention
    fn render_anchor(&self, node: &Handle, depth: usize) -> String {
        let text = self.render_children(node, depth);
        if text.is_empty() || contains_mention(&text) {
            return text;
        }

        let href = attribute(node, "href").unwrap_or_default();
        format!("[{}]({})", text, href)
    }

    /// Lists iterate only their direct `<li>` children; numbering of ordered
    /// lists always restarts at 1
    fn render_list(&self, node: &Handle, ordered: bool, depth: usize) -> String {
        let items: Vec<String> = node
            .children
            .borrow()
            .iter()
            .filter(|child| element_name(child) == Some("li"))
            .enumerate()
            .map(|(index, item)| {
                let marker = if ordered {
                    format!("{}. ", index + 1)
                } else {
                    "- ".to_string()
                };
                self.render_list_item(item, &marker, depth + 1)
            })
            .collect();

        if items.is_empty() {
            return String::new();
        }
        format!("{}\n\n", items.join("\n"))
    }

    fn render_list_item(&self, item: &Handle, marker: &str, depth: usize) -> String {
        let content = self.render_children(item, depth);
        if content.is_empty() {
            return marker.trim_end().to_string();
        }

        let indent = " ".repeat(marker.len());
        let mut output = String::with_capacity(content.len() + marker.len());
        for (index, line) in content.lines().enumerate() {
            if index == 0 {
                output.push_str(marker);
            } else {
                output.push('\n');
                if !line.is_empty() {
                    output.push_str(&indent);
                }
            }
            output.push_str(line);
        }
        output
    }

    fn render_blockquote(&self, node: &Handle, depth: usize) -> String {
        let content = self.render_children(node, depth);
        if content.is_empty() {
            return String::new();
        }

        let quoted: Vec<String> = content.lines().map(|line| format!("> {}", line)).collect();
        format!("{}\n\n", quoted.join("\n"))
    }

    /// Rows come from the table itself and its row groups; nested tables
    /// inside cells are rendered as cell content, never as rows
    fn render_table(&self, node: &Handle, depth: usize) -> String {
        let mut rows = Vec::new();
        self.collect_table_rows(node, depth, &mut rows);

        let Some(first) = rows.first() else {
            return String::new();
        };
        let separator = vec!["---"; first.len()].join(" | ");

        let mut lines = Vec::with_capacity(rows.len() + 1);
        for (index, row) in rows.iter().enumerate() {
            lines.push(format!("| {} |", row.join(" | ")));
            if index == 0 {
                lines.push(format!("| {} |", separator));
            }
        }
        format!("{}\n\n", lines.join("\n"))
    }

    fn collect_table_rows(&self, node: &Handle, depth: usize, rows: &mut Vec<Vec<String>>) {
        for child in node.children.borrow().iter() {
            match element_name(child) {
                Some("tr") => rows.push(self.render_table_row(child, depth + 1)),
                Some("thead") | Some("tbody") | Some("tfoot") => {
                    self.collect_table_rows(child, depth + 1, rows)
                }
                _ => {}
            }
        }
    }

    fn render_table_row(&self, row: &Handle, depth: usize) -> Vec<String> {
        row.children
            .borrow()
            .iter()
            .filter(|child| matches!(element_name(child), Some("td") | Some("th")))
            .map(|cell| {
                // A line break would end the table row
                self.render_children(cell, depth + 1).replace('\n', " ")
            })
            .collect()
    }
}

/// Collapse runs of three or more newlines to a single blank line and trim
///
/// Applied once to the fully serialized tree.
pub fn normalize_output(markdown: &str) -> String {
    static BLANK_RUN_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let collapsed = match BLANK_RUN_REGEX
        .get_or_init(|| Regex::new(r"\n{3,}").ok())
        .as_ref()
    {
        Some(regex) => regex.replace_all(markdown, "\n\n").into_owned(),
        None => markdown.to_string(),
    };
    collapsed.trim().to_string()
}

fn wrap_inline(content: &str, delimiter: &str) -> String {
    if content.is_empty() {
        return String::new();
    }
    format!("{}{}{}", delimiter, content, delimiter)
}

/// Code blocks use the text of a nested `<code>` element when there is one,
/// taking its `language-*` class as the fence info string
fn render_code_block(node: &Handle) -> String {
    let (code, language) = match find_descendant(node, "code") {
        Some(code) => {
            let language = attribute(&code, "class").and_then(|class| {
                class
                    .split_whitespace()
                    .find_map(|name| name.strip_prefix("language-").map(str::to_string))
            });
            (raw_text(&code), language)
        }
        None => (raw_text(node), None),
    };

    let code = code.strip_suffix('\n').unwrap_or(&code);
    format!("```{}\n{}\n```\n\n", language.unwrap_or_default(), code)
}

/// Concatenated text of every descendant text node, without any rendering
///
/// Walks with an explicit stack, so it is safe at any nesting depth.
fn raw_text(node: &Handle) -> String {
    let mut output = String::new();
    let mut stack = vec![node.clone()];
    while let Some(current) = stack.pop() {
        match current.data {
            NodeData::Text { ref contents } => output.push_str(&contents.borrow()),
            NodeData::Element { .. } | NodeData::Document => {
                stack.extend(current.children.borrow().iter().rev().cloned());
            }
            _ => {}
        }
    }
    output
}

fn element_name(node: &Handle) -> Option<&str> {
    match node.data {
        NodeData::Element { ref name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

fn element_tag(node: &Handle) -> Option<Tag<'_>> {
    element_name(node).map(Tag::from_name)
}

fn attribute(node: &Handle, attr_name: &str) -> Option<String> {
    match node.data {
        NodeData::Element { ref attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| attr.name.local.as_ref() == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

fn find_descendant(node: &Handle, tag: &str) -> Option<Handle> {
    let mut stack: Vec<Handle> = node.children.borrow().iter().rev().cloned().collect();
    while let Some(current) = stack.pop() {
        if element_name(&current) == Some(tag) {
            return Some(current);
        }
        stack.extend(current.children.borrow().iter().rev().cloned());
    }
    None
}
