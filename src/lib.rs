//! Entity Mention Converter
//!
//! Bidirectional conversion between a constrained Markdown dialect and HTML
//! that keeps entity mentions (`[entity:42]`, `[entity:42|Display text]`)
//! byte-for-byte intact in both directions.
//!
//! # Architecture
//!
//! The library is structured into several modules:
//! - `mention`: finds mentions and swaps them for placeholder tokens
//! - `renderer`: Markdown to HTML rendering using comrak
//! - `parser`: HTML fragment parsing using html5ever
//! - `converter`: HTML to Markdown tree-walk and final cleanup
//! - `error`: error types
//!
//! Both directions share one pipeline:
//!
//! ```text
//! input -> mention::protect -> renderer | parser + converter -> mention::restore -> output
//! ```
//!
//! # Examples
//!
//! ```rust
//! use entity_mention_converter::{html_to_markdown, markdown_to_html};
//!
//! let html = markdown_to_html("Hello [entity:5|Bob], see [entity:9].").unwrap();
//! assert_eq!(html, "<p>Hello [entity:5|Bob], see [entity:9].</p>");
//!
//! let markdown = html_to_markdown("<p><a href=\"/e/9\">[entity:9]</a> wins</p>").unwrap();
//! assert_eq!(markdown, "[entity:9] wins");
//! ```
//!
//! # Concurrency
//!
//! Conversion is synchronous and keeps no state between calls. A
//! [`ContentConverter`] can be shared across threads freely.

// Module declarations
pub mod converter;
pub mod error;
pub mod mention;
pub mod parser;
pub mod renderer;

// Re-export main types for convenience
pub use converter::MarkdownConverter;
pub use error::ConversionError;
pub use mention::{Mention, MentionMap};
pub use renderer::{MarkdownRenderer, RenderOptions};

/// Converts record text between Markdown and HTML, preserving mentions
#[derive(Debug, Clone, Default)]
pub struct ContentConverter {
    renderer: MarkdownRenderer,
    converter: MarkdownConverter,
}

impl ContentConverter {
    /// Create a converter with the default rendering options
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a converter with custom Markdown rendering options
    pub fn with_options(options: RenderOptions) -> Self {
        Self {
            renderer: MarkdownRenderer::with_options(options),
            converter: MarkdownConverter::new(),
        }
    }

    /// Convert Markdown to HTML
    ///
    /// Mentions are restored into the HTML verbatim and are never escaped.
    /// Empty input yields empty output.
    ///
    /// # Errors
    ///
    /// Propagates any failure from the Markdown renderer unchanged.
    pub fn markdown_to_html(&self, markdown: &str) -> Result<String, ConversionError> {
        if markdown.is_empty() {
            return Ok(String::new());
        }

        let (protected, mentions) = mention::protect(markdown);
        let html = self.renderer.render(&protected)?;
        let html = mention::restore(&html, &mentions);

        tracing::debug!(
            input_len = markdown.len(),
            mentions = mentions.len(),
            output_len = html.len(),
            "converted markdown to html"
        );

        Ok(html)
    }

    /// Convert HTML to Markdown
    ///
    /// Mentions are protected on the raw HTML, before the parser can decode
    /// entity references inside their display text. Never fails; the
    /// `Result` keeps both directions symmetrical for callers.
    pub fn html_to_markdown(&self, html: &str) -> Result<String, ConversionError> {
        if html.is_empty() {
            return Ok(String::new());
        }

        let (protected, mentions) = mention::protect(html);
        let dom = parser::parse_fragment(&protected);
        let markdown = self.converter.convert(&dom);
        let markdown = mention::restore(&markdown, &mentions);

        tracing::debug!(
            input_len = html.len(),
            mentions = mentions.len(),
            output_len = markdown.len(),
            "converted html to markdown"
        );

        Ok(markdown)
    }
}

/// Convert Markdown to HTML with the default options
///
/// See [`ContentConverter::markdown_to_html`].
pub fn markdown_to_html(markdown: &str) -> Result<String, ConversionError> {
    ContentConverter::new().markdown_to_html(markdown)
}

/// Convert HTML to Markdown
///
/// See [`ContentConverter::html_to_markdown`].
pub fn html_to_markdown(html: &str) -> Result<String, ConversionError> {
    ContentConverter::new().html_to_markdown(html)
}
